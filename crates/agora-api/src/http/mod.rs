//! HTTP surface: router, middleware, and handlers.

/// Page bootstrap middleware and the per-request forum context.
pub(crate) mod bootstrap;
/// Shared constants (headers, cookies, problem URIs).
pub(crate) mod constants;
/// Cookie header parsing and `Set-Cookie` construction.
pub(crate) mod cookies;
/// Problem response helpers and error types.
pub mod errors;
/// Health and metrics endpoints.
pub mod health;
/// Forum page handlers.
pub(crate) mod pages;
/// Router construction and server host.
pub mod router;
/// Metrics middleware for HTTP requests.
pub(crate) mod telemetry;
