#![forbid(unsafe_code)]
#![warn(
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! HTTP host for the Agora forum.
//!
//! Every forum route runs behind the page bootstrap middleware, which resolves
//! the visitor's page state before the handler sees the request. Health and
//! metrics routes bypass it.

pub mod http;
pub(crate) mod i18n;
pub mod state;
pub(crate) mod user_agent;

pub use http::errors::ProblemDetails;
pub use http::health::DatabaseHealth;
pub use http::router::ApiServer;
pub use state::ApiDependencies;
