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

//! Telemetry primitives for the Agora forum host.
//!
//! Logging setup, process span and per-request forum scope, `x-request-id` layers, and
//! the Prometheus registry the HTTP host exposes at `/metrics`.

pub mod context;
pub mod error;
pub mod init;
pub mod layers;
pub mod metrics;

pub use context::{
    GlobalContextGuard, RequestScope, current_scope, record_app_mode, record_session_id,
    with_request_scope,
};
pub use error::{ExpositionError, Result, TelemetryError};
pub use init::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_sha, init_logging};
pub use layers::{propagate_request_id_layer, set_request_id_layer};
pub use metrics::{MetricFamily, Metrics, MetricsSnapshot};
