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

//! Environment-driven configuration for the forum host.
//!
//! Layout: `defaults.rs` (fallback values), `model.rs` (typed `ForumConfig`),
//! `validate.rs` (per-variable parsing), `loader.rs` (environment lookup).

mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use model::{ForumConfig, LogFormatSetting};
