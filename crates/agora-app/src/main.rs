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

//! Binary entrypoint that loads configuration and serves the forum.

use agora_app::{AppResult, run_app};

/// Boots the forum host and blocks until the listener stops.
#[tokio::main]
async fn main() -> AppResult<()> {
    run_app().await
}
