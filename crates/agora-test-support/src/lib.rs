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

//! Shared test helpers used across integration suites.
//! Layout: postgres.rs (disposable databases), fakes.rs (scripted
//! collaborators), themes.rs (theme directory fixtures).

pub mod fakes;
pub mod postgres;
pub mod themes;
