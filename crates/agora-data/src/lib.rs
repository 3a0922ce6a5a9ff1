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

//! `PostgreSQL` data access for the forum: migrations, stored procedures, and
//! the collaborator implementations used by page bootstrap and themes.

pub mod error;
pub mod forum;

pub use error::{DataError, Result as DataResult};
pub use forum::{AuthTicket, EventLogRecord, ForumStore, run_migrations};
