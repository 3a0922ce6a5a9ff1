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

//! Page bootstrap and theme resolution for the Agora forum.
//!
//! Layout: `model` (request/page DTOs), `service` (collaborator traits
//! implemented by the data and HTTP layers), `bootstrap` (per-request page
//! load state machine and failure policy), `theme` (theme documents, the
//! shared document cache, and the per-request resolver).

pub mod bootstrap;
pub mod error;
pub mod model;
pub mod service;
pub mod theme;

pub use bootstrap::{
    BootstrapOutcome, BootstrapReport, ErrorPolicy, MAX_PAGE_LOAD_ATTEMPTS, PageBootstrapHandler,
};
pub use error::{BootstrapError, ThemeError};
pub use model::{
    AuthenticatedUser, ForumPage, IdentityKey, InfoMessage, InitPageLoadEvent, PageClassification,
    PageData, PageDataDictionary, PageLoadRequest, PageLoadRow, PageLocation, RequestContext,
};
pub use service::{
    EventLogEntry, EventLogKind, EventLogSink, IdentityResolver, PageLoadStore, SessionControl,
    UserProvisioner,
};
pub use theme::{
    DEFAULT_LANGUAGE, ThemeCache, ThemeCacheStats, ThemeDocument, ThemeResolver, ThemeResource,
    ThemeSettings, is_valid_theme,
};
