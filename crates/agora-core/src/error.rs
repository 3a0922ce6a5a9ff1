//! # Design
//!
//! - Keep error messages constant; carry operational context in fields.
//! - Collaborator failures keep their `anyhow` source for diagnostics.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures raised while bootstrapping a page request.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// No page row could be obtained: a guest lookup missed, or an
    /// authenticated visitor exhausted the attempt budget.
    #[error("failed to find guest user")]
    GuestNotFound {
        /// Lookups performed before giving up.
        lookups: u8,
    },
    /// The provisioning collaborator reported that the forum profile could not
    /// be created.
    #[error("failed to use new user")]
    ProvisioningFailed {
        /// Board the profile was requested for.
        board_id: i32,
    },
    /// The page-load lookup itself failed.
    #[error("page load lookup failed")]
    Lookup {
        /// Attempt number (1-based) that failed.
        attempt: u8,
        /// Collaborator error.
        source: anyhow::Error,
    },
    /// The provisioning collaborator failed outright.
    #[error("user provisioning failed")]
    Provisioning {
        /// Board the profile was requested for.
        board_id: i32,
        /// Collaborator error.
        source: anyhow::Error,
    },
}

impl BootstrapError {
    /// Stable label for metrics and structured logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::GuestNotFound { .. } => "guest_not_found",
            Self::ProvisioningFailed { .. } => "provisioning_failed",
            Self::Lookup { .. } => "lookup",
            Self::Provisioning { .. } => "provisioning",
        }
    }
}

/// Failures raised while loading theme documents.
#[derive(Debug, Error)]
pub enum ThemeError {
    /// The file name failed validation.
    #[error("invalid theme file name")]
    InvalidName {
        /// Offending file name.
        file: String,
    },
    /// Reading the theme file failed.
    #[error("failed to read theme file")]
    Read {
        /// Path that could not be read.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The theme file is not well-formed XML.
    #[error("failed to parse theme file")]
    Parse {
        /// Theme file name.
        file: String,
        /// Underlying XML error.
        source: quick_xml::Error,
    },
    /// The root element lacks the asset `dir` attribute.
    #[error("theme document is missing its dir attribute")]
    MissingDir {
        /// Theme file name.
        file: String,
    },
}
