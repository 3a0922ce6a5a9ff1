//! Collaborator traits implemented by the data and HTTP layers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{AuthenticatedUser, PageLoadRequest, PageLoadRow};

/// Page-state lookup backed by the persistent store.
///
/// Implementations must be idempotent: the bootstrap handler may call them up
/// to six times for a single request.
#[async_trait]
pub trait PageLoadStore: Send + Sync {
    /// Load (and touch) the page-state row for the request, or `None` when no
    /// row exists or can be created for the visitor.
    async fn page_load(&self, request: &PageLoadRequest) -> anyhow::Result<Option<PageLoadRow>>;
}

/// Creates the forum-side profile for an identity the membership subsystem
/// already knows about.
#[async_trait]
pub trait UserProvisioner: Send + Sync {
    /// Returns `Ok(false)` when the profile could not be created.
    async fn provision(&self, user: &AuthenticatedUser, board_id: i32) -> anyhow::Result<bool>;
}

/// Resolves authentication tickets (the value of the auth cookie) to visitors.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Visitor owning `ticket`, or `None` for unknown or expired tickets.
    async fn resolve(&self, ticket: &str) -> anyhow::Result<Option<AuthenticatedUser>>;

    /// Invalidate `ticket` so later requests presenting it resolve to nobody.
    /// Returns whether the ticket was known.
    async fn revoke(&self, ticket: &str) -> anyhow::Result<bool>;
}

/// Host session hooks used by the failure policy.
pub trait SessionControl: Send + Sync {
    /// Clear the current visitor's authentication.
    fn sign_out(&self);
}

/// Severity classes for event-log entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventLogKind {
    /// Diagnostic error.
    Error,
    /// Warning.
    Warning,
    /// Informational.
    Information,
}

impl EventLogKind {
    /// Numeric type code stored alongside entries.
    #[must_use]
    pub const fn code(self) -> i16 {
        match self {
            Self::Error => 0,
            Self::Warning => 1,
            Self::Information => 2,
        }
    }
}

/// One row destined for the forum event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLogEntry {
    /// Forum user id of the visitor that triggered the entry, if known.
    pub user_id: Option<i32>,
    /// Component or page that raised the entry.
    pub source: String,
    /// Human-readable description.
    pub description: String,
    /// Severity.
    pub kind: EventLogKind,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Sink for diagnostic event-log entries.
#[async_trait]
pub trait EventLogSink: Send + Sync {
    /// Persist a single entry.
    async fn record(&self, entry: EventLogEntry) -> anyhow::Result<()>;
}
