//! Per-request page bootstrap.
//!
//! # Design
//! - The lookup/repair loop is an explicit state machine with a fixed attempt
//!   budget, so a provisioning step that never makes the lookup succeed cannot
//!   spin forever.
//! - Failures are escalated exactly once, at the top of `handle`, according to
//!   a runtime `ErrorPolicy` chosen at startup.
//! - Nothing is written to the output dictionary unless a row was obtained.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::error::BootstrapError;
use crate::model::{
    ForumPage, InfoMessage, InitPageLoadEvent, PageData, PageLoadRequest, PageLoadRow,
    RequestContext,
};
use crate::service::{PageLoadStore, SessionControl, UserProvisioner};

/// Upper bound on page-load lookups for one request.
pub const MAX_PAGE_LOAD_ATTEMPTS: u8 = 6;

/// How bootstrap failures are surfaced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Fail fast: hand the error back unchanged.
    Diagnostic,
    /// Contain: log, sign the visitor out, and redirect to the info page.
    #[default]
    Production,
}

impl ErrorPolicy {
    /// Stable lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Diagnostic => "diagnostic",
            Self::Production => "production",
        }
    }

    /// Parse a policy label (case-insensitive). `development` is accepted as an
    /// alias for `diagnostic`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "diagnostic" | "development" => Some(Self::Diagnostic),
            "production" => Some(Self::Production),
            _ => None,
        }
    }

    /// Whether shared caches should be bypassed so edits show up immediately.
    #[must_use]
    pub const fn bypass_caches(self) -> bool {
        matches!(self, Self::Diagnostic)
    }
}

impl fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Work performed by a successful bootstrap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BootstrapReport {
    /// Page-load lookups issued.
    pub lookups: u8,
    /// Provisioning calls issued.
    pub provisions: u8,
}

/// Result of handling a page-load event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// The output dictionary was populated.
    Loaded(BootstrapReport),
    /// The failure was contained; the host should send the visitor to the info
    /// page with the given message.
    Redirect(InfoMessage),
}

#[derive(Debug)]
enum BootstrapState {
    Lookup,
    Repair,
    Succeeded(PageLoadRow),
    FatalMissing,
    FatalRepairFailed,
}

/// Handles the page-load event by resolving the visitor's persisted page
/// state, provisioning a forum profile on demand.
#[derive(Clone)]
pub struct PageBootstrapHandler {
    store: Arc<dyn PageLoadStore>,
    provisioner: Arc<dyn UserProvisioner>,
    policy: ErrorPolicy,
}

impl PageBootstrapHandler {
    /// Construct a handler around the lookup and provisioning collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn PageLoadStore>,
        provisioner: Arc<dyn UserProvisioner>,
        policy: ErrorPolicy,
    ) -> Self {
        Self {
            store,
            provisioner,
            policy,
        }
    }

    /// Failure policy in effect.
    #[must_use]
    pub const fn policy(&self) -> ErrorPolicy {
        self.policy
    }

    /// Populate `event.data` with the page-state row for the current visitor.
    ///
    /// # Errors
    ///
    /// Under [`ErrorPolicy::Diagnostic`] every failure is returned unchanged.
    /// Under [`ErrorPolicy::Production`] the visitor is signed out and the
    /// failure is turned into a redirect, unless the request is already for
    /// the info page, in which case the error is returned.
    pub async fn handle(
        &self,
        ctx: &RequestContext,
        event: &mut InitPageLoadEvent,
        session: &dyn SessionControl,
    ) -> Result<BootstrapOutcome, BootstrapError> {
        match self.load(ctx, &event.page_data).await {
            Ok((row, report)) => {
                event.data.extend_from_row(row);
                Ok(BootstrapOutcome::Loaded(report))
            }
            Err(err) => self.escalate(ctx, session, err),
        }
    }

    async fn load(
        &self,
        ctx: &RequestContext,
        page_data: &PageData,
    ) -> Result<(PageLoadRow, BootstrapReport), BootstrapError> {
        let request = PageLoadRequest::from_context(ctx, page_data);
        let mut report = BootstrapReport::default();
        let mut state = BootstrapState::Lookup;

        loop {
            state = match state {
                BootstrapState::Lookup => {
                    report.lookups += 1;
                    let row = self.store.page_load(&request).await.map_err(|source| {
                        BootstrapError::Lookup {
                            attempt: report.lookups,
                            source,
                        }
                    })?;
                    debug!(
                        attempt = report.lookups,
                        found = row.is_some(),
                        guest = ctx.user.is_none(),
                        "page load lookup"
                    );
                    match (row, ctx.user.is_some()) {
                        (Some(row), _) => BootstrapState::Succeeded(row),
                        (None, false) => BootstrapState::FatalMissing,
                        (None, true) => BootstrapState::Repair,
                    }
                }
                BootstrapState::Repair => self.repair(ctx, &mut report).await?,
                BootstrapState::Succeeded(row) => return Ok((row, report)),
                BootstrapState::FatalMissing => {
                    return Err(BootstrapError::GuestNotFound {
                        lookups: report.lookups,
                    });
                }
                BootstrapState::FatalRepairFailed => {
                    return Err(BootstrapError::ProvisioningFailed {
                        board_id: ctx.board_id,
                    });
                }
            };
        }
    }

    async fn repair(
        &self,
        ctx: &RequestContext,
        report: &mut BootstrapReport,
    ) -> Result<BootstrapState, BootstrapError> {
        let Some(user) = ctx.user.as_ref() else {
            return Ok(BootstrapState::FatalMissing);
        };

        report.provisions += 1;
        let created = self
            .provisioner
            .provision(user, ctx.board_id)
            .await
            .map_err(|source| BootstrapError::Provisioning {
                board_id: ctx.board_id,
                source,
            })?;

        if !created {
            warn!(
                user = %user.user_name,
                board_id = ctx.board_id,
                "forum profile provisioning was refused"
            );
            return Ok(BootstrapState::FatalRepairFailed);
        }
        if report.lookups >= MAX_PAGE_LOAD_ATTEMPTS {
            warn!(
                user = %user.user_name,
                lookups = report.lookups,
                "page load still missing after provisioning; giving up"
            );
            return Ok(BootstrapState::FatalMissing);
        }
        Ok(BootstrapState::Lookup)
    }

    fn escalate(
        &self,
        ctx: &RequestContext,
        session: &dyn SessionControl,
        err: BootstrapError,
    ) -> Result<BootstrapOutcome, BootstrapError> {
        if self.policy == ErrorPolicy::Diagnostic {
            return Err(err);
        }

        error!(
            error = ?err,
            kind = err.kind(),
            page = %ctx.page,
            board_id = ctx.board_id,
            "Failure Initializing User/Page"
        );
        session.sign_out();

        if ctx.page == ForumPage::Info {
            return Err(err);
        }
        Ok(BootstrapOutcome::Redirect(InfoMessage::Failure))
    }
}
