//! Process span and per-request forum scope.
//!
//! # Design
//! - The process span carries the error policy, board id, and build SHA.
//! - Each request future runs inside a forum scope. The request id and page
//!   class are fixed when the scope opens; the session id is recorded once the
//!   bootstrap middleware has settled it, so failure logs can name the visitor
//!   session without threading it through every call.

use std::future::Future;
use std::sync::{Arc, OnceLock};

use tracing::{Span, span::Entered};

use crate::init::build_sha;

/// Keeps the process-level span entered while alive.
pub struct GlobalContextGuard {
    _guard: Entered<'static>,
}

impl GlobalContextGuard {
    /// Enter the `agora` span tagged with `mode`, the hosted board, and the
    /// build SHA.
    #[must_use]
    pub fn new(mode: impl Into<String>, board_id: i32) -> Self {
        let mode = mode.into();
        let span: &'static Span = Box::leak(Box::new(tracing::info_span!(
            "agora",
            mode = %mode,
            board_id,
            build_sha = %build_sha()
        )));
        Self {
            _guard: span.enter(),
        }
    }
}

/// Record the current mode on the active span.
pub fn record_app_mode(mode: &str) {
    Span::current().record("mode", tracing::field::display(mode));
}

/// Forum context of the request being served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestScope {
    /// Value of `x-request-id`, empty when the header was absent.
    pub request_id: String,
    /// Page class label the request is counted under.
    pub page: String,
    /// Forum session id, once the bootstrap middleware has resolved it.
    pub session_id: Option<String>,
}

/// Forum context of the current request, if one is being served.
#[must_use]
pub fn current_scope() -> Option<RequestScope> {
    ACTIVE_SCOPE
        .try_with(|scope| RequestScope {
            request_id: scope.request_id.to_string(),
            page: scope.page.to_string(),
            session_id: scope.session_id.get().map(ToString::to_string),
        })
        .ok()
}

/// Attach the forum session id to the current request scope.
///
/// Returns `false` outside a scope or when a session id was already recorded.
pub fn record_session_id(session_id: &str) -> bool {
    ACTIVE_SCOPE
        .try_with(|scope| scope.session_id.set(Arc::from(session_id)).is_ok())
        .unwrap_or(false)
}

/// Run `fut` inside a forum scope for `request_id` and `page`.
pub async fn with_request_scope<Fut, T>(
    request_id: impl Into<String>,
    page: impl Into<String>,
    fut: Fut,
) -> T
where
    Fut: Future<Output = T>,
{
    let scope = ActiveScope {
        request_id: Arc::from(request_id.into()),
        page: Arc::from(page.into()),
        session_id: OnceLock::new(),
    };
    ACTIVE_SCOPE.scope(scope, fut).await
}

struct ActiveScope {
    request_id: Arc<str>,
    page: Arc<str>,
    session_id: OnceLock<Arc<str>>,
}

tokio::task_local! {
    static ACTIVE_SCOPE: ActiveScope;
}
