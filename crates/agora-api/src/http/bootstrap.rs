//! Page bootstrap middleware.
//!
//! # Design
//! - Gathers session, identity, client, and user-agent details from the request,
//!   runs the page bootstrap handler, and stores the resulting dictionary in the
//!   request extensions as a [`ForumRequest`].
//! - Redirect outcomes become `303 See Other` to the info page; errors become a
//!   500 problem whose detail depends on the error policy.
//! - A sign-out requested by the failure policy revokes the presented auth
//!   ticket server-side and expires the auth cookie on whatever response is sent.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use agora_core::{
    AuthenticatedUser, BootstrapError, BootstrapOutcome, ErrorPolicy, ForumPage,
    InitPageLoadEvent, PageClassification, PageData, PageDataDictionary, PageLocation,
    IdentityResolver, RequestContext, SessionControl,
};
use agora_telemetry::{current_scope, record_session_id};
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{
        HeaderMap, Request,
        header::{SET_COOKIE, USER_AGENT},
    },
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use serde_json::Value;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::http::constants::{
    COOKIE_AUTH, COOKIE_SESSION, COOKIE_THEME, HEADER_DO_NOT_TRACK, HEADER_REAL_IP, INFO_PATH,
    UNKNOWN_CLIENT,
};
use crate::http::cookies::{cookie_value, expired_cookie, session_cookie};
use crate::http::errors::{ApiError, error_chain};
use crate::i18n::negotiate_language;
use crate::state::ApiState;

/// Page state resolved for the current request.
#[derive(Debug, Clone)]
pub(crate) struct ForumRequest {
    pub(crate) page: ForumPage,
    pub(crate) language: String,
    pub(crate) theme_cookie: Option<String>,
    pub(crate) data: PageDataDictionary,
}

impl ForumRequest {
    /// Forum user id from the page-state row.
    pub(crate) fn user_id(&self) -> Option<i32> {
        self.data
            .get("UserID")
            .and_then(Value::as_i64)
            .and_then(|id| i32::try_from(id).ok())
    }

    /// Theme stored on the visitor's profile.
    pub(crate) fn profile_theme(&self) -> Option<&str> {
        self.data
            .get("ThemeFile")
            .and_then(Value::as_str)
            .filter(|theme| !theme.trim().is_empty())
    }
}

/// Per-request session hooks. The ticket is the raw auth cookie value, kept
/// so a sign-out can revoke it after the handler returns.
struct RequestSession {
    ticket: Option<String>,
    signed_out: AtomicBool,
}

impl RequestSession {
    fn new(ticket: Option<String>) -> Self {
        Self {
            ticket,
            signed_out: AtomicBool::new(false),
        }
    }

    fn is_signed_out(&self) -> bool {
        self.signed_out.load(Ordering::SeqCst)
    }

    /// Revoke the presented ticket once the failure policy signed the visitor
    /// out. Revocation errors are logged; the cookie is expired regardless.
    async fn finish_sign_out(&self, identities: &dyn IdentityResolver) {
        if !self.is_signed_out() {
            return;
        }
        let Some(ticket) = self.ticket.as_deref() else {
            return;
        };
        match identities.revoke(ticket).await {
            Ok(known) => debug!(known, "auth ticket revoked after bootstrap failure"),
            Err(err) => warn!(error = %err, "auth ticket revocation failed"),
        }
    }
}

impl SessionControl for RequestSession {
    fn sign_out(&self) {
        self.signed_out.store(true, Ordering::SeqCst);
    }
}

pub(crate) async fn bootstrap_page(
    State(state): State<Arc<ApiState>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let headers = req.headers();
    let existing_session = cookie_value(headers, COOKIE_SESSION);
    let ticket = cookie_value(headers, COOKIE_AUTH);
    let theme_cookie = cookie_value(headers, COOKIE_THEME);
    let language =
        negotiate_language(headers).unwrap_or_else(|| state.config.default_language.clone());
    let agent = state
        .user_agents
        .classify(headers.get(USER_AGENT).and_then(|value| value.to_str().ok()));
    let dont_track = do_not_track(headers);
    let client_address = client_address(&req);
    let path = req.uri().path().to_string();
    let query_string = req.uri().query().unwrap_or_default().to_string();

    let issued_session = existing_session.is_none();
    let session_id = existing_session.unwrap_or_else(|| Uuid::new_v4().to_string());
    record_session_id(&session_id);
    let user = resolve_user(&state, ticket.as_deref()).await;

    let ctx = RequestContext {
        user,
        board_id: state.config.board_id,
        page: ForumPage::from_path(&path),
        session_id,
        client_address,
        file_path: path,
        query_string,
    };
    let mut event = InitPageLoadEvent::new(PageData {
        browser: agent.browser,
        platform: agent.platform,
        location: parse_location(&ctx.query_string),
        classification: PageClassification {
            is_search_engine: agent.is_search_engine,
            is_mobile_device: agent.is_mobile_device,
            dont_track,
        },
    });
    let session = RequestSession::new(ticket);

    let mut response = match state.bootstrap.handle(&ctx, &mut event, &session).await {
        Ok(BootstrapOutcome::Loaded(report)) => {
            state
                .telemetry
                .record_bootstrap(u64::from(report.lookups), u64::from(report.provisions));
            debug!(
                page = %ctx.page,
                lookups = report.lookups,
                provisions = report.provisions,
                "page bootstrap completed"
            );
            req.extensions_mut().insert(ForumRequest {
                page: ctx.page,
                language,
                theme_cookie,
                data: event.data,
            });
            next.run(req).await
        }
        Ok(BootstrapOutcome::Redirect(message)) => {
            state.telemetry.inc_bootstrap_redirect();
            Redirect::to(&format!("{INFO_PATH}?i={}", message.code())).into_response()
        }
        Err(err) => {
            state.telemetry.inc_bootstrap_failure(err.kind());
            failure_response(state.bootstrap.policy(), &err).into_response()
        }
    };

    let headers = response.headers_mut();
    if issued_session && let Some(cookie) = session_cookie(COOKIE_SESSION, &ctx.session_id) {
        headers.append(SET_COOKIE, cookie);
    }
    if session.is_signed_out()
        && let Some(cookie) = expired_cookie(COOKIE_AUTH)
    {
        headers.append(SET_COOKIE, cookie);
    }
    session.finish_sign_out(state.identities.as_ref()).await;
    response
}

async fn resolve_user(state: &ApiState, ticket: Option<&str>) -> Option<AuthenticatedUser> {
    let ticket = ticket?;
    match state.identities.resolve(ticket).await {
        Ok(user) => user,
        Err(err) => {
            warn!(error = %err, "auth ticket resolution failed; continuing as guest");
            None
        }
    }
}

fn failure_response(policy: ErrorPolicy, err: &BootstrapError) -> ApiError {
    match policy {
        ErrorPolicy::Diagnostic => {
            let chain = error_chain(err);
            let scope = current_scope();
            let request_id = scope.as_ref().map_or("", |scope| scope.request_id.as_str());
            let page = scope.as_ref().map_or("", |scope| scope.page.as_str());
            let session_id = scope
                .as_ref()
                .and_then(|scope| scope.session_id.as_deref())
                .unwrap_or_default();
            error!(
                error = %chain,
                kind = err.kind(),
                request_id,
                page,
                session_id,
                "page bootstrap failed"
            );
            ApiError::internal(chain)
        }
        ErrorPolicy::Production => ApiError::internal("the forum page could not be initialized"),
    }
}

fn client_address(req: &Request<Body>) -> String {
    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }
    req.headers()
        .get(HEADER_REAL_IP)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map_or_else(|| UNKNOWN_CLIENT.to_string(), ToString::to_string)
}

fn do_not_track(headers: &HeaderMap) -> bool {
    headers
        .get(HEADER_DO_NOT_TRACK)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.trim() == "1")
}

/// `c`, `f`, `t`, `m` query parameters; unparsable values are ignored.
fn parse_location(query: &str) -> PageLocation {
    let mut location = PageLocation::default();
    for (key, value) in query.split('&').filter_map(|pair| pair.split_once('=')) {
        let Ok(id) = value.parse::<i32>() else {
            continue;
        };
        match key {
            "c" => location.category_id = Some(id),
            "f" => location.forum_id = Some(id),
            "t" => location.topic_id = Some(id),
            "m" => location.message_id = Some(id),
            _ => {}
        }
    }
    location
}
