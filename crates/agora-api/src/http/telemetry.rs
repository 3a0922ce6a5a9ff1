//! Request scope and per-page request counting.
//!
//! Forum requests are counted under their [`ForumPage`] class so that
//! `/topics?f=2` and `/topics/7` share one series; host endpoints keep a fixed
//! label of their own.

use std::sync::Arc;

use agora_core::ForumPage;
use agora_telemetry::with_request_scope;
use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::http::constants::{
    HEADER_REQUEST_ID, HEALTH_FULL_PATH, HEALTH_PATH, METRICS_PATH, THEME_ITEM_PATH,
};
use crate::state::ApiState;

/// Open the request scope and count the response by page class and status.
pub(crate) async fn track_request(
    State(state): State<Arc<ApiState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let page = page_label(
        req.extensions().get::<MatchedPath>().map(MatchedPath::as_str),
        req.uri().path(),
    );
    let request_id = req
        .headers()
        .get(HEADER_REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let response = with_request_scope(request_id, page, next.run(req)).await;
    state
        .telemetry
        .inc_http_request(page, response.status().as_u16());
    response
}

fn page_label(matched: Option<&str>, path: &str) -> &'static str {
    match matched {
        Some(HEALTH_PATH | HEALTH_FULL_PATH) => "health",
        Some(METRICS_PATH) => "metrics",
        Some(THEME_ITEM_PATH) => "theme_item",
        _ => ForumPage::from_path(path).as_str(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forum_paths_collapse_to_their_page_class() {
        assert_eq!(page_label(None, "/topics/7"), "topics");
        assert_eq!(page_label(None, "/"), "forum");
        assert_eq!(page_label(None, "/calendar"), "other");
        assert_eq!(page_label(Some("/info"), "/info"), "info");
    }

    #[test]
    fn host_endpoints_keep_their_own_labels() {
        assert_eq!(page_label(Some(HEALTH_PATH), HEALTH_PATH), "health");
        assert_eq!(page_label(Some(HEALTH_FULL_PATH), HEALTH_FULL_PATH), "health");
        assert_eq!(page_label(Some(METRICS_PATH), METRICS_PATH), "metrics");
        assert_eq!(
            page_label(Some(THEME_ITEM_PATH), "/theme/icons/new_posts"),
            "theme_item"
        );
    }
}
