//! Router construction and server host.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use agora_telemetry::{build_sha, propagate_request_id_layer, set_request_id_layer};
use anyhow::{Context, Result};
use axum::{Router, http::Request, middleware, routing::get};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{Span, info};

use crate::http::bootstrap::bootstrap_page;
use crate::http::constants::{
    HEADER_REQUEST_ID, HEALTH_FULL_PATH, HEALTH_PATH, INFO_PATH, METRICS_PATH, THEME_ITEM_PATH,
};
use crate::http::health::{health, health_full, metrics};
use crate::http::pages::{info, page_view, theme_item};
use crate::http::telemetry::track_request;
use crate::state::{ApiDependencies, ApiState};
use crate::user_agent::UserAgentClassifier;

/// Axum router hosting the forum.
pub struct ApiServer {
    router: Router,
}

impl ApiServer {
    /// Build the router and its shared state.
    ///
    /// # Errors
    ///
    /// Returns an error if the user-agent patterns fail to compile.
    pub fn new(deps: ApiDependencies) -> Result<Self> {
        let user_agents =
            UserAgentClassifier::new().context("failed to compile user-agent patterns")?;
        let state = Arc::new(ApiState::new(deps, user_agents));
        let policy = state.config.error_policy;

        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(move |request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get(HEADER_REQUEST_ID)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                tracing::info_span!(
                    "http.request",
                    method = %request.method(),
                    route = %request.uri().path(),
                    request_id = %request_id,
                    mode = %policy,
                    build_sha = %build_sha(),
                    status_code = tracing::field::Empty,
                    latency_ms = tracing::field::Empty
                )
            })
            .on_request(|_request: &Request<_>, _span: &Span| {})
            .on_response(
                |response: &axum::response::Response, latency: Duration, span: &Span| {
                    span.record("status_code", response.status().as_u16());
                    let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
                    span.record("latency_ms", latency_ms);
                },
            );
        let layered = ServiceBuilder::new()
            .layer(set_request_id_layer())
            .layer(propagate_request_id_layer())
            .layer(trace_layer)
            .layer(middleware::from_fn_with_state(
                Arc::clone(&state),
                track_request,
            ));

        let router = Self::public_routes()
            .merge(Self::forum_routes(&state))
            .layer(layered)
            .with_state(state);
        Ok(Self { router })
    }

    fn public_routes() -> Router<Arc<ApiState>> {
        Router::new()
            .route(HEALTH_PATH, get(health))
            .route(HEALTH_FULL_PATH, get(health_full))
            .route(METRICS_PATH, get(metrics))
    }

    fn forum_routes(state: &Arc<ApiState>) -> Router<Arc<ApiState>> {
        Router::new()
            .route(INFO_PATH, get(info))
            .route(THEME_ITEM_PATH, get(theme_item))
            .fallback(page_view)
            .layer(middleware::from_fn_with_state(
                Arc::clone(state),
                bootstrap_page,
            ))
    }

    /// Router handle, for embedding or in-process requests.
    #[must_use]
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `addr` until the listener fails.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot bind or the server stops with an error.
    pub async fn serve(self, addr: SocketAddr) -> Result<()> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        info!(%addr, "forum host listening");
        axum::serve(
            listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .context("forum host terminated unexpectedly")
    }
}
