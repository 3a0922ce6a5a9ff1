//! Health and metrics endpoints.

use std::sync::Arc;

use agora_core::{ErrorPolicy, ThemeCacheStats};
use agora_telemetry::{MetricsSnapshot, build_sha, record_app_mode};
use async_trait::async_trait;
use axum::{
    Json,
    body::Body,
    extract::State,
    http::{StatusCode, header::CONTENT_TYPE},
    response::Response,
};
use serde::Serialize;
use tracing::{error, warn};

use crate::http::errors::ApiError;
use crate::state::ApiState;

const DATABASE_COMPONENT: &str = "database";
const THEME_COMPONENT: &str = "theme";

/// Database reachability check backing `/health`.
#[async_trait]
pub trait DatabaseHealth: Send + Sync {
    /// Succeeds when the database answers a trivial query.
    async fn ping(&self) -> anyhow::Result<()>;
}

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) status: &'static str,
    pub(crate) policy: ErrorPolicy,
    pub(crate) database: &'static str,
}

#[derive(Serialize)]
pub(crate) struct FullHealthResponse {
    pub(crate) status: &'static str,
    pub(crate) policy: ErrorPolicy,
    pub(crate) build: String,
    pub(crate) board_id: i32,
    pub(crate) default_theme: String,
    pub(crate) degraded: Vec<String>,
    pub(crate) metrics: MetricsSnapshot,
    pub(crate) theme_cache: ThemeCacheHealth,
}

#[derive(Serialize)]
pub(crate) struct ThemeCacheHealth {
    pub(crate) bypassed: bool,
    pub(crate) hits: u64,
    pub(crate) loads: u64,
    pub(crate) entries: usize,
}

impl ThemeCacheHealth {
    const fn new(bypassed: bool, stats: ThemeCacheStats) -> Self {
        Self {
            bypassed,
            hits: stats.hits,
            loads: stats.loads,
            entries: stats.entries,
        }
    }
}

pub(crate) async fn health(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<HealthResponse>, ApiError> {
    check_database(&state).await?;
    record_app_mode(state.config.error_policy.as_str());
    Ok(Json(HealthResponse {
        status: "ok",
        policy: state.config.error_policy,
        database: "ok",
    }))
}

pub(crate) async fn health_full(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<FullHealthResponse>, ApiError> {
    check_database(&state).await?;
    if state.config.default_theme_available() {
        state.remove_degraded_component(THEME_COMPONENT);
    } else {
        state.add_degraded_component(THEME_COMPONENT);
    }

    let degraded = state.current_health_degraded();
    let status = if degraded.is_empty() {
        "ok"
    } else {
        "degraded"
    };
    Ok(Json(FullHealthResponse {
        status,
        policy: state.config.error_policy,
        build: build_sha().to_string(),
        board_id: state.config.board_id,
        default_theme: state.config.default_theme.clone(),
        degraded,
        metrics: state.telemetry.snapshot(),
        theme_cache: ThemeCacheHealth::new(
            state.theme_cache.is_bypassed(),
            state.theme_cache.stats(),
        ),
    }))
}

pub(crate) async fn metrics(State(state): State<Arc<ApiState>>) -> Result<Response, ApiError> {
    let body = state.telemetry.render().map_err(|err| {
        error!(error = %err, "failed to render metrics");
        ApiError::internal("failed to render metrics")
    })?;
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "text/plain; version=0.0.4")
        .body(Body::from(body))
        .map_err(|err| {
            error!(error = %err, "failed to build metrics response");
            ApiError::internal("failed to build metrics response")
        })
}

async fn check_database(state: &ApiState) -> Result<(), ApiError> {
    match state.database.ping().await {
        Ok(()) => {
            state.remove_degraded_component(DATABASE_COMPONENT);
            Ok(())
        }
        Err(err) => {
            state.add_degraded_component(DATABASE_COMPONENT);
            warn!(error = %err, "health check failed to reach database");
            Err(ApiError::service_unavailable(
                "database is currently unavailable",
            ))
        }
    }
}
