//! Forum page handlers. Every handler here runs behind the bootstrap
//! middleware and reads its [`ForumRequest`] from the request extensions.

use std::sync::Arc;

use agora_core::{ForumPage, InfoMessage, PageDataDictionary, ThemeError, ThemeResolver};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::http::bootstrap::ForumRequest;
use crate::http::errors::ApiError;
use crate::i18n::localize_message;
use crate::state::ApiState;

#[derive(Debug, Deserialize)]
pub(crate) struct InfoQuery {
    i: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct InfoResponse {
    pub(crate) code: u8,
    pub(crate) key: &'static str,
    pub(crate) message: String,
    pub(crate) language: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ThemeItemResponse {
    pub(crate) page: String,
    pub(crate) tag: String,
    pub(crate) language: String,
    pub(crate) theme: Option<String>,
    pub(crate) value: String,
    pub(crate) found: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct PageViewResponse {
    pub(crate) page: ForumPage,
    pub(crate) data: PageDataDictionary,
    pub(crate) theme_dir: Option<String>,
}

/// Info page; unknown or missing codes show the "invalid request" message.
pub(crate) async fn info(
    Query(query): Query<InfoQuery>,
    Extension(forum): Extension<ForumRequest>,
) -> Json<InfoResponse> {
    let message = query
        .i
        .as_deref()
        .and_then(|code| code.trim().parse::<u8>().ok())
        .and_then(InfoMessage::from_code)
        .unwrap_or(InfoMessage::Invalid);
    Json(InfoResponse {
        code: message.code(),
        key: message.message_key(),
        message: localize_message(&forum.language, message.message_key()),
        language: forum.language,
    })
}

pub(crate) async fn theme_item(
    State(state): State<Arc<ApiState>>,
    Extension(forum): Extension<ForumRequest>,
    Path((page, tag)): Path<(String, String)>,
) -> Result<Json<ThemeItemResponse>, ApiError> {
    let mut resolver = resolver_for(&state, &forum).await;
    let resolved = resolver.lookup(&page, &tag).await.map_err(theme_failure)?;
    let theme = resolver.theme_file().map(ToString::to_string);
    let page = page.to_uppercase();
    let tag = tag.to_uppercase();

    let found = resolved.is_some();
    let value = match resolved {
        Some(value) => value,
        None if theme.is_some() => {
            state.telemetry.inc_theme_item_missing();
            format!("[{page}.{tag}]")
        }
        None => String::new(),
    };
    Ok(Json(ThemeItemResponse {
        page,
        tag,
        language: resolver.language().to_string(),
        theme,
        value,
        found,
    }))
}

/// Catch-all forum page: the bootstrap dictionary and the theme directory.
pub(crate) async fn page_view(
    State(state): State<Arc<ApiState>>,
    Extension(forum): Extension<ForumRequest>,
) -> Result<Json<PageViewResponse>, ApiError> {
    let mut resolver = resolver_for(&state, &forum).await;
    let theme_dir = resolver.theme_dir().await.map_err(theme_failure)?;
    Ok(Json(PageViewResponse {
        page: forum.page,
        data: forum.data,
        theme_dir,
    }))
}

/// Board default, then the visitor's profile theme, then the theme cookie.
/// Invalid candidates leave the previous selection in place.
async fn resolver_for(state: &ApiState, forum: &ForumRequest) -> ThemeResolver {
    let mut resolver = state.theme_resolver(&forum.language, forum.user_id()).await;
    for theme in theme_candidates(forum, &state.config.default_theme) {
        if let Err(err) = resolver.set_theme_file(theme).await {
            warn!(error = %err, theme, "ignoring invalid theme selection");
        }
    }
    resolver
}

/// Profile then cookie theme, trimmed, without blanks. A name equal to the
/// one offered just before it (the board default first) is dropped.
fn theme_candidates<'a>(forum: &'a ForumRequest, default_theme: &'a str) -> Vec<&'a str> {
    let mut previous = default_theme.trim();
    let mut candidates = Vec::new();
    for theme in [forum.profile_theme(), forum.theme_cookie.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|theme| !theme.is_empty())
    {
        if theme != previous {
            candidates.push(theme);
        }
        previous = theme;
    }
    candidates
}

fn theme_failure(err: ThemeError) -> ApiError {
    error!(error = %err, "theme document could not be loaded");
    ApiError::internal("theme document could not be loaded")
}
