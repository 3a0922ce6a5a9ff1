//! Per-request theme item resolution.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ThemeError;
use crate::service::{EventLogEntry, EventLogKind, EventLogSink};
use crate::theme::cache::ThemeCache;
use crate::theme::document::ThemeDocument;

/// Language used when the request did not negotiate one.
pub const DEFAULT_LANGUAGE: &str = "EN";

/// Board-level theme configuration. The directory the files live in belongs
/// to the [`ThemeCache`] that loads them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeSettings {
    /// Root substituted for `~` inside resource text.
    pub server_root: String,
    /// Root used when building client-facing theme paths.
    pub client_root: String,
    /// Write an event-log entry whenever an item is missing.
    pub log_missing_items: bool,
}

impl Default for ThemeSettings {
    fn default() -> Self {
        Self {
            server_root: "/themes".to_string(),
            client_root: "/themes".to_string(),
            log_missing_items: false,
        }
    }
}

/// Whether `name` can be used as a theme file under `directory`.
///
/// The trimmed, lower-cased name must be non-empty, end in `.xml`, be a plain
/// file name, and exist as a file in `directory`. Blocking; async callers go
/// through [`ThemeResolver::set_theme_file`].
#[must_use]
pub fn is_valid_theme(directory: &Path, name: &str) -> bool {
    theme_path(directory, name).is_some_and(|path| path.is_file())
}

async fn theme_file_exists(directory: &Path, name: &str) -> bool {
    let Some(path) = theme_path(directory, name) else {
        return false;
    };
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|metadata| metadata.is_file())
}

fn theme_path(directory: &Path, name: &str) -> Option<PathBuf> {
    let trimmed = name.trim();
    let lowered = trimmed.to_lowercase();
    if lowered.is_empty() || !lowered.ends_with(".xml") {
        return None;
    }
    if trimmed.contains(['/', '\\']) || trimmed.contains("..") {
        return None;
    }
    Some(directory.join(trimmed))
}

/// Resolves theme items for one request.
///
/// The resolver remembers the document it loaded, so a single instance never
/// reads the cache more than once per theme file.
pub struct ThemeResolver {
    settings: Arc<ThemeSettings>,
    cache: Arc<ThemeCache>,
    language: String,
    user_id: Option<i32>,
    event_log: Option<Arc<dyn EventLogSink>>,
    theme_file: Option<String>,
    document: Option<Arc<ThemeDocument>>,
}

impl ThemeResolver {
    /// Resolver with no theme selected and the default language.
    #[must_use]
    pub fn new(settings: Arc<ThemeSettings>, cache: Arc<ThemeCache>) -> Self {
        Self {
            settings,
            cache,
            language: DEFAULT_LANGUAGE.to_string(),
            user_id: None,
            event_log: None,
            theme_file: None,
            document: None,
        }
    }

    /// Set the request language; blank values keep the default.
    #[must_use]
    pub fn with_language(mut self, language: &str) -> Self {
        let language = language.trim();
        if !language.is_empty() {
            self.language = language.to_uppercase();
        }
        self
    }

    /// Forum user id recorded on missing-item log entries.
    #[must_use]
    pub const fn with_user(mut self, user_id: Option<i32>) -> Self {
        self.user_id = user_id;
        self
    }

    /// Sink used when missing-item logging is enabled.
    #[must_use]
    pub fn with_event_log(mut self, sink: Arc<dyn EventLogSink>) -> Self {
        self.event_log = Some(sink);
        self
    }

    /// Upper-cased language code in effect.
    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Currently selected theme file.
    #[must_use]
    pub fn theme_file(&self) -> Option<&str> {
        self.theme_file.as_deref()
    }

    /// Select a theme file from the cache's directory. Reselecting the current
    /// file does no IO.
    ///
    /// # Errors
    ///
    /// Returns [`ThemeError::InvalidName`] when `name` is not a usable theme
    /// file; the previous selection is kept.
    pub async fn set_theme_file(&mut self, name: &str) -> Result<(), ThemeError> {
        let name = name.trim();
        if self.theme_file.as_deref() == Some(name) {
            return Ok(());
        }
        if !theme_file_exists(self.cache.directory(), name).await {
            return Err(ThemeError::InvalidName {
                file: name.to_string(),
            });
        }
        self.theme_file = Some(name.to_string());
        self.document = None;
        Ok(())
    }

    /// `<client_root>/<dir>/`, or `None` when no theme is selected.
    ///
    /// # Errors
    ///
    /// Propagates document load failures.
    pub async fn theme_dir(&mut self) -> Result<Option<String>, ThemeError> {
        let Some(document) = self.document().await? else {
            return Ok(None);
        };
        Ok(Some(format!(
            "{}/{}/",
            self.settings.client_root.trim_end_matches('/'),
            document.dir()
        )))
    }

    /// `theme_dir()` followed by `file`.
    ///
    /// # Errors
    ///
    /// Propagates document load failures.
    pub async fn build_theme_path(&mut self, file: &str) -> Result<Option<String>, ThemeError> {
        Ok(self.theme_dir().await?.map(|dir| format!("{dir}{file}")))
    }

    /// Item text, defaulting to `[PAGE.TAG]`.
    ///
    /// # Errors
    ///
    /// Propagates document load failures.
    pub async fn item(&mut self, page: &str, tag: &str) -> Result<String, ThemeError> {
        let default = format!("[{}.{}]", page.to_uppercase(), tag.to_uppercase());
        self.item_or(page, tag, &default).await
    }

    /// Item text, or `default` when the theme has no such item. Returns an
    /// empty string when no theme is selected.
    ///
    /// # Errors
    ///
    /// Propagates document load failures.
    pub async fn item_or(
        &mut self,
        page: &str,
        tag: &str,
        default: &str,
    ) -> Result<String, ThemeError> {
        if self.theme_file.is_none() {
            return Ok(String::new());
        }
        Ok(self
            .lookup(page, tag)
            .await?
            .unwrap_or_else(|| default.to_string()))
    }

    /// Resolved item text, or `None` on a miss (after recording the miss when
    /// missing-item logging is enabled) or when no theme is selected.
    ///
    /// # Errors
    ///
    /// Propagates document load failures.
    pub async fn lookup(&mut self, page: &str, tag: &str) -> Result<Option<String>, ThemeError> {
        let Some(document) = self.document().await? else {
            return Ok(None);
        };

        if let Some(text) = document.lookup(page, tag, &self.language) {
            let root = format!(
                "{}/{}",
                self.settings.server_root.trim_end_matches('/'),
                document.dir()
            );
            return Ok(Some(text.replace('~', &root)));
        }

        self.record_missing(page, tag).await;
        Ok(None)
    }

    async fn document(&mut self) -> Result<Option<Arc<ThemeDocument>>, ThemeError> {
        if let Some(document) = &self.document {
            return Ok(Some(Arc::clone(document)));
        }
        let Some(file) = self.theme_file.as_deref() else {
            return Ok(None);
        };
        let document = self.cache.get_or_load(file).await?;
        self.document = Some(Arc::clone(&document));
        Ok(Some(document))
    }

    async fn record_missing(&self, page: &str, tag: &str) {
        if !self.settings.log_missing_items {
            return;
        }
        let Some(sink) = &self.event_log else {
            return;
        };

        let entry = EventLogEntry {
            user_id: self.user_id,
            source: format!("theme.{}", page.to_lowercase()),
            description: format!(
                "Missing Theme Item: {}.{}",
                page.to_uppercase(),
                tag.to_uppercase()
            ),
            kind: EventLogKind::Error,
            created_at: Utc::now(),
        };
        if let Err(err) = sink.record(entry).await {
            warn!(error = %err, page, tag, "failed to record missing theme item");
        }
    }
}
