//! Typed configuration models.

use std::net::SocketAddr;
use std::path::PathBuf;

use agora_core::{ErrorPolicy, ThemeSettings};
use serde::{Serialize, Serializer};

use crate::defaults;

/// Log output format requested through configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormatSetting {
    /// Structured JSON lines.
    Json,
    /// Human-readable output.
    Pretty,
}

/// Fully resolved host configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForumConfig {
    /// `PostgreSQL` connection string; required by the server, optional for
    /// offline tooling. Redacted when serialized.
    #[serde(serialize_with = "redact")]
    pub database_url: Option<String>,
    /// HTTP listener address.
    pub bind_addr: SocketAddr,
    /// Board served by this host.
    pub board_id: i32,
    /// Failure policy for page bootstrap.
    pub error_policy: ErrorPolicy,
    /// Directory the theme cache reads `.xml` files from.
    pub theme_directory: PathBuf,
    /// Theme roots and missing-item logging.
    pub theme: ThemeSettings,
    /// Board default theme file.
    pub default_theme: String,
    /// Language used when none is negotiated.
    pub default_language: String,
    /// Base log level.
    pub log_level: String,
    /// Explicit log format; inferred from the build profile when unset.
    pub log_format: Option<LogFormatSetting>,
}

impl Default for ForumConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            bind_addr: SocketAddr::from(defaults::BIND_ADDR),
            board_id: defaults::BOARD_ID,
            error_policy: ErrorPolicy::default(),
            theme_directory: PathBuf::from(defaults::THEME_DIR),
            theme: ThemeSettings {
                server_root: defaults::THEME_SERVER_ROOT.to_string(),
                client_root: defaults::THEME_CLIENT_ROOT.to_string(),
                log_missing_items: false,
            },
            default_theme: defaults::DEFAULT_THEME.to_string(),
            default_language: agora_core::DEFAULT_LANGUAGE.to_string(),
            log_level: defaults::LOG_LEVEL.to_string(),
            log_format: None,
        }
    }
}

impl ForumConfig {
    /// Whether theme documents should skip the shared cache.
    #[must_use]
    pub const fn bypass_theme_cache(&self) -> bool {
        self.error_policy.bypass_caches()
    }

    /// Whether the configured default theme exists and is usable.
    #[must_use]
    pub fn default_theme_available(&self) -> bool {
        agora_core::is_valid_theme(&self.theme_directory, &self.default_theme)
    }
}

fn redact<S: Serializer>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(_) => serializer.serialize_some("<redacted>"),
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serialization_redacts_database_url() {
        let config = ForumConfig {
            database_url: Some("postgres://agora:secret@db/agora".to_string()),
            ..ForumConfig::default()
        };
        let value = serde_json::to_value(&config).expect("serialize");
        assert_eq!(value["database_url"], json!("<redacted>"));
        assert_eq!(value["bind_addr"], json!("127.0.0.1:8080"));
        assert_eq!(value["error_policy"], json!("production"));
        assert_eq!(value["theme"]["server_root"], json!("/themes"));
    }

    #[test]
    fn diagnostic_policy_bypasses_theme_cache() {
        let mut config = ForumConfig::default();
        assert!(!config.bypass_theme_cache());
        config.error_policy = ErrorPolicy::Diagnostic;
        assert!(config.bypass_theme_cache());
    }
}
