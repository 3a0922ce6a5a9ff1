//! Environment lookup.
//!
//! # Design
//! - `from_lookup` takes any `name -> value` function so tests never touch the
//!   process environment.
//! - Unset or blank variables fall back to defaults; set-but-invalid values
//!   are errors rather than silent fallbacks.

use std::path::PathBuf;

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::model::ForumConfig;
use crate::validate;

/// `PostgreSQL` connection string.
pub const DATABASE_URL: &str = "DATABASE_URL";
/// Listener address.
pub const BIND_ADDR: &str = "AGORA_BIND_ADDR";
/// Board id.
pub const BOARD_ID: &str = "AGORA_BOARD_ID";
/// Failure policy.
pub const ERROR_POLICY: &str = "AGORA_ERROR_POLICY";
/// Theme file directory.
pub const THEME_DIR: &str = "AGORA_THEME_DIR";
/// Root substituted for `~` in theme items.
pub const THEME_SERVER_ROOT: &str = "AGORA_THEME_SERVER_ROOT";
/// Root used for client theme paths.
pub const THEME_CLIENT_ROOT: &str = "AGORA_THEME_CLIENT_ROOT";
/// Board default theme file.
pub const DEFAULT_THEME: &str = "AGORA_DEFAULT_THEME";
/// Missing theme item logging flag.
pub const LOG_MISSING_THEME_ITEMS: &str = "AGORA_LOG_MISSING_THEME_ITEMS";
/// Fallback language.
pub const DEFAULT_LANGUAGE: &str = "AGORA_DEFAULT_LANGUAGE";
/// Log level.
pub const LOG_LEVEL: &str = "AGORA_LOG_LEVEL";
/// Log format.
pub const LOG_FORMAT: &str = "AGORA_LOG_FORMAT";

impl ForumConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] for any variable holding an
    /// unusable value.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] for any variable holding an
    /// unusable value.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let mut config = Self::default();

        config.database_url = get(DATABASE_URL).map(|value| value.trim().to_string());
        if let Some(value) = get(BIND_ADDR) {
            config.bind_addr = validate::parse_bind_addr(BIND_ADDR, &value)?;
        }
        if let Some(value) = get(BOARD_ID) {
            config.board_id = validate::parse_board_id(BOARD_ID, &value)?;
        }
        if let Some(value) = get(ERROR_POLICY) {
            config.error_policy = validate::parse_error_policy(ERROR_POLICY, &value)?;
        }
        if let Some(value) = get(THEME_DIR) {
            config.theme_directory = PathBuf::from(value.trim());
        }
        if let Some(value) = get(THEME_SERVER_ROOT) {
            config.theme.server_root = validate::parse_url_root(THEME_SERVER_ROOT, &value)?;
        }
        if let Some(value) = get(THEME_CLIENT_ROOT) {
            config.theme.client_root = validate::parse_url_root(THEME_CLIENT_ROOT, &value)?;
        }
        if let Some(value) = get(DEFAULT_THEME) {
            config.default_theme = validate::parse_theme_file(DEFAULT_THEME, &value)?;
        }
        if let Some(value) = get(LOG_MISSING_THEME_ITEMS) {
            config.theme.log_missing_items =
                validate::parse_flag(LOG_MISSING_THEME_ITEMS, &value)?;
        }
        if let Some(value) = get(DEFAULT_LANGUAGE) {
            config.default_language = validate::parse_language(DEFAULT_LANGUAGE, &value)?;
        }
        if let Some(value) = get(LOG_LEVEL) {
            config.log_level = validate::parse_log_level(LOG_LEVEL, &value)?;
        }
        if let Some(value) = get(LOG_FORMAT) {
            config.log_format = Some(validate::parse_log_format(LOG_FORMAT, &value)?);
        }

        debug!(
            bind_addr = %config.bind_addr,
            board_id = config.board_id,
            error_policy = %config.error_policy,
            theme_dir = %config.theme_directory.display(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Connection string, required by the server.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when `DATABASE_URL` is unset.
    pub fn require_database_url(&self) -> ConfigResult<&str> {
        self.database_url
            .as_deref()
            .ok_or(ConfigError::MissingField {
                field: DATABASE_URL,
            })
    }
}
