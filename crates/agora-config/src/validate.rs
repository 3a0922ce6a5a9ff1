//! Parsing helpers for individual configuration variables.
//!
//! Each helper takes the variable name so failures point at the exact input.

use std::net::SocketAddr;

use agora_core::ErrorPolicy;

use crate::error::{ConfigError, ConfigResult};
use crate::model::LogFormatSetting;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Parse a `host:port` listener address.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when the value is not a socket address.
pub fn parse_bind_addr(field: &'static str, value: &str) -> ConfigResult<SocketAddr> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid(field, value, "must be a socket address (host:port)"))
}

/// Parse a positive board identifier.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] for non-integers and values below 1.
pub fn parse_board_id(field: &'static str, value: &str) -> ConfigResult<i32> {
    let id: i32 = value
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid(field, value, "must be an integer"))?;
    if id < 1 {
        return Err(ConfigError::invalid(field, value, "must be positive"));
    }
    Ok(id)
}

/// Parse a boolean flag (`1/0`, `true/false`, `yes/no`, `on/off`).
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] for any other value.
pub fn parse_flag(field: &'static str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::invalid(field, value, "must be a boolean flag")),
    }
}

/// Parse the failure policy.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] unless the value names a policy.
pub fn parse_error_policy(field: &'static str, value: &str) -> ConfigResult<ErrorPolicy> {
    ErrorPolicy::parse(value)
        .ok_or_else(|| ConfigError::invalid(field, value, "must be 'diagnostic' or 'production'"))
}

/// Parse a theme file name: a plain `.xml` file name.
///
/// Existence is checked later against the theme directory.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] for empty, non-`.xml`, or path-like
/// names.
pub fn parse_theme_file(field: &'static str, value: &str) -> ConfigResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::invalid(field, value, "must not be empty"));
    }
    if !trimmed.to_lowercase().ends_with(".xml") {
        return Err(ConfigError::invalid(field, value, "must end in .xml"));
    }
    if trimmed.contains(['/', '\\']) || trimmed.contains("..") {
        return Err(ConfigError::invalid(field, value, "must be a plain file name"));
    }
    Ok(trimmed.to_string())
}

/// Parse a URL root used for theme asset paths.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] unless the value is an absolute path
/// or an `http(s)` URL.
pub fn parse_url_root(field: &'static str, value: &str) -> ConfigResult<String> {
    let trimmed = value.trim();
    let valid = trimmed.starts_with('/')
        || trimmed.starts_with("http://")
        || trimmed.starts_with("https://");
    if !valid {
        return Err(ConfigError::invalid(
            field,
            value,
            "must be an absolute path or http(s) URL",
        ));
    }
    Ok(trimmed.to_string())
}

/// Parse a language code (2 to 8 ASCII letters), upper-cased.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] for anything else.
pub fn parse_language(field: &'static str, value: &str) -> ConfigResult<String> {
    let trimmed = value.trim();
    if !(2..=8).contains(&trimmed.len()) || !trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ConfigError::invalid(field, value, "must be 2-8 ASCII letters"));
    }
    Ok(trimmed.to_ascii_uppercase())
}

/// Parse a tracing level name.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] for unknown levels.
pub fn parse_log_level(field: &'static str, value: &str) -> ConfigResult<String> {
    let level = value.trim().to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        return Err(ConfigError::invalid(
            field,
            value,
            "must be one of trace, debug, info, warn, error",
        ));
    }
    Ok(level)
}

/// Parse the log output format.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] unless the value is `json` or `pretty`.
pub fn parse_log_format(field: &'static str, value: &str) -> ConfigResult<LogFormatSetting> {
    match value.trim().to_ascii_lowercase().as_str() {
        "json" => Ok(LogFormatSetting::Json),
        "pretty" => Ok(LogFormatSetting::Pretty),
        _ => Err(ConfigError::invalid(field, value, "must be 'json' or 'pretty'")),
    }
}
