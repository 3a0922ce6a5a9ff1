//! # Design
//!
//! - Centralize application-level errors for bootstrap.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors without re-logging at call sites.

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration loading failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: agora_config::ConfigError,
    },
    /// Telemetry setup failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: agora_telemetry::TelemetryError,
    },
    /// Database connection or migration failed.
    #[error("database operation failed")]
    Data {
        /// Operation identifier.
        operation: &'static str,
        /// Source data error.
        source: agora_data::DataError,
    },
    /// Router construction or serving failed.
    #[error("api server operation failed")]
    ApiServer {
        /// Operation identifier.
        operation: &'static str,
        /// Source server error.
        source: anyhow::Error,
    },
}

impl AppError {
    pub(crate) const fn config(operation: &'static str, source: agora_config::ConfigError) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: agora_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn data(operation: &'static str, source: agora_data::DataError) -> Self {
        Self::Data { operation, source }
    }

    pub(crate) const fn api_server(operation: &'static str, source: anyhow::Error) -> Self {
        Self::ApiServer { operation, source }
    }

    /// Operation label attached to the failure.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::Config { operation, .. }
            | Self::Telemetry { operation, .. }
            | Self::Data { operation, .. }
            | Self::ApiServer { operation, .. } => operation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn app_error_helpers_build_variants() {
        let config = AppError::config(
            "config.database_url",
            agora_config::ConfigError::MissingField {
                field: "DATABASE_URL",
            },
        );
        assert!(matches!(config, AppError::Config { .. }));
        assert_eq!(config.operation(), "config.database_url");
        assert_eq!(config.to_string(), "configuration operation failed");
        assert_eq!(
            config.source().map(ToString::to_string).as_deref(),
            Some("missing configuration field")
        );

        let data = AppError::data(
            "forum_store.connect",
            agora_data::DataError::UnexpectedPayload {
                operation: "page_load",
                found: "array",
            },
        );
        assert!(matches!(data, AppError::Data { .. }));

        let api = AppError::api_server("api_server.serve", anyhow::anyhow!("bind refused"));
        assert_eq!(api.operation(), "api_server.serve");
        assert_eq!(
            api.source().map(ToString::to_string).as_deref(),
            Some("bind refused")
        );
    }
}
