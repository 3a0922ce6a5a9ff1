use std::sync::Arc;

use agora_api::{ApiDependencies, ApiServer, DatabaseHealth};
use agora_config::{ForumConfig, LogFormatSetting};
use agora_data::ForumStore;
use agora_telemetry::{GlobalContextGuard, LogFormat, LoggingConfig, Metrics, build_sha};
use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};

/// Connections held by the forum pool.
const POOL_MAX_CONNECTIONS: u32 = 8;

/// Dependencies required to bootstrap the forum host.
pub(crate) struct BootstrapDependencies {
    config: ForumConfig,
    telemetry: Metrics,
}

impl BootstrapDependencies {
    /// Construct production dependencies from the environment.
    pub(crate) fn from_env() -> AppResult<Self> {
        let config =
            ForumConfig::from_env().map_err(|err| AppError::config("config.from_env", err))?;
        Self::new(config)
    }

    fn new(config: ForumConfig) -> AppResult<Self> {
        let telemetry =
            Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;
        Ok(Self { config, telemetry })
    }
}

/// Entry point for the forum host boot sequence.
///
/// # Errors
///
/// Returns an error if configuration, logging, the database, or the listener
/// fail during startup.
pub async fn run_app() -> AppResult<()> {
    let dependencies = BootstrapDependencies::from_env()?;
    run_app_with(dependencies).await
}

/// Boot sequence over injected dependencies.
pub(crate) async fn run_app_with(dependencies: BootstrapDependencies) -> AppResult<()> {
    let BootstrapDependencies { config, telemetry } = dependencies;

    agora_telemetry::init_logging(&logging_config(&config))
        .map_err(|err| AppError::telemetry("telemetry.init", err))?;
    let _context = GlobalContextGuard::new(config.error_policy.as_str(), config.board_id);

    info!(
        policy = %config.error_policy,
        board_id = config.board_id,
        "Agora forum bootstrap starting"
    );

    let database_url = config
        .require_database_url()
        .map_err(|err| AppError::config("config.database_url", err))?;
    let store = Arc::new(
        ForumStore::connect(database_url, POOL_MAX_CONNECTIONS)
            .await
            .map_err(|err| AppError::data("forum_store.connect", err))?,
    );

    if config.bypass_theme_cache() {
        info!("theme cache bypassed under the diagnostic policy");
    }
    if !config.default_theme_available() {
        warn!(
            theme = %config.default_theme,
            directory = %config.theme_directory.display(),
            "default theme is not available; pages render without a theme"
        );
    }

    let addr = config.bind_addr;
    let api = ApiServer::new(ApiDependencies {
        config,
        page_loads: store.clone(),
        provisioner: store.clone(),
        identities: store.clone(),
        event_log: store.clone(),
        database: Arc::new(StoreHealth { store }),
        telemetry,
    })
    .map_err(|err| AppError::api_server("api_server.new", err))?;

    info!(addr = %addr, "Launching forum listener");
    api.serve(addr)
        .await
        .map_err(|err| AppError::api_server("api_server.serve", err))?;
    info!("forum listener shutdown complete");
    Ok(())
}

fn logging_config(config: &ForumConfig) -> LoggingConfig<'_> {
    LoggingConfig {
        level: &config.log_level,
        format: log_format(config.log_format),
        build_sha: build_sha(),
    }
}

fn log_format(setting: Option<LogFormatSetting>) -> LogFormat {
    match setting {
        Some(LogFormatSetting::Json) => LogFormat::Json,
        Some(LogFormatSetting::Pretty) => LogFormat::Pretty,
        None => LogFormat::infer(),
    }
}

/// Database reachability check for the health endpoints.
struct StoreHealth {
    store: Arc<ForumStore>,
}

#[async_trait]
impl DatabaseHealth for StoreHealth {
    async fn ping(&self) -> anyhow::Result<()> {
        self.store.ping().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_core::ErrorPolicy;

    #[test]
    fn log_format_follows_setting() {
        assert_eq!(log_format(Some(LogFormatSetting::Json)), LogFormat::Json);
        assert_eq!(log_format(Some(LogFormatSetting::Pretty)), LogFormat::Pretty);
        assert_eq!(log_format(None), LogFormat::infer());
    }

    #[test]
    fn logging_config_uses_configured_level() {
        let config = ForumConfig {
            log_level: "agora_core=debug".to_string(),
            log_format: Some(LogFormatSetting::Json),
            ..ForumConfig::default()
        };
        let logging = logging_config(&config);
        assert_eq!(logging.level, "agora_core=debug");
        assert_eq!(logging.format, LogFormat::Json);
        assert_eq!(logging.build_sha, build_sha());
    }

    #[tokio::test]
    async fn missing_database_url_is_a_config_error() -> anyhow::Result<()> {
        let config = ForumConfig::from_lookup(|name| match name {
            agora_config::loader::ERROR_POLICY => Some("diagnostic".to_string()),
            _ => None,
        })?;
        assert_eq!(config.error_policy, ErrorPolicy::Diagnostic);

        let dependencies = BootstrapDependencies::new(config)?;
        let Err(err) = run_app_with(dependencies).await else {
            anyhow::bail!("expected startup to fail without DATABASE_URL");
        };
        assert!(
            matches!(
                err,
                AppError::Config {
                    operation: "config.database_url",
                    ..
                }
            ),
            "{err:?}"
        );
        Ok(())
    }
}
