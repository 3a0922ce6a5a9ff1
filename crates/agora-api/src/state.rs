//! Shared application state and the dependencies the host is built from.

use std::sync::{Arc, Mutex, MutexGuard};

use agora_config::ForumConfig;
use agora_core::{
    EventLogSink, IdentityResolver, PageBootstrapHandler, PageLoadStore, ThemeCache,
    ThemeResolver, ThemeSettings, UserProvisioner,
};
use agora_telemetry::Metrics;
use tracing::warn;

use crate::http::health::DatabaseHealth;
use crate::user_agent::UserAgentClassifier;

/// Collaborators wired into the HTTP host.
pub struct ApiDependencies {
    /// Resolved configuration.
    pub config: ForumConfig,
    /// Page-state lookup.
    pub page_loads: Arc<dyn PageLoadStore>,
    /// Forum profile provisioning.
    pub provisioner: Arc<dyn UserProvisioner>,
    /// Auth-cookie ticket resolution.
    pub identities: Arc<dyn IdentityResolver>,
    /// Event log used for missing theme items.
    pub event_log: Arc<dyn EventLogSink>,
    /// Database reachability check.
    pub database: Arc<dyn DatabaseHealth>,
    /// Shared metrics registry.
    pub telemetry: Metrics,
}

pub(crate) struct ApiState {
    pub(crate) config: ForumConfig,
    pub(crate) bootstrap: PageBootstrapHandler,
    pub(crate) identities: Arc<dyn IdentityResolver>,
    pub(crate) event_log: Arc<dyn EventLogSink>,
    pub(crate) database: Arc<dyn DatabaseHealth>,
    pub(crate) telemetry: Metrics,
    pub(crate) theme_settings: Arc<ThemeSettings>,
    pub(crate) theme_cache: Arc<ThemeCache>,
    pub(crate) user_agents: UserAgentClassifier,
    health_status: Mutex<Vec<String>>,
}

impl ApiState {
    pub(crate) fn new(deps: ApiDependencies, user_agents: UserAgentClassifier) -> Self {
        let ApiDependencies {
            config,
            page_loads,
            provisioner,
            identities,
            event_log,
            database,
            telemetry,
        } = deps;
        let bootstrap = PageBootstrapHandler::new(page_loads, provisioner, config.error_policy);
        let theme_cache = Arc::new(ThemeCache::with_bypass(
            config.theme_directory.clone(),
            config.bypass_theme_cache(),
        ));
        Self {
            theme_settings: Arc::new(config.theme.clone()),
            theme_cache,
            bootstrap,
            identities,
            event_log,
            database,
            telemetry,
            user_agents,
            config,
            health_status: Mutex::new(Vec::new()),
        }
    }

    /// Resolver for one request, with the board default theme preselected.
    pub(crate) async fn theme_resolver(
        &self,
        language: &str,
        user_id: Option<i32>,
    ) -> ThemeResolver {
        let mut resolver =
            ThemeResolver::new(Arc::clone(&self.theme_settings), Arc::clone(&self.theme_cache))
                .with_language(language)
                .with_user(user_id)
                .with_event_log(Arc::clone(&self.event_log));
        if let Err(err) = resolver.set_theme_file(&self.config.default_theme).await {
            warn!(
                error = %err,
                theme = %self.config.default_theme,
                "board default theme unavailable"
            );
        }
        resolver
    }

    pub(crate) fn add_degraded_component(&self, component: &str) {
        let mut guard = self.lock_health();
        if !guard.iter().any(|entry| entry == component) {
            guard.push(component.to_string());
            guard.sort();
            warn!(component, "component marked degraded");
        }
    }

    pub(crate) fn remove_degraded_component(&self, component: &str) {
        self.lock_health().retain(|entry| entry != component);
    }

    pub(crate) fn current_health_degraded(&self) -> Vec<String> {
        self.lock_health().clone()
    }

    fn lock_health(&self) -> MutexGuard<'_, Vec<String>> {
        self.health_status
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
