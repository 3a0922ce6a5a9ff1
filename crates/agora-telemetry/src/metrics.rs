//! Prometheus registry for the forum host.
//!
//! # Design
//! - Collector registration is private; callers get intent-named recorders.
//! - Bootstrap counters are fed from the per-request report so the domain crate
//!   stays free of metrics types.

use std::fmt;
use std::sync::Arc;

use prometheus::core::Collector;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{ExpositionError, Result, TelemetryError};

/// Collector families exported by the forum host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricFamily {
    /// Responses by forum page class and status code.
    HttpRequests,
    /// Page-load procedure calls.
    PageLoadLookups,
    /// Forum profile provisioning attempts.
    UserProvisioning,
    /// Bootstrap errors surfaced to the host, by kind.
    BootstrapFailures,
    /// Bootstrap failures answered with an info redirect.
    BootstrapRedirects,
    /// Theme lookups with no matching resource.
    ThemeItemsMissing,
}

impl MetricFamily {
    /// Exported metric name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::HttpRequests => "http_requests_total",
            Self::PageLoadLookups => "page_load_lookups_total",
            Self::UserProvisioning => "user_provisioning_total",
            Self::BootstrapFailures => "bootstrap_failures_total",
            Self::BootstrapRedirects => "bootstrap_redirects_total",
            Self::ThemeItemsMissing => "theme_items_missing_total",
        }
    }

    const fn help(self) -> &'static str {
        match self {
            Self::HttpRequests => "HTTP responses by forum page class and status",
            Self::PageLoadLookups => "Page-load procedure calls",
            Self::UserProvisioning => "Forum profile provisioning attempts",
            Self::BootstrapFailures => "Page bootstrap failures by kind",
            Self::BootstrapRedirects => "Page bootstrap failures answered with an info redirect",
            Self::ThemeItemsMissing => "Theme lookups with no matching resource",
        }
    }

    /// Label names, empty for plain counters.
    #[must_use]
    pub const fn labels(self) -> &'static [&'static str] {
        match self {
            Self::HttpRequests => &["page", "code"],
            Self::BootstrapFailures => &["kind"],
            Self::PageLoadLookups
            | Self::UserProvisioning
            | Self::BootstrapRedirects
            | Self::ThemeItemsMissing => &[],
        }
    }

    fn opts(self) -> Opts {
        Opts::new(self.name(), self.help())
    }
}

impl fmt::Display for MetricFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Shared metrics registry.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    http_requests_total: IntCounterVec,
    page_load_lookups_total: IntCounter,
    user_provisioning_total: IntCounter,
    bootstrap_failures_total: IntCounterVec,
    bootstrap_redirects_total: IntCounter,
    theme_items_missing_total: IntCounter,
}

/// Point-in-time counter values, served by `/health/full`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Page-load procedure calls.
    pub page_load_lookups_total: u64,
    /// Forum profile provisioning attempts.
    pub user_provisioning_total: u64,
    /// Bootstrap redirects to the info page.
    pub bootstrap_redirects_total: u64,
    /// Theme lookups that found no resource.
    pub theme_items_missing_total: u64,
}

impl Metrics {
    /// Build a registry with every forum collector registered.
    ///
    /// # Errors
    ///
    /// Returns an error if a collector cannot be built or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let http_requests_total = counter_vec(&registry, MetricFamily::HttpRequests)?;
        let page_load_lookups_total = counter(&registry, MetricFamily::PageLoadLookups)?;
        let user_provisioning_total = counter(&registry, MetricFamily::UserProvisioning)?;
        let bootstrap_failures_total = counter_vec(&registry, MetricFamily::BootstrapFailures)?;
        let bootstrap_redirects_total = counter(&registry, MetricFamily::BootstrapRedirects)?;
        let theme_items_missing_total = counter(&registry, MetricFamily::ThemeItemsMissing)?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                http_requests_total,
                page_load_lookups_total,
                user_provisioning_total,
                bootstrap_failures_total,
                bootstrap_redirects_total,
                theme_items_missing_total,
            }),
        })
    }

    /// Count one HTTP response for the forum page class `page`.
    pub fn inc_http_request(&self, page: &str, status: u16) {
        self.inner
            .http_requests_total
            .with_label_values(&[page, &status.to_string()])
            .inc();
    }

    /// Add the lookups and provisioning calls one bootstrap performed.
    pub fn record_bootstrap(&self, lookups: u64, provisions: u64) {
        self.inner.page_load_lookups_total.inc_by(lookups);
        self.inner.user_provisioning_total.inc_by(provisions);
    }

    /// Count a bootstrap failure of the given kind.
    pub fn inc_bootstrap_failure(&self, kind: &str) {
        self.inner
            .bootstrap_failures_total
            .with_label_values(&[kind])
            .inc();
    }

    /// Count a redirect to the info page.
    pub fn inc_bootstrap_redirect(&self) {
        self.inner.bootstrap_redirects_total.inc();
    }

    /// Count a theme lookup that found nothing.
    pub fn inc_theme_item_missing(&self) {
        self.inner.theme_items_missing_total.inc();
    }

    /// Render the registry in Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails or the output is not UTF-8.
    pub fn render(&self) -> Result<String> {
        let families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&families, &mut buffer)
            .map_err(ExpositionError::Encode)?;
        Ok(String::from_utf8(buffer).map_err(ExpositionError::Utf8)?)
    }

    /// Current values of the unlabelled counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            page_load_lookups_total: self.inner.page_load_lookups_total.get(),
            user_provisioning_total: self.inner.user_provisioning_total.get(),
            bootstrap_redirects_total: self.inner.bootstrap_redirects_total.get(),
            theme_items_missing_total: self.inner.theme_items_missing_total.get(),
        }
    }
}

fn counter(registry: &Registry, family: MetricFamily) -> Result<IntCounter> {
    let counter = IntCounter::with_opts(family.opts())
        .map_err(|source| TelemetryError::Collector { family, source })?;
    register(registry, family, &counter)?;
    Ok(counter)
}

fn counter_vec(registry: &Registry, family: MetricFamily) -> Result<IntCounterVec> {
    let counter = IntCounterVec::new(family.opts(), family.labels())
        .map_err(|source| TelemetryError::Collector { family, source })?;
    register(registry, family, &counter)?;
    Ok(counter)
}

fn register<C>(registry: &Registry, family: MetricFamily, collector: &C) -> Result<()>
where
    C: Collector + Clone + 'static,
{
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::Register { family, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_counters_accumulate() -> Result<()> {
        let metrics = Metrics::new()?;
        metrics.record_bootstrap(1, 0);
        metrics.record_bootstrap(2, 1);
        metrics.inc_bootstrap_redirect();
        metrics.inc_theme_item_missing();
        metrics.inc_theme_item_missing();

        assert_eq!(
            metrics.snapshot(),
            MetricsSnapshot {
                page_load_lookups_total: 3,
                user_provisioning_total: 1,
                bootstrap_redirects_total: 1,
                theme_items_missing_total: 2,
            }
        );
        Ok(())
    }

    #[test]
    fn render_includes_labelled_series() -> Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_http_request("info", 200);
        metrics.inc_bootstrap_failure("guest_not_found");

        let rendered = metrics.render()?;
        let http_line = rendered
            .lines()
            .find(|line| line.starts_with("http_requests_total{"))
            .expect("http series rendered");
        assert!(http_line.contains(r#"page="info""#));
        assert!(http_line.contains(r#"code="200""#));
        assert!(rendered.contains(r#"bootstrap_failures_total{kind="guest_not_found"} 1"#));
        assert!(rendered.contains("theme_items_missing_total 0"));
        Ok(())
    }

    #[test]
    fn a_second_registration_names_the_family() -> Result<()> {
        let registry = Registry::new();
        counter(&registry, MetricFamily::BootstrapRedirects)?;
        let err = counter(&registry, MetricFamily::BootstrapRedirects).expect_err("duplicate");
        assert_eq!(err.family(), Some(MetricFamily::BootstrapRedirects));
        assert!(matches!(err, TelemetryError::Register { .. }));
        Ok(())
    }

    #[test]
    fn clones_share_one_registry() -> Result<()> {
        let metrics = Metrics::new()?;
        let clone = metrics.clone();
        clone.inc_bootstrap_redirect();
        assert_eq!(metrics.snapshot().bootstrap_redirects_total, 1);
        Ok(())
    }

    #[test]
    fn snapshot_serializes_counter_names() -> Result<()> {
        let metrics = Metrics::new()?;
        let value = serde_json::to_value(metrics.snapshot()).expect("snapshot serializes");
        assert_eq!(value["page_load_lookups_total"], 0);
        assert_eq!(value["theme_items_missing_total"], 0);
        Ok(())
    }
}
