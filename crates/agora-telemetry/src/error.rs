//! Telemetry failures, tagged with the forum metric family they concern.

use std::string::FromUtf8Error;

use prometheus::Error as PrometheusError;
use thiserror::Error;
use tracing_subscriber::util::TryInitError;

use crate::metrics::MetricFamily;

/// Result alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Errors raised while wiring or exporting forum telemetry.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Another global subscriber was installed first.
    #[error("forum log subscriber could not be installed")]
    SubscriberInstall {
        /// Underlying subscriber error.
        #[source]
        source: TryInitError,
    },
    /// A forum collector could not be built from its family definition.
    #[error("forum metric collector could not be built")]
    Collector {
        /// Family whose options were rejected.
        family: MetricFamily,
        /// Underlying Prometheus error.
        #[source]
        source: PrometheusError,
    },
    /// A forum collector could not be added to the registry.
    #[error("forum metric collector could not be registered")]
    Register {
        /// Family that failed to register.
        family: MetricFamily,
        /// Underlying Prometheus error.
        #[source]
        source: PrometheusError,
    },
    /// Rendering `/metrics` failed.
    #[error("forum metrics exposition failed")]
    Exposition {
        /// Stage that failed.
        #[source]
        source: ExpositionError,
    },
}

impl TelemetryError {
    /// Metric family the failure concerns, when it concerns a single one.
    #[must_use]
    pub const fn family(&self) -> Option<MetricFamily> {
        match self {
            Self::Collector { family, .. } | Self::Register { family, .. } => Some(*family),
            Self::SubscriberInstall { .. } | Self::Exposition { .. } => None,
        }
    }
}

/// Stage of the text exposition that failed.
#[derive(Debug, Error)]
pub enum ExpositionError {
    /// The Prometheus text encoder rejected a family.
    #[error("text encoding failed")]
    Encode(#[source] PrometheusError),
    /// The encoder produced bytes that are not UTF-8.
    #[error("encoded output was not utf-8")]
    Utf8(#[source] FromUtf8Error),
}

impl From<ExpositionError> for TelemetryError {
    fn from(source: ExpositionError) -> Self {
        Self::Exposition { source }
    }
}
