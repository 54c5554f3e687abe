//! Telemetry: structured logging and engine metrics.
//!
//! - **Logging**: JSON/pretty/compact output through `tracing-subscriber`
//! - **Metrics**: decision, filter and group resolution counters through the
//!   `metrics` facade; the host process installs the exporter
//!
//! # Example
//!
//! ```rust,no_run
//! use sharing_core::telemetry::{TelemetryConfig, init_telemetry};
//!
//! let config = TelemetryConfig::default();
//! init_telemetry(&config).expect("Failed to initialize telemetry");
//! ```

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use metrics::{
    describe_metrics, AccessDecisionCounter, FilterCounter, GroupResolutionCounter,
};

use serde::Deserialize;

/// Unified telemetry configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    /// Service name reported in the startup event
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Environment (development, staging, production)
    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            environment: default_environment(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_service_name() -> String {
    "sharing-core".to_string()
}

fn default_environment() -> String {
    std::env::var("SHARING_ENVIRONMENT").unwrap_or_else(|_| "development".to_string())
}

/// Install logging and register metric descriptions. Call once at startup.
///
/// # Errors
///
/// Returns an error if the log filter is invalid or a subscriber is already set.
pub fn init_telemetry(config: &TelemetryConfig) -> anyhow::Result<()> {
    init_logging(&config.logging, &config.environment)?;
    describe_metrics();

    ::tracing::info!(
        service = %config.service_name,
        environment = %config.environment,
        version = env!("CARGO_PKG_VERSION"),
        "Telemetry initialized"
    );
    Ok(())
}
