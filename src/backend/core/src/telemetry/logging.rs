//! Structured logging for the sharing engine.
//!
//! - JSON output for production, pretty or compact output for development
//! - Global level plus per-module overrides (`sharing_core::sharing::groups=trace`)
//! - Optional span close events, which carry the duration of `#[instrument]`ed
//!   access checks and filter builds

use serde::Deserialize;
use std::collections::HashMap;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Global log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,

    /// Per-module log levels
    #[serde(default)]
    pub module_levels: HashMap<String, String>,

    /// Whether to include file/line information
    #[serde(default)]
    pub include_location: bool,

    /// Whether to include target (module path)
    #[serde(default = "default_include_target")]
    pub include_target: bool,

    /// Emit an event when a span closes
    #[serde(default)]
    pub log_span_close: bool,

    /// Write to stderr instead of stdout
    #[serde(default)]
    pub stderr: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            module_levels: HashMap::new(),
            include_location: false,
            include_target: default_include_target(),
            log_span_close: false,
            stderr: false,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
    Compact,
}

impl LoggingConfig {
    /// Level directives as an `EnvFilter`.
    pub fn env_filter(&self) -> anyhow::Result<EnvFilter> {
        let mut filter = EnvFilter::try_new(&self.level)?;
        for (module, level) in &self.module_levels {
            filter = filter.add_directive(format!("{}={}", module, level).parse()?);
        }
        Ok(filter)
    }

    /// The format actually used: JSON is swapped for pretty output in
    /// development.
    pub fn effective_format(&self, environment: &str) -> LogFormat {
        if environment == "development" && self.format == LogFormat::Json {
            LogFormat::Pretty
        } else {
            self.format
        }
    }
}

/// Install the global subscriber.
///
/// # Errors
///
/// Fails on invalid level directives or when a global subscriber is already set.
pub fn init_logging(config: &LoggingConfig, environment: &str) -> anyhow::Result<()> {
    let filter = config.env_filter()?;
    let span_events = if config.log_span_close {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let writer = if config.stderr {
        BoxMakeWriter::new(std::io::stderr)
    } else {
        BoxMakeWriter::new(std::io::stdout)
    };

    let base = fmt::layer()
        .with_writer(writer)
        .with_span_events(span_events)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_target(config.include_target);

    let layer: Box<dyn Layer<Registry> + Send + Sync> = match config.effective_format(environment)
    {
        LogFormat::Json => base.json().boxed(),
        LogFormat::Pretty => base.pretty().boxed(),
        LogFormat::Compact => base.compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .try_init()?;

    Ok(())
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_include_target() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_config_defaults() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Json);
        assert!(config.include_target);
        assert!(!config.log_span_close);
    }

    #[test]
    fn test_development_prefers_pretty() {
        let config = LoggingConfig::default();
        assert_eq!(config.effective_format("development"), LogFormat::Pretty);
        assert_eq!(config.effective_format("production"), LogFormat::Json);

        let compact = LoggingConfig {
            format: LogFormat::Compact,
            ..LoggingConfig::default()
        };
        assert_eq!(compact.effective_format("development"), LogFormat::Compact);
    }

    #[test]
    fn test_module_levels_become_directives() {
        let mut config = LoggingConfig::default();
        config
            .module_levels
            .insert("sharing_core::sharing::groups".to_string(), "trace".to_string());
        let filter = config.env_filter().unwrap();
        assert!(filter.to_string().contains("sharing_core::sharing::groups=trace"));
    }

    #[test]
    fn test_invalid_module_level_is_rejected() {
        let mut config = LoggingConfig::default();
        config
            .module_levels
            .insert("sharing_core".to_string(), "loud".to_string());
        assert!(config.env_filter().is_err());
    }
}
