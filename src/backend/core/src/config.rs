//! Configuration management.
//!
//! Values come from an optional file plus `SHARING__*` environment variables,
//! e.g. `SHARING__SHARING__MANAGER_SCOPE=transitive` or
//! `SHARING__DATABASE__URL=postgres://...`.

use serde::Deserialize;
use std::time::Duration;

use crate::error::{Result, SharingError};
use crate::sharing::groups::DEFAULT_MAX_GROUP_DEPTH;
use crate::sharing::models::ManagerScope;
use crate::telemetry::TelemetryConfig;

const ENV_PREFIX: &str = "SHARING";

/// Main configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Engine behaviour
    #[serde(default)]
    pub sharing: SharingConfig,

    /// Only needed by the PostgreSQL adapter
    #[serde(default)]
    pub database: Option<DatabaseConfig>,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SharingConfig {
    /// Parent hops followed when resolving a user's groups
    #[serde(default = "default_max_group_depth")]
    pub max_group_depth: usize,

    /// How far record access cascades up the manager chain
    #[serde(default)]
    pub manager_scope: ManagerScope,
}

impl Default for SharingConfig {
    fn default() -> Self {
        Self {
            max_group_depth: default_max_group_depth(),
            manager_scope: ManagerScope::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// How long to wait for a pooled connection
    #[serde(default = "default_acquire_timeout", with = "humantime_serde")]
    pub acquire_timeout: Duration,
}

// Default value functions
fn default_max_group_depth() -> usize { DEFAULT_MAX_GROUP_DEPTH }
fn default_max_connections() -> u32 { 10 }
fn default_min_connections() -> u32 { 1 }
fn default_acquire_timeout() -> Duration { Duration::from_secs(5) }

impl Config {
    /// Load configuration from the environment.
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from a specific file path; the environment still overrides it.
    pub fn from_file(path: &str) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.sharing.max_group_depth == 0 {
            return Err(SharingError::configuration(
                "sharing.max_group_depth must be at least 1",
            ));
        }
        if let Some(database) = &self.database {
            if database.url.is_empty() {
                return Err(SharingError::configuration("database.url must not be empty"));
            }
            if database.min_connections > database.max_connections {
                return Err(SharingError::configuration(
                    "database.min_connections exceeds database.max_connections",
                ));
            }
        }
        Ok(())
    }
}
