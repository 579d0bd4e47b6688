//! Configuration management for the Conductor core
//!
//! Handles loading, validation, and composition of every sub-config the
//! core depends on.

pub mod models;

pub use models::*;

use crate::utils::error::{ConductorError, Result};
use std::path::Path;
use tracing::{debug, info};

/// Top-level configuration for the Conductor core, composed from one
/// sub-config per component.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Config {
    #[serde(default)]
    pub resource: ResourceConfig,
    #[serde(default)]
    pub scaler: ScalerConfig,
    #[serde(default)]
    pub isolation: IsolationConfig,
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub autonomy: AutonomyConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[allow(dead_code)]
impl Config {
    /// Load configuration from a YAML file.
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {:?}", path);

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConductorError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Self = serde_yaml::from_str(&content)
            .map_err(|e| ConductorError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;

        debug!("Configuration loaded successfully");
        Ok(config)
    }

    /// Load configuration entirely from defaults, meant to be
    /// overridden by environment-derived layering upstream (the core
    /// itself does not read environment variables directly).
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from defaults");
        let config = Self::default();
        config.validate()?;
        Ok(config)
    }

    /// Validate the entire configuration.
    pub fn validate(&self) -> Result<()> {
        debug!("Validating configuration");

        self.resource
            .validate()
            .map_err(|e| ConductorError::Config(format!("resource config error: {}", e)))?;
        self.scaler
            .validate()
            .map_err(|e| ConductorError::Config(format!("scaler config error: {}", e)))?;
        self.isolation
            .validate()
            .map_err(|e| ConductorError::Config(format!("isolation config error: {}", e)))?;
        self.router
            .validate()
            .map_err(|e| ConductorError::Config(format!("router config error: {}", e)))?;
        self.autonomy
            .validate()
            .map_err(|e| ConductorError::Config(format!("autonomy config error: {}", e)))?;

        debug!("Configuration validation completed");
        Ok(())
    }

    /// Merge with another configuration (other takes precedence).
    pub fn merge(mut self, other: Self) -> Self {
        self.resource = self.resource.merge(other.resource);
        self.scaler = self.scaler.merge(other.scaler);
        self.isolation = self.isolation.merge(other.isolation);
        self.router = self.router.merge(other.router);
        self.autonomy = self.autonomy.merge(other.autonomy);
        self.monitoring = self.monitoring.merge(other.monitoring);
        self
    }

    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ConductorError::Config(format!("Failed to serialize config to JSON: {}", e)))
    }

    /// Convert to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| ConductorError::Config(format!("Failed to serialize config to YAML: {}", e)))
    }
}
