//! The plugin capability set (component C's "plugin interface") and the
//! metadata/health types the Plugin Manager tracks per plugin.
//!
//! Dynamic dispatch over this capability set is expressed as a trait
//! object, matching the way this codebase dispatches over its provider
//! trait (see `core::providers::Provider`): one `async_trait` interface,
//! a `name -> factory` registry, no reflection.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Health reported by a single plugin's `health_check()` probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginHealth {
    pub status: HealthStatus,
    pub response_time_ms: u64,
    pub last_check: DateTime<Utc>,
    pub error: Option<String>,
}

impl PluginHealth {
    pub fn healthy(response_time_ms: u64) -> Self {
        Self {
            status: HealthStatus::Healthy,
            response_time_ms,
            last_check: Utc::now(),
            error: None,
        }
    }

    pub fn unhealthy(response_time_ms: u64, error: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            response_time_ms,
            last_check: Utc::now(),
            error: Some(error.into()),
        }
    }
}

/// Three-level health classification. `Degraded` is surfaced via
/// metrics only — it is not tied to any specific scaler or router
/// behavior here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        }
    }
}

/// A plugin's position in its own lifecycle state machine.
///
/// `instance` is non-nil iff state is one of `Loaded`/`Active`/`Inactive`;
/// that invariant is upheld by [`super::plugin_manager::PluginManager`],
/// not by this type itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginState {
    Unregistered,
    Registered,
    Loading,
    Loaded,
    Active,
    Inactive,
    Error,
    Unloading,
}

/// Snapshot of one plugin's identity, lifecycle state, and last known
/// health, independent of the live instance (which is held separately
/// by the manager so metadata stays `Clone`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginMetadata {
    pub name: String,
    pub state: PluginState,
    pub config: HashMap<String, Value>,
    pub loaded_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub health_status: HealthStatus,
    pub last_health_check: Option<DateTime<Utc>>,
}

impl PluginMetadata {
    pub fn registered(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: PluginState::Registered,
            config: HashMap::new(),
            loaded_at: None,
            error: None,
            health_status: HealthStatus::Unhealthy,
            last_health_check: None,
        }
    }
}

/// The capability set every platform plugin must implement. Invoked
/// both directly (health checks, which run in-process) and from inside
/// the isolated child process (`handle_request`, via the loader D
/// spawns) — the trait itself does not know which caller it has.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Initialize the plugin with its configuration. Returns `false`
    /// (not an error) when the plugin declines to start with the given
    /// config; the manager treats that the same as an `Err`.
    async fn initialize(&self, config: &HashMap<String, Value>) -> bool;

    /// Release any resources held by the plugin. Always called on
    /// unload, even if initialize failed.
    async fn shutdown(&self);

    /// Self-reported health; must never panic, even mid-failure.
    async fn health_check(&self) -> PluginHealth;

    /// Handle one request, returning a JSON-compatible response map.
    async fn handle_request(&self, request: Value) -> Result<Value, String>;
}

/// A name-keyed factory table, built at startup from a static list
/// rather than discovered via reflection.
pub type PluginFactory = Arc<dyn Fn() -> Arc<dyn Plugin> + Send + Sync>;
