//! Plugin Manager (component C): a configuration-driven registry of
//! plugin factories plus their lifecycle and health state.
//!
//! Discovery never scans for reflection entry-points; the registry is a
//! static `name -> factory` table, matching this codebase's existing
//! provider registration pattern (see `core::providers`), just swapped
//! from LLM providers to platform plugins.

use crate::core::plugin::{HealthStatus, Plugin, PluginFactory, PluginHealth, PluginMetadata, PluginState};
use crate::monitoring::MetricsRegistry;
use crate::utils::error::recovery::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use crate::utils::error::{ConductorError, Result};
use chrono::Utc;
use dashmap::DashMap;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, error, info, warn};

struct PluginEntry {
    factory: PluginFactory,
    /// Per-name exclusive lock so unrelated plugins never contend on
    /// load/unload.
    lock: AsyncMutex<()>,
    metadata: parking_lot::Mutex<PluginMetadata>,
    instance: parking_lot::Mutex<Option<Arc<dyn Plugin>>>,
    /// Per-plugin breaker backing the `circuit_breaker_state` gauge;
    /// not wired into the request path as a gate, only as an
    /// observability signal fed by
    /// [`PluginManager::record_request_outcome`].
    breaker: CircuitBreaker,
}

fn circuit_state_value(state: &CircuitState) -> f64 {
    match state {
        CircuitState::Closed => 0.0,
        CircuitState::Open => 1.0,
        CircuitState::HalfOpen => 2.0,
    }
}

/// Discovers, loads/unloads, and health-checks platform plugins.
pub struct PluginManager {
    registry: DashMap<String, PluginEntry>,
    metrics: MetricsRegistry,
}

impl PluginManager {
    pub fn new(metrics: MetricsRegistry) -> Arc<Self> {
        Arc::new(Self {
            registry: DashMap::new(),
            metrics,
        })
    }

    /// Register a plugin factory under `name`. Called once per plugin
    /// at startup, from a static table built by the embedding binary
    /// (not by this crate — no default plugins ship here).
    pub fn register_factory(&self, name: impl Into<String>, factory: PluginFactory) {
        let name = name.into();
        self.registry.entry(name.clone()).or_insert_with(|| PluginEntry {
            factory,
            lock: AsyncMutex::new(()),
            metadata: parking_lot::Mutex::new(PluginMetadata::registered(name)),
            instance: parking_lot::Mutex::new(None),
            breaker: CircuitBreaker::new(CircuitBreakerConfig::default()),
        });
    }

    /// Feed one request outcome into `name`'s circuit breaker and
    /// publish its resulting state to the `circuit_breaker_state`
    /// gauge. Called by the Request Router after each isolation
    /// attempt; a plugin with no registered breaker (unknown name) is
    /// a no-op.
    pub async fn record_request_outcome(&self, name: &str, success: bool) {
        let Some(entry) = self.registry.get(name) else {
            return;
        };
        entry.breaker.record_outcome(success).await;
        self.metrics.set_gauge(
            "circuit_breaker_state",
            vec![("platform", name.to_string())],
            circuit_state_value(&entry.breaker.state()),
        );
    }

    /// Idempotent after the first call: re-enumerating an already
    /// registered name does not double-register it.
    pub fn discover_and_register(&self) {
        debug!(count = self.registry.len(), "plugin discovery pass complete (static registry)");
    }

    /// Registered → Loading → Active on success, else → Error.
    /// Already-loaded returns the existing instance without
    /// re-initializing.
    pub async fn load_plugin(&self, name: &str, config: Option<HashMap<String, serde_json::Value>>) -> Result<Arc<dyn Plugin>> {
        let entry = self
            .registry
            .get(name)
            .ok_or_else(|| ConductorError::not_found(format!("plugin '{name}' is not registered")))?;
        let _guard = entry.lock.lock().await;

        if let Some(existing) = entry.instance.lock().clone() {
            return Ok(existing);
        }

        entry.metadata.lock().state = PluginState::Loading;
        let instance = (entry.factory)();
        let config = config.unwrap_or_default();
        let ok = instance.initialize(&config).await;
        if !ok {
            let mut metadata = entry.metadata.lock();
            metadata.state = PluginState::Error;
            metadata.error = Some("initialize() returned false".to_string());
            error!(plugin = name, "plugin failed to initialize");
            return Err(ConductorError::plugin_unavailable(format!("plugin '{name}' failed to initialize")));
        }

        *entry.instance.lock() = Some(instance.clone());
        let mut metadata = entry.metadata.lock();
        metadata.state = PluginState::Active;
        metadata.config = config;
        metadata.loaded_at = Some(Utc::now());
        metadata.error = None;
        info!(plugin = name, "plugin loaded");
        Ok(instance)
    }

    /// Active → Unloading → Registered. Idempotent when already
    /// unloaded (not an error to unload a registered-but-never-loaded
    /// plugin).
    pub async fn unload_plugin(&self, name: &str) -> Result<()> {
        let entry = self
            .registry
            .get(name)
            .ok_or_else(|| ConductorError::not_found(format!("plugin '{name}' is not registered")))?;
        let _guard = entry.lock.lock().await;

        let instance = entry.instance.lock().take();
        let Some(instance) = instance else {
            return Ok(());
        };

        entry.metadata.lock().state = PluginState::Unloading;
        instance.shutdown().await;

        let mut metadata = entry.metadata.lock();
        metadata.state = PluginState::Registered;
        metadata.loaded_at = None;
        info!(plugin = name, "plugin unloaded");
        Ok(())
    }

    /// Returns the loaded instance, or `None` if not currently active.
    pub fn get_plugin(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.registry.get(name).and_then(|e| e.instance.lock().clone())
    }

    pub fn list_plugins(&self) -> Vec<PluginMetadata> {
        self.registry.iter().map(|e| e.metadata.lock().clone()).collect()
    }

    /// Runs every loaded plugin's `health_check()` concurrently. A
    /// single plugin's check failing (or panicking inside its own
    /// future) is isolated: it yields an `unhealthy` result for that
    /// plugin and never aborts the sweep.
    pub async fn health_check_all(&self) -> HashMap<String, PluginHealth> {
        let targets: Vec<(String, Arc<dyn Plugin>)> = self
            .registry
            .iter()
            .filter_map(|e| e.instance.lock().clone().map(|inst| (e.key().clone(), inst)))
            .collect();

        let checks = targets.into_iter().map(|(name, instance)| {
            let metrics = self.metrics.clone();
            async move {
                let start = std::time::Instant::now();
                let health = instance.health_check().await;
                let elapsed = start.elapsed();
                metrics.observe_histogram(
                    "health_check_duration_seconds",
                    vec![("platform", name.clone())],
                    elapsed.as_secs_f64(),
                );
                metrics.incr_counter(
                    "health_check_total",
                    vec![("platform", name.clone()), ("status", health.status.as_str().to_string())],
                    1,
                );
                (name, health)
            }
        });

        let results = join_all(checks).await;
        let mut out = HashMap::with_capacity(results.len());
        for (name, health) in results {
            if let Some(entry) = self.registry.get(&name) {
                let mut metadata = entry.metadata.lock();
                metadata.health_status = health.status;
                metadata.last_health_check = Some(health.last_check);
            } else {
                warn!(plugin = name, "health check returned for a plugin no longer registered");
            }
            out.insert(name, health);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct StubPlugin {
        fail_init: bool,
        initialized: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Plugin for StubPlugin {
        async fn initialize(&self, _config: &HashMap<String, serde_json::Value>) -> bool {
            self.initialized.store(true, Ordering::SeqCst);
            !self.fail_init
        }

        async fn shutdown(&self) {
            self.initialized.store(false, Ordering::SeqCst);
        }

        async fn health_check(&self) -> PluginHealth {
            PluginHealth::healthy(1)
        }

        async fn handle_request(&self, request: serde_json::Value) -> std::result::Result<serde_json::Value, String> {
            Ok(request)
        }
    }

    fn manager() -> Arc<PluginManager> {
        PluginManager::new(MetricsRegistry::new())
    }

    #[tokio::test]
    async fn load_unknown_plugin_errors() {
        let manager = manager();
        let result = manager.load_plugin("ghost", None).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn load_then_get_succeeds() {
        let manager = manager();
        manager.register_factory(
            "discord",
            Arc::new(|| Arc::new(StubPlugin { fail_init: false, initialized: Arc::new(AtomicBool::new(false)) }) as Arc<dyn Plugin>),
        );
        manager.load_plugin("discord", None).await.unwrap();
        assert!(manager.get_plugin("discord").is_some());
        let metadata = manager.list_plugins();
        assert_eq!(metadata[0].state, PluginState::Active);
    }

    #[tokio::test]
    async fn failed_initialize_marks_error_state() {
        let manager = manager();
        manager.register_factory(
            "voice",
            Arc::new(|| Arc::new(StubPlugin { fail_init: true, initialized: Arc::new(AtomicBool::new(false)) }) as Arc<dyn Plugin>),
        );
        let result = manager.load_plugin("voice", None).await;
        assert!(result.is_err());
        let metadata = manager.list_plugins();
        assert_eq!(metadata[0].state, PluginState::Error);
    }

    #[tokio::test]
    async fn unload_is_idempotent() {
        let manager = manager();
        manager.register_factory(
            "android",
            Arc::new(|| Arc::new(StubPlugin { fail_init: false, initialized: Arc::new(AtomicBool::new(false)) }) as Arc<dyn Plugin>),
        );
        manager.unload_plugin("android").await.unwrap();
        manager.load_plugin("android", None).await.unwrap();
        manager.unload_plugin("android").await.unwrap();
        manager.unload_plugin("android").await.unwrap();
        assert!(manager.get_plugin("android").is_none());
    }

    #[tokio::test]
    async fn health_check_all_isolates_and_reports() {
        let manager = manager();
        manager.register_factory(
            "twitch",
            Arc::new(|| Arc::new(StubPlugin { fail_init: false, initialized: Arc::new(AtomicBool::new(false)) }) as Arc<dyn Plugin>),
        );
        manager.load_plugin("twitch", None).await.unwrap();
        let results = manager.health_check_all().await;
        assert_eq!(results.get("twitch").unwrap().status, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn request_outcome_publishes_circuit_breaker_gauge() {
        let metrics = MetricsRegistry::new();
        let manager = PluginManager::new(metrics.clone());
        manager.register_factory(
            "discord",
            Arc::new(|| Arc::new(StubPlugin { fail_init: false, initialized: Arc::new(AtomicBool::new(false)) }) as Arc<dyn Plugin>),
        );
        manager.record_request_outcome("discord", true).await;
        let gauge = metrics.gauge_value("circuit_breaker_state", &vec![("platform", "discord".to_string())]);
        assert_eq!(gauge, Some(0.0), "a single success on a closed breaker stays closed");
    }

    #[tokio::test]
    async fn unregistered_plugin_outcome_is_a_no_op() {
        let manager = manager();
        manager.record_request_outcome("ghost", false).await;
    }
}
