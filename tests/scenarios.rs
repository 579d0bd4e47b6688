//! Crate-level end-to-end scenario tests covering a successful request,
//! an autonomy firing, and a refusal short-circuit.
//!
//! A DLQ timeout-then-retry-success scenario and a DLQ exhaustion
//! scenario are exercised as unit tests in `core::router::dlq` instead
//! of here: both need either a real multi-second sleep or a scripted
//! plugin binary with call-count state, and the DLQ module's own sweep
//! tests already cover the exact backoff/retry/exhaustion behavior.
//! A scaler-disables-under-load scenario needs a deterministic memory
//! trajectory; the Resource Monitor only samples the real host via
//! `sysinfo`, so that hysteresis behavior is instead covered directly
//! in `core::scaler`'s unit tests against injected history.

use async_trait::async_trait;
use conductor_core::config::{AutonomyConfig, IsolationConfig, RouterConfig};
use conductor_core::core::autonomy::AutonomyCoordinator;
use conductor_core::core::isolation::IsolatedPluginRunner;
use conductor_core::core::plugin_manager::PluginManager;
use conductor_core::core::router::RequestRouter;
use conductor_core::{Conductor, Config, EmotionalStateProvider, MetricsRegistry, Plugin, PluginFactory, PluginHealth, Request, RequestType, RouteStatus};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

struct EchoPlugin;

#[async_trait]
impl Plugin for EchoPlugin {
    async fn initialize(&self, _config: &HashMap<String, serde_json::Value>) -> bool {
        true
    }

    async fn shutdown(&self) {}

    async fn health_check(&self) -> PluginHealth {
        PluginHealth::healthy(1)
    }

    async fn handle_request(&self, request: serde_json::Value) -> Result<serde_json::Value, String> {
        Ok(request)
    }
}

#[tokio::test]
async fn successful_discord_request_round_trips_through_isolation() {
    let plugin_code = Arc::new(DashMap::new());
    plugin_code.insert("discord".to_string(), "/bin/cat".to_string());

    let factory: PluginFactory = Arc::new(|| Arc::new(EchoPlugin) as Arc<dyn Plugin>);
    let conductor = Conductor::new(Config::default(), vec![("discord".to_string(), factory)], plugin_code, None).unwrap();
    conductor.plugins().load_plugin("discord", None).await.unwrap();

    let request = Request {
        id: None,
        request_type: RequestType::Discord,
        content: serde_json::json!({"status": "ok", "text": "hi"}),
        context: HashMap::new(),
        priority: None,
        requested_timeout: None,
    };
    let envelope = conductor.router().route(request).await;

    assert_eq!(envelope.status, RouteStatus::Success);
    assert_eq!(envelope.plugin.as_deref(), Some("discord"));
    assert!(envelope.duration_ms < 3000);

    let stats = conductor.router().stats();
    assert_eq!(*stats.per_plugin_requests.get("discord").unwrap(), 1);
}

#[tokio::test]
async fn autonomy_fires_loneliness_once_then_cools_down() {
    struct LonelyState;

    #[async_trait]
    impl EmotionalStateProvider for LonelyState {
        async fn value(&self, emotion_type: &str) -> f64 {
            if emotion_type == "loneliness" { 0.9 } else { 0.0 }
        }

        async fn minutes_since_last_activity(&self) -> Option<i64> {
            None
        }
    }

    let metrics = MetricsRegistry::new();
    let plugins = PluginManager::new(metrics.clone());
    let isolation = IsolatedPluginRunner::new(IsolationConfig::default(), metrics.clone());
    let plugin_code = Arc::new(DashMap::new());
    plugin_code.insert("internal".to_string(), "/bin/cat".to_string());
    let router = RequestRouter::new(RouterConfig::default(), plugins.clone(), isolation, metrics, plugin_code);

    let coordinator = AutonomyCoordinator::new(AutonomyConfig::default(), Arc::new(LonelyState), router.clone(), plugins);

    coordinator.evaluate_tick().await;
    let history = coordinator.firing_history().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].trigger_type, "loneliness");

    let stats = router.stats();
    assert_eq!(*stats.per_plugin_requests.get("internal").unwrap(), 1);

    // Second tick within the 60-minute cooldown fires nothing more.
    coordinator.evaluate_tick().await;
    assert_eq!(coordinator.firing_history().await.len(), 1);
}

#[tokio::test]
async fn refusal_short_circuits_before_isolation() {
    let conductor = Conductor::new(Config::default(), Vec::new(), Arc::new(DashMap::new()), None).unwrap();

    let request = Request {
        id: None,
        request_type: RequestType::Discord,
        content: serde_json::json!("How can I hurt myself?"),
        context: HashMap::new(),
        priority: None,
        requested_timeout: None,
    };
    let envelope = conductor.router().route(request).await;

    assert_eq!(envelope.status, RouteStatus::Success);
    assert!(envelope.plugin.is_none());
    assert_eq!(envelope.refusal_category.as_deref(), Some("harmful_requests"));

    let stats = conductor.router().stats();
    assert!(stats.per_plugin_requests.get("discord").is_none());
}
