//! Autonomy Coordinator (component G): converts an evolving emotional
//! state into bounded, well-timed outbound actions.
//!
//! The rolling-hour action cap reuses this codebase's sliding-window
//! rate limiting technique (see `core::rate_limiter::limiter::RateLimiter`
//! and its `check_and_record` pattern: one lock-guarded map, timestamps
//! pruned on each check) turned around to bound *outbound* volume
//! instead of inbound request volume.

use crate::config::AutonomyConfig;
use crate::core::plugin_manager::PluginManager;
use crate::core::router::{Request, RequestType, RequestRouter};
use async_trait::async_trait;
use chrono::{DateTime, Timelike, Utc};
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;
use tokio::sync::Notify;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Read-only snapshot access to the emotional-state engine, which lives
/// outside this crate entirely — the engine owns its own persistence
/// and decay model, and this crate only ever reads a point-in-time view.
#[async_trait]
pub trait EmotionalStateProvider: Send + Sync {
    /// Current intensity for `emotion_type`, in `[floor(e), 1.0]`.
    async fn value(&self, emotion_type: &str) -> f64;
    /// Minutes since the most recent user activity, if known.
    async fn minutes_since_last_activity(&self) -> Option<i64>;
}

#[derive(Debug, Clone)]
pub struct AutonomyAction {
    pub trigger_type: String,
    pub platform: String,
    pub content: String,
    pub context: HashMap<String, serde_json::Value>,
    pub priority: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TriggerState {
    Idle,
    Cooldown,
}

#[derive(Debug, Clone)]
pub struct FiringRecord {
    pub trigger_type: String,
    pub fired_at: DateTime<Utc>,
    pub action_executed: bool,
}

const SPONTANEOUS_TRIGGERS: &[&str] = &["spontaneous_lonely", "spontaneous_excited"];

/// Appropriate hours, evaluated in UTC uniformly rather than any
/// host-local timezone: morning/afternoon/evening bands.
fn is_appropriate_hour(now: DateTime<Utc>) -> bool {
    let hour = now.hour();
    (7..11).contains(&hour) || (13..17).contains(&hour) || (18..22).contains(&hour)
}

struct TriggerRuntime {
    state: TriggerState,
    last_fired: Option<DateTime<Utc>>,
}

pub struct AutonomyCoordinator {
    config: AutonomyConfig,
    state_provider: Arc<dyn EmotionalStateProvider>,
    router: Arc<RequestRouter>,
    plugins: Arc<PluginManager>,
    runtime: RwLock<HashMap<String, TriggerRuntime>>,
    rate_window: RwLock<VecDeque<DateTime<Utc>>>,
    history: RwLock<VecDeque<FiringRecord>>,
    running: AtomicBool,
    stop: Arc<Notify>,
    task: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl AutonomyCoordinator {
    /// `plugins` is consulted for the "platform availability OK" clause
    /// of the trigger fire condition (SPEC_FULL.md §3, §4.6 step 4):
    /// a trigger whose target platform plugin is not loaded does not fire.
    pub fn new(
        config: AutonomyConfig,
        state_provider: Arc<dyn EmotionalStateProvider>,
        router: Arc<RequestRouter>,
        plugins: Arc<PluginManager>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            state_provider,
            router,
            plugins,
            runtime: RwLock::new(HashMap::new()),
            rate_window: RwLock::new(VecDeque::new()),
            history: RwLock::new(VecDeque::new()),
            running: AtomicBool::new(false),
            stop: Arc::new(Notify::new()),
            task: parking_lot::Mutex::new(None),
        })
    }

    pub fn start_background(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("autonomy coordinator tick loop already running");
            return;
        }
        let this = self.clone();
        let stop = self.stop.clone();
        let interval = std::time::Duration::from_secs(this.config.check_interval_seconds);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        this.evaluate_tick().await;
                    }
                    _ = stop.notified() => {
                        debug!("autonomy coordinator tick loop stopping");
                        break;
                    }
                }
            }
        });
        *self.task.lock() = Some(handle);
    }

    pub async fn stop_background(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.stop.notify_one();
        if let Some(handle) = self.task.lock().take() {
            let _ = handle.await;
        }
    }

    /// One evaluation tick, matching the 6-step algorithm.
    pub async fn evaluate_tick(&self) {
        let now = Utc::now();
        let mut triggers: Vec<(String, crate::config::models::autonomy::TriggerConfig)> =
            self.config.trigger_thresholds.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        triggers.sort_by(|a, b| b.1.priority.cmp(&a.1.priority).then_with(|| a.0.cmp(&b.0)));

        for (trigger_type, trigger_config) in triggers {
            if !self.rate_limit_allows().await {
                debug!("autonomy rate cap reached, skipping remaining triggers this tick");
                break;
            }

            let value = self.state_provider.value(&trigger_type).await;
            if value < trigger_config.threshold {
                continue;
            }
            if !self.cooldown_elapsed(&trigger_type, now, trigger_config.cooldown_minutes).await {
                continue;
            }
            if !self.platform_available(&self.config.default_platform) {
                debug!(platform = %self.config.default_platform, trigger = %trigger_type, "platform unavailable, trigger not fired");
                continue;
            }
            if SPONTANEOUS_TRIGGERS.contains(&trigger_type.as_str()) && !self.spontaneous_timing_ok(now).await {
                continue;
            }

            let action = AutonomyAction {
                trigger_type: trigger_type.clone(),
                platform: self.config.default_platform.clone(),
                content: format!("[{trigger_type}] intensity={value:.2}")
                    .chars()
                    .take(self.config.max_message_length)
                    .collect(),
                context: HashMap::from([("emotion".to_string(), serde_json::json!(trigger_type)), ("value".to_string(), serde_json::json!(value))]),
                priority: trigger_config.priority,
            };

            self.mark_fired(&trigger_type, now).await;
            self.record_rate_window(now).await;

            let executed = self.dispatch(action).await;
            self.push_history(FiringRecord {
                trigger_type: trigger_type.clone(),
                fired_at: now,
                action_executed: executed,
            })
            .await;
        }
    }

    async fn cooldown_elapsed(&self, trigger_type: &str, now: DateTime<Utc>, cooldown_minutes: u64) -> bool {
        let mut runtime = self.runtime.write().await;
        let Some(entry) = runtime.get_mut(trigger_type) else {
            return true;
        };
        if entry.state == TriggerState::Idle {
            return true;
        }
        let Some(last_fired) = entry.last_fired else {
            return true;
        };
        let elapsed = (now - last_fired).num_minutes() >= cooldown_minutes as i64;
        if elapsed {
            entry.state = TriggerState::Idle;
        }
        elapsed
    }

    async fn mark_fired(&self, trigger_type: &str, now: DateTime<Utc>) {
        let mut runtime = self.runtime.write().await;
        runtime.insert(
            trigger_type.to_string(),
            TriggerRuntime {
                state: TriggerState::Cooldown,
                last_fired: Some(now),
            },
        );
    }

    /// "Platform availability OK" clause of the trigger fire condition:
    /// the target platform's plugin must be loaded. A platform with no
    /// registered plugin at all (e.g. `internal`) is never gated here —
    /// only a registered-but-not-loaded/disabled plugin blocks firing.
    fn platform_available(&self, platform: &str) -> bool {
        if self.plugins.list_plugins().iter().all(|p| p.name != platform) {
            return true;
        }
        self.plugins.get_plugin(platform).is_some()
    }

    async fn spontaneous_timing_ok(&self, now: DateTime<Utc>) -> bool {
        if !is_appropriate_hour(now) {
            return false;
        }
        match self.state_provider.minutes_since_last_activity().await {
            Some(minutes) => (30..=360).contains(&minutes),
            None => false,
        }
    }

    /// Sliding-window rate cap: prune entries older than one hour, then
    /// check remaining count against `max_autonomous_per_hour`.
    async fn rate_limit_allows(&self) -> bool {
        let now = Utc::now();
        let mut window = self.rate_window.write().await;
        while let Some(&front) = window.front() {
            if (now - front).num_seconds() > 3600 {
                window.pop_front();
            } else {
                break;
            }
        }
        (window.len() as u32) < self.config.max_autonomous_per_hour
    }

    async fn record_rate_window(&self, now: DateTime<Utc>) {
        self.rate_window.write().await.push_back(now);
    }

    async fn push_history(&self, record: FiringRecord) {
        let mut history = self.history.write().await;
        if history.len() >= self.config.firing_history_size {
            history.pop_front();
        }
        history.push_back(record);
    }

    /// Deliver the action to the Request Router as an internal request.
    /// A delivery failure still counts the firing for cooldown purposes
    /// but is recorded as `action_executed = false`.
    async fn dispatch(&self, action: AutonomyAction) -> bool {
        let request = Request {
            id: None,
            request_type: RequestType::Internal,
            content: serde_json::json!({
                "autonomy_trigger": action.trigger_type,
                "platform": action.platform,
                "content": action.content,
            }),
            context: action.context,
            priority: Some(action.priority),
            requested_timeout: None,
        };
        let envelope = self.router.route(request).await;
        matches!(envelope.status, crate::core::router::RouteStatus::Success)
    }

    pub async fn firing_history(&self) -> Vec<FiringRecord> {
        self.history.read().await.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IsolationConfig;
    use crate::core::isolation::IsolatedPluginRunner;
    use crate::core::plugin_manager::PluginManager;
    use crate::monitoring::MetricsRegistry;
    use dashmap::DashMap;

    struct FixedState {
        values: HashMap<&'static str, f64>,
        idle_minutes: Option<i64>,
    }

    #[async_trait]
    impl EmotionalStateProvider for FixedState {
        async fn value(&self, emotion_type: &str) -> f64 {
            *self.values.get(emotion_type).unwrap_or(&0.0)
        }

        async fn minutes_since_last_activity(&self) -> Option<i64> {
            self.idle_minutes
        }
    }

    fn plugins() -> Arc<PluginManager> {
        PluginManager::new(MetricsRegistry::new())
    }

    fn router() -> Arc<RequestRouter> {
        let metrics = MetricsRegistry::new();
        let plugins = PluginManager::new(metrics.clone());
        let isolation = IsolatedPluginRunner::new(IsolationConfig::default(), metrics.clone());
        RequestRouter::new(crate::config::RouterConfig::default(), plugins, isolation, metrics, Arc::new(DashMap::new()))
    }

    #[tokio::test]
    async fn below_threshold_never_fires() {
        let state = Arc::new(FixedState { values: HashMap::new(), idle_minutes: Some(60) });
        let coordinator = AutonomyCoordinator::new(AutonomyConfig::default(), state, router(), plugins());
        coordinator.evaluate_tick().await;
        assert!(coordinator.firing_history().await.is_empty());
    }

    #[tokio::test]
    async fn above_threshold_fires_non_spontaneous_trigger() {
        let mut values = HashMap::new();
        values.insert("frustration", 0.9);
        let state = Arc::new(FixedState { values, idle_minutes: None });
        let coordinator = AutonomyCoordinator::new(AutonomyConfig::default(), state, router(), plugins());
        coordinator.evaluate_tick().await;
        let history = coordinator.firing_history().await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].trigger_type, "frustration");
    }

    #[tokio::test]
    async fn cooldown_blocks_immediate_refire() {
        let mut values = HashMap::new();
        values.insert("frustration", 0.9);
        let state = Arc::new(FixedState { values, idle_minutes: None });
        let coordinator = AutonomyCoordinator::new(AutonomyConfig::default(), state, router(), plugins());
        coordinator.evaluate_tick().await;
        coordinator.evaluate_tick().await;
        assert_eq!(coordinator.firing_history().await.len(), 1);
    }

    #[tokio::test]
    async fn unavailable_platform_blocks_firing() {
        use async_trait::async_trait;
        use crate::core::plugin::{Plugin, PluginHealth};

        struct NoopPlugin;
        #[async_trait]
        impl Plugin for NoopPlugin {
            async fn initialize(&self, _config: &HashMap<String, serde_json::Value>) -> bool {
                true
            }
            async fn shutdown(&self) {}
            async fn health_check(&self) -> PluginHealth {
                PluginHealth::healthy(1)
            }
            async fn handle_request(&self, request: serde_json::Value) -> std::result::Result<serde_json::Value, String> {
                Ok(request)
            }
        }

        let mut values = HashMap::new();
        values.insert("frustration", 0.9);
        let state = Arc::new(FixedState { values, idle_minutes: None });

        let plugins = plugins();
        // "discord" (the default platform) is registered but never
        // loaded/enabled, so it must gate firing.
        plugins.register_factory("discord", Arc::new(|| Arc::new(NoopPlugin) as Arc<dyn Plugin>));

        let coordinator = AutonomyCoordinator::new(AutonomyConfig::default(), state, router(), plugins);
        coordinator.evaluate_tick().await;
        assert!(coordinator.firing_history().await.is_empty());
    }

    #[tokio::test]
    async fn rate_cap_stops_further_firing_within_the_hour() {
        let mut values = HashMap::new();
        for name in ["loneliness", "excitement", "frustration", "jealousy", "vulnerability"] {
            values.insert(name, 1.0);
        }
        let state = Arc::new(FixedState { values, idle_minutes: None });
        let mut config = AutonomyConfig::default();
        config.max_autonomous_per_hour = 2;
        let coordinator = AutonomyCoordinator::new(config, state, router(), plugins());
        coordinator.evaluate_tick().await;
        assert!(coordinator.firing_history().await.len() <= 2);
    }

    #[test]
    fn appropriate_hours_cover_three_bands_and_exclude_gaps() {
        use chrono::TimeZone;
        let morning = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        let midnight = Utc.with_ymd_and_hms(2026, 1, 1, 2, 0, 0).unwrap();
        assert!(is_appropriate_hour(morning));
        assert!(!is_appropriate_hour(midnight));
    }
}
