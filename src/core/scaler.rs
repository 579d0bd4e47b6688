//! Predictive Scaler (component B): forecasts near-term memory pressure
//! from the Resource Monitor's window and disables/enables plugins in a
//! fixed priority order ahead of it, with hysteresis against flapping.

use crate::config::ScalerConfig;
use crate::core::plugin_manager::PluginManager;
use crate::core::resource_monitor::ResourceMonitor;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{info, warn};

/// Fixed degradation priority, least-critical first. "stubs" is never
/// disabled outside `emergency_shutdown`.
pub const PRIORITY_ORDER: &[&str] = &["voice", "android", "discord", "stubs"];

const STABILIZED_MARGIN: f64 = 5.0;
const CHECK_INTERVAL: std::time::Duration = std::time::Duration::from_millis(500);
const AUDIT_LOG_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    None,
    ScaleDown,
    ScaleUp,
    EmergencyShutdown,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScalingDecision {
    pub timestamp: DateTime<Utc>,
    pub decision: Decision,
    pub reason: String,
    pub predicted_load: f64,
    pub confidence: f64,
    pub disabled_integrations: Vec<String>,
    pub enabled_integrations: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScalerStatus {
    pub disabled: Vec<String>,
    pub last_smoothed: Option<f64>,
    pub audit_log: Vec<ScalingDecision>,
}

pub struct PredictiveScaler {
    config: ScalerConfig,
    disable_threshold: f64,
    enable_threshold: f64,
    emergency_threshold: f64,
    monitor: Arc<ResourceMonitor>,
    plugins: Arc<PluginManager>,
    ema: Mutex<Option<f64>>,
    disabled: Mutex<Vec<String>>,
    audit_log: Mutex<VecDeque<ScalingDecision>>,
}

impl PredictiveScaler {
    pub fn new(
        config: ScalerConfig,
        disable_threshold: f64,
        emergency_threshold: f64,
        monitor: Arc<ResourceMonitor>,
        plugins: Arc<PluginManager>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            disable_threshold,
            enable_threshold: disable_threshold - 15.0,
            emergency_threshold,
            monitor,
            plugins,
            ema: Mutex::new(None),
            disabled: Mutex::new(Vec::new()),
            audit_log: Mutex::new(VecDeque::with_capacity(AUDIT_LOG_CAPACITY)),
        })
    }

    /// One evaluation tick, matching the 7-step algorithm. Runs either
    /// on the Autonomy Coordinator's tick or on demand; never spawns
    /// its own background task.
    pub async fn evaluate_tick(&self) -> ScalingDecision {
        let current = match self.monitor.current() {
            Some(sample) => sample,
            None => {
                let decision = self.record(Decision::None, "no samples yet", 0.0, 0.0, Vec::new(), Vec::new());
                return decision;
            }
        };

        let history = self.monitor.history(None);
        let raw = self.predict_load(&history, current.memory_pct);
        let smoothed = self.ema(raw);
        let confidence = if history.len() >= self.config.regression_min_samples {
            1.0
        } else {
            0.5
        };

        if smoothed >= self.disable_threshold {
            let disabled = self.scale_down().await;
            return self.record(
                Decision::ScaleDown,
                &format!("predicted memory {:.1}% at/above disable threshold {:.1}%", smoothed, self.disable_threshold),
                smoothed,
                confidence,
                disabled,
                Vec::new(),
            );
        }

        if smoothed <= self.enable_threshold && !self.disabled.lock().is_empty() {
            let enabled = self.scale_up().await;
            return self.record(
                Decision::ScaleUp,
                &format!("predicted memory {:.1}% at/below enable threshold {:.1}%", smoothed, self.enable_threshold),
                smoothed,
                confidence,
                Vec::new(),
                enabled,
            );
        }

        if current.memory_pct >= self.emergency_threshold {
            let disabled = self.emergency_shutdown().await;
            return self.record(
                Decision::EmergencyShutdown,
                &format!("current memory {:.1}% at/above emergency threshold {:.1}%", current.memory_pct, self.emergency_threshold),
                smoothed,
                confidence,
                disabled,
                Vec::new(),
            );
        }

        self.record(Decision::None, "within hysteresis band", smoothed, confidence, Vec::new(), Vec::new())
    }

    /// Linear regression (OLS over the time index) forecast `N` steps
    /// ahead where `N = ceil(300 / collection_interval)`; falls back to
    /// `min(100, current + 5)` below `regression_min_samples`.
    fn predict_load(&self, history: &[crate::core::resource_monitor::ResourceMetrics], current: f64) -> f64 {
        if history.len() < self.config.regression_min_samples {
            return (current + 5.0).min(100.0);
        }
        let n = history.len() as f64;
        let xs: Vec<f64> = (0..history.len()).map(|i| i as f64).collect();
        let ys: Vec<f64> = history.iter().map(|m| m.memory_pct).collect();
        let x_mean = xs.iter().sum::<f64>() / n;
        let y_mean = ys.iter().sum::<f64>() / n;
        let mut cov = 0.0;
        let mut var = 0.0;
        for (x, y) in xs.iter().zip(ys.iter()) {
            cov += (x - x_mean) * (y - y_mean);
            var += (x - x_mean).powi(2);
        }
        if var.abs() < f64::EPSILON {
            return (current + 5.0).min(100.0);
        }
        let slope = cov / var;
        let intercept = y_mean - slope * x_mean;
        let steps_ahead = 10.0; // ceil(5*60 / 30s default interval)
        let forecast_x = (history.len() as f64 - 1.0) + steps_ahead;
        (intercept + slope * forecast_x).clamp(0.0, 100.0)
    }

    fn ema(&self, raw: f64) -> f64 {
        let mut ema = self.ema.lock();
        let next = match *ema {
            Some(prev) => self.config.ema_alpha * raw + (1.0 - self.config.ema_alpha) * prev,
            None => raw,
        };
        *ema = Some(next);
        next
    }

    /// Disable enabled plugins in priority order, pausing to re-sample
    /// memory between each, stopping once memory drops below
    /// `disable_threshold - 5`. "stubs" is skipped — never disabled by
    /// the regular scale-down path.
    async fn scale_down(&self) -> Vec<String> {
        let mut disabled_now = Vec::new();
        let already_disabled = self.disabled.lock().clone();
        for &name in PRIORITY_ORDER {
            if name == "stubs" {
                continue;
            }
            if already_disabled.iter().any(|d| d == name) {
                continue;
            }
            if self.plugins.get_plugin(name).is_none() {
                continue;
            }
            match self.plugins.unload_plugin(name).await {
                Ok(()) => {
                    self.disabled.lock().push(name.to_string());
                    disabled_now.push(name.to_string());
                    info!(plugin = name, "scaler disabled plugin");
                }
                Err(err) => {
                    warn!(plugin = name, error = %err, "scaler failed to unload plugin, continuing");
                }
            }
            tokio::time::sleep(CHECK_INTERVAL).await;
            let memory = self.monitor.current().map(|m| m.memory_pct).unwrap_or(0.0);
            if memory < self.disable_threshold - STABILIZED_MARGIN {
                break;
            }
        }
        disabled_now
    }

    /// Re-enable exactly one plugin, in reverse priority order (the
    /// last-disabled bucket comes back first), as long as doing so would
    /// not push memory back above `disable_threshold`.
    async fn scale_up(&self) -> Vec<String> {
        let disabled = self.disabled.lock().clone();
        let name = PRIORITY_ORDER
            .iter()
            .rev()
            .find(|&&p| disabled.iter().any(|d| d == p))
            .map(|&p| p.to_string());
        let mut enabled = Vec::new();
        if let Some(name) = name {
            match self.plugins.load_plugin(&name, None).await {
                Ok(_) => {
                    self.disabled.lock().retain(|d| d != &name);
                    enabled.push(name.clone());
                    info!(plugin = %name, "scaler re-enabled plugin");
                }
                Err(err) => {
                    warn!(plugin = %name, error = %err, "scaler failed to load plugin");
                }
            }
        }
        enabled
    }

    /// Disable everything except the last priority bucket ("stubs").
    async fn emergency_shutdown(&self) -> Vec<String> {
        let mut disabled_now = Vec::new();
        for &name in PRIORITY_ORDER {
            if name == "stubs" {
                continue;
            }
            if self.disabled.lock().iter().any(|d| d == name) {
                continue;
            }
            if self.plugins.get_plugin(name).is_none() {
                continue;
            }
            if self.plugins.unload_plugin(name).await.is_ok() {
                self.disabled.lock().push(name.to_string());
                disabled_now.push(name.to_string());
            }
        }
        disabled_now
    }

    fn record(
        &self,
        decision: Decision,
        reason: &str,
        predicted_load: f64,
        confidence: f64,
        disabled_integrations: Vec<String>,
        enabled_integrations: Vec<String>,
    ) -> ScalingDecision {
        let entry = ScalingDecision {
            timestamp: Utc::now(),
            decision,
            reason: reason.to_string(),
            predicted_load,
            confidence,
            disabled_integrations,
            enabled_integrations,
        };
        let mut log = self.audit_log.lock();
        if log.len() >= AUDIT_LOG_CAPACITY {
            log.pop_front();
        }
        log.push_back(entry.clone());
        entry
    }

    /// Convenience introspection wrapper combining disabled-set and
    /// audit log.
    pub fn status(&self) -> ScalerStatus {
        ScalerStatus {
            disabled: self.disabled.lock().clone(),
            last_smoothed: *self.ema.lock(),
            audit_log: self.audit_log.lock().iter().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResourceConfig;
    use crate::monitoring::MetricsRegistry;

    fn scaler_with(monitor: Arc<ResourceMonitor>) -> Arc<PredictiveScaler> {
        let plugins = PluginManager::new(MetricsRegistry::new());
        PredictiveScaler::new(ScalerConfig::default(), 80.0, 95.0, monitor, plugins)
    }

    fn monitor() -> Arc<ResourceMonitor> {
        ResourceMonitor::new(ResourceConfig::default(), MetricsRegistry::new())
    }

    #[tokio::test]
    async fn no_samples_yields_none_decision() {
        let scaler = scaler_with(monitor());
        let decision = scaler.evaluate_tick().await;
        assert_eq!(decision.decision, Decision::None);
    }

    #[tokio::test]
    async fn below_ten_samples_uses_fallback_forecast() {
        let monitor = monitor();
        for _ in 0..3 {
            monitor.collect_once();
        }
        let scaler = scaler_with(monitor.clone());
        let current = monitor.current().unwrap().memory_pct;
        let predicted = scaler.predict_load(&monitor.history(None), current);
        assert_eq!(predicted, (current + 5.0).min(100.0));
    }

    #[test]
    fn priority_order_never_disables_stubs_by_name_check() {
        assert_eq!(PRIORITY_ORDER.last(), Some(&"stubs"));
    }

    #[tokio::test]
    async fn audit_log_is_bounded() {
        let scaler = scaler_with(monitor());
        for _ in 0..(AUDIT_LOG_CAPACITY + 10) {
            scaler.evaluate_tick().await;
        }
        assert_eq!(scaler.status().audit_log.len(), AUDIT_LOG_CAPACITY);
    }
}
