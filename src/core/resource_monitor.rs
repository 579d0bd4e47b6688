//! Resource Monitor (component A): sliding-window sampling of host
//! CPU/memory/disk with trend and anomaly derivation.

use crate::config::ResourceConfig;
use crate::monitoring::{sysinfo_probe, MetricsRegistry};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// One immutable sample of host resource usage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResourceMetrics {
    pub timestamp: DateTime<Utc>,
    pub cpu_pct: f64,
    pub memory_pct: f64,
    pub disk_pct: f64,
    pub memory_mb: u64,
    pub disk_free_mb: u64,
}

/// Per-resource trend summary, used by the Predictive Scaler's
/// fallback path and exposed for operator introspection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Trend {
    pub current: f64,
    pub average: f64,
    pub min: f64,
    pub max: f64,
    /// `(last - first) / (n - 1)`; zero when fewer than two samples.
    pub slope: f64,
}

/// A single value in the window whose distance from the mean exceeds
/// `threshold_sigma` standard deviations, paired with its window index.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Anomaly {
    pub index: usize,
    pub value: f64,
}

/// Combined current + trends + anomalies in one call, as a convenience
/// over the three separate accessors.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceSummary {
    pub current: Option<ResourceMetrics>,
    pub trends: HashMap<String, Trend>,
    pub anomalies: HashMap<String, Vec<Anomaly>>,
}

/// Bounded FIFO of recent samples plus the cooperative background loop
/// that keeps it filled.
pub struct ResourceMonitor {
    config: ResourceConfig,
    metrics: MetricsRegistry,
    window: Mutex<VecDeque<ResourceMetrics>>,
    running: AtomicBool,
    stop: Arc<Notify>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ResourceMonitor {
    pub fn new(config: ResourceConfig, metrics: MetricsRegistry) -> Arc<Self> {
        Arc::new(Self {
            config,
            metrics,
            window: Mutex::new(VecDeque::with_capacity(64)),
            running: AtomicBool::new(false),
            stop: Arc::new(Notify::new()),
            task: Mutex::new(None),
        })
    }

    /// Take one synchronous sample, append it to the window, and
    /// publish the per-resource gauges. Never propagates a sampling
    /// failure to the caller — a transient failure is logged and the
    /// sample is simply omitted (the next tick will cover it).
    pub fn collect_once(&self) -> ResourceMetrics {
        let cpu_pct = sysinfo_probe::cpu_percent();
        let (memory_pct, memory_mb) = sysinfo_probe::memory_percent_and_mb();
        let (disk_pct, disk_free_mb) = sysinfo_probe::disk_percent_and_free_mb();

        if !(0.0..=100.0).contains(&cpu_pct)
            || !(0.0..=100.0).contains(&memory_pct)
            || !(0.0..=100.0).contains(&disk_pct)
        {
            warn!(cpu_pct, memory_pct, disk_pct, "resource sample out of range, clamping");
        }
        let sample = ResourceMetrics {
            timestamp: Utc::now(),
            cpu_pct: cpu_pct.clamp(0.0, 100.0),
            memory_pct: memory_pct.clamp(0.0, 100.0),
            disk_pct: disk_pct.clamp(0.0, 100.0),
            memory_mb,
            disk_free_mb,
        };

        self.metrics.set_gauge(
            "system_resources_percent",
            vec![("resource", "cpu".to_string())],
            sample.cpu_pct,
        );
        self.metrics.set_gauge(
            "system_resources_percent",
            vec![("resource", "memory".to_string())],
            sample.memory_pct,
        );
        self.metrics.set_gauge(
            "system_resources_percent",
            vec![("resource", "disk".to_string())],
            sample.disk_pct,
        );

        let mut window = self.window.lock();
        if window.len() >= self.config.window_size {
            window.pop_front();
        }
        window.push_back(sample);
        debug!(?sample, window_len = window.len(), "resource sample collected");
        sample
    }

    /// Spawn the cooperative sampling loop. Idempotent: a second call
    /// while already running only logs a warning.
    pub fn start_background(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("resource monitor background loop already running");
            return;
        }
        let this = self.clone();
        let stop = self.stop.clone();
        let interval = std::time::Duration::from_secs(self.config.collection_interval_seconds);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        this.collect_once();
                    }
                    _ = stop.notified() => {
                        debug!("resource monitor background loop stopping");
                        break;
                    }
                }
            }
        });
        *self.task.lock() = Some(handle);
    }

    /// Stop the background loop. Never blocks on an in-flight sample;
    /// at most waits for the current iteration to observe the signal.
    pub async fn stop_background(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.stop.notify_one();
        if let Some(handle) = self.task.lock().take() {
            let _ = handle.await;
        }
    }

    /// Chronological snapshot of the window, optionally truncated to
    /// the most recent `limit` samples.
    pub fn history(&self, limit: Option<usize>) -> Vec<ResourceMetrics> {
        let window = self.window.lock();
        match limit {
            Some(n) if n < window.len() => window.iter().skip(window.len() - n).copied().collect(),
            _ => window.iter().copied().collect(),
        }
    }

    pub fn current(&self) -> Option<ResourceMetrics> {
        self.window.lock().back().copied()
    }

    pub fn window_len(&self) -> usize {
        self.window.lock().len()
    }

    /// Per-resource current/average/min/max/slope over the whole
    /// window. Empty window yields an empty map rather than a panic.
    pub fn trends(&self) -> HashMap<String, Trend> {
        let window = self.window.lock();
        let mut out = HashMap::new();
        if window.is_empty() {
            return out;
        }
        for (name, extract) in resource_extractors() {
            let values: Vec<f64> = window.iter().map(&extract).collect();
            out.insert(name.to_string(), trend_of(&values));
        }
        out
    }

    /// Per-resource indices whose value exceeds `mean + k*sigma`.
    /// Requires at least `min_samples_for_anomaly` samples; otherwise
    /// every resource maps to an empty vector.
    pub fn anomalies(&self, threshold_sigma: f64) -> HashMap<String, Vec<Anomaly>> {
        let window = self.window.lock();
        let mut out = HashMap::new();
        if window.len() < self.config.min_samples_for_anomaly {
            for (name, _) in resource_extractors() {
                out.insert(name.to_string(), Vec::new());
            }
            return out;
        }
        for (name, extract) in resource_extractors() {
            let values: Vec<f64> = window.iter().map(&extract).collect();
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
            let sigma = variance.sqrt();
            let flagged: Vec<Anomaly> = values
                .iter()
                .enumerate()
                .filter(|(_, &v)| v > mean + threshold_sigma * sigma)
                .map(|(index, &value)| Anomaly { index, value })
                .collect();
            out.insert(name.to_string(), flagged);
        }
        out
    }

    pub fn summary(&self) -> ResourceSummary {
        ResourceSummary {
            current: self.current(),
            trends: self.trends(),
            anomalies: self.anomalies(self.config.anomaly_sigma),
        }
    }
}

type Extractor = fn(&ResourceMetrics) -> f64;

fn resource_extractors() -> [(&'static str, Extractor); 3] {
    [
        ("cpu", |m: &ResourceMetrics| m.cpu_pct),
        ("memory", |m: &ResourceMetrics| m.memory_pct),
        ("disk", |m: &ResourceMetrics| m.disk_pct),
    ]
}

fn trend_of(values: &[f64]) -> Trend {
    let n = values.len();
    let current = *values.last().unwrap();
    let average = values.iter().sum::<f64>() / n as f64;
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let slope = if n > 1 {
        (values[n - 1] - values[0]) / (n - 1) as f64
    } else {
        0.0
    };
    Trend { current, average, min, max, slope }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor_with_window(window_size: usize) -> Arc<ResourceMonitor> {
        let mut config = ResourceConfig::default();
        config.window_size = window_size;
        ResourceMonitor::new(config, MetricsRegistry::new())
    }

    fn push(monitor: &ResourceMonitor, memory_pct: f64) {
        let sample = ResourceMetrics {
            timestamp: Utc::now(),
            cpu_pct: 10.0,
            memory_pct,
            disk_pct: 5.0,
            memory_mb: 1024,
            disk_free_mb: 2048,
        };
        monitor.window.lock().push_back(sample);
        let mut window = monitor.window.lock();
        while window.len() > monitor.config.window_size {
            window.pop_front();
        }
    }

    #[test]
    fn window_capacity_is_bounded_and_evicts_oldest() {
        let monitor = monitor_with_window(3);
        for i in 0..5 {
            push(&monitor, i as f64);
        }
        let history = monitor.history(None);
        assert_eq!(history.len(), 3);
        assert_eq!(history.first().unwrap().memory_pct, 2.0);
        assert_eq!(history.last().unwrap().memory_pct, 4.0);
    }

    #[test]
    fn trends_are_empty_on_empty_window() {
        let monitor = monitor_with_window(10);
        assert!(monitor.trends().is_empty());
    }

    #[test]
    fn trends_compute_slope_and_bounds() {
        let monitor = monitor_with_window(10);
        for v in [10.0, 20.0, 30.0, 40.0, 50.0] {
            push(&monitor, v);
        }
        let trends = monitor.trends();
        let memory = trends.get("memory").unwrap();
        assert_eq!(memory.current, 50.0);
        assert_eq!(memory.min, 10.0);
        assert_eq!(memory.max, 50.0);
        assert_eq!(memory.slope, 10.0);
    }

    #[test]
    fn anomalies_require_minimum_samples() {
        let monitor = monitor_with_window(20);
        for _ in 0..5 {
            push(&monitor, 50.0);
        }
        let anomalies = monitor.anomalies(2.0);
        assert!(anomalies.get("memory").unwrap().is_empty());
    }

    #[test]
    fn anomalies_flag_outliers_past_sigma() {
        let monitor = monitor_with_window(20);
        for _ in 0..14 {
            push(&monitor, 50.0);
        }
        push(&monitor, 500.0);
        let anomalies = monitor.anomalies(2.0);
        let memory_anomalies = anomalies.get("memory").unwrap();
        assert!(!memory_anomalies.is_empty());
        assert_eq!(memory_anomalies.last().unwrap().value, 500.0);
    }

    #[tokio::test]
    async fn collect_once_appends_and_updates_gauge() {
        let registry = MetricsRegistry::new();
        let monitor = ResourceMonitor::new(ResourceConfig::default(), registry.clone());
        let sample = monitor.collect_once();
        assert_eq!(monitor.window_len(), 1);
        assert!(sample.cpu_pct >= 0.0);
        assert!(registry
            .gauge_value("system_resources_percent", &vec![("resource", "cpu".to_string())])
            .is_some());
    }

    #[tokio::test]
    async fn start_background_is_idempotent() {
        let monitor = ResourceMonitor::new(ResourceConfig::default(), MetricsRegistry::new());
        monitor.start_background();
        monitor.start_background();
        monitor.stop_background().await;
    }
}
