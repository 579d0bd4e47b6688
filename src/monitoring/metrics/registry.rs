//! Typed metrics registry: counters, gauges, and histograms with label sets.
//!
//! Modeled on this codebase's consolidated-lock metrics collector: all
//! mutation goes through one `parking_lot::RwLock`-guarded storage
//! struct rather than one lock per metric family, trading a little
//! contention for a much simpler implementation and a single snapshot
//! point for export.

use super::types::{BoundedPush, HistogramData, Labels, MetricsStorage, labels_key, MAX_HISTOGRAM_SAMPLES};
use parking_lot::RwLock;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Instant;

/// Default bucket boundaries (seconds) for histograms that don't specify
/// their own, matching the health-check histogram buckets.
const DEFAULT_BUCKETS: &[f64] = &[0.1, 0.5, 1.0, 2.0, 5.0];

/// Process-wide metrics registry shared by every Conductor subsystem.
#[derive(Debug, Clone)]
pub struct MetricsRegistry {
    storage: Arc<RwLock<MetricsStorage>>,
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            storage: Arc::new(RwLock::new(MetricsStorage::default())),
        }
    }

    /// Increment a counter by `delta` (0 is a valid no-op registration).
    pub fn incr_counter(&self, name: &'static str, labels: Labels, delta: u64) {
        let key = (name, labels_key(&labels));
        let mut storage = self.storage.write();
        let entry = storage
            .counters
            .entry(key)
            .or_insert_with(|| (labels.clone(), 0));
        entry.1 += delta;
    }

    /// Set a gauge to an absolute value.
    pub fn set_gauge(&self, name: &'static str, labels: Labels, value: f64) {
        let key = (name, labels_key(&labels));
        let mut storage = self.storage.write();
        storage.gauges.insert(key, (labels, value));
    }

    /// Record one histogram observation (seconds, milliseconds, whatever
    /// unit the metric name documents).
    pub fn observe_histogram(&self, name: &'static str, labels: Labels, value: f64) {
        let key = (name, labels_key(&labels));
        let mut storage = self.storage.write();
        let entry = storage.histograms.entry(key).or_insert_with(|| HistogramData {
            labels: labels.clone(),
            ..Default::default()
        });
        entry.samples.push_bounded(value, MAX_HISTOGRAM_SAMPLES);
        entry.sum += value;
        entry.count += 1;
    }

    /// Scope guard that records elapsed wall-clock seconds into a
    /// histogram when dropped.
    pub fn measure_duration(&self, name: &'static str, labels: Labels) -> DurationGuard<'_> {
        DurationGuard {
            registry: self,
            name,
            labels,
            start: Instant::now(),
        }
    }

    pub fn gauge_value(&self, name: &'static str, labels: &Labels) -> Option<f64> {
        let key = (name, labels_key(labels));
        self.storage.read().gauges.get(&key).map(|(_, v)| *v)
    }

    pub fn counter_value(&self, name: &'static str, labels: &Labels) -> Option<u64> {
        let key = (name, labels_key(labels));
        self.storage.read().counters.get(&key).map(|(_, v)| *v)
    }

    /// Render every registered metric in Prometheus text exposition
    /// format. One `# HELP`/`# TYPE` pair per metric *name* (not per
    /// label combination), followed by one sample line per series.
    pub fn export_prometheus(&self) -> String {
        let storage = self.storage.read();
        let estimated_size =
            256 + storage.counters.len() * 96 + storage.gauges.len() * 96 + storage.histograms.len() * 256;
        let mut out = String::with_capacity(estimated_size);

        let mut counter_names: Vec<&'static str> =
            storage.counters.keys().map(|(n, _)| *n).collect();
        counter_names.sort_unstable();
        counter_names.dedup();
        for name in counter_names {
            let _ = writeln!(out, "# HELP {} {}", name, help_text(name));
            let _ = writeln!(out, "# TYPE {} counter", name);
            for ((n, _), (labels, value)) in storage.counters.iter() {
                if *n != name {
                    continue;
                }
                write_series(&mut out, name, labels, &value.to_string());
            }
        }

        let mut gauge_names: Vec<&'static str> = storage.gauges.keys().map(|(n, _)| *n).collect();
        gauge_names.sort_unstable();
        gauge_names.dedup();
        for name in gauge_names {
            let _ = writeln!(out, "# HELP {} {}", name, help_text(name));
            let _ = writeln!(out, "# TYPE {} gauge", name);
            for ((n, _), (labels, value)) in storage.gauges.iter() {
                if *n != name {
                    continue;
                }
                write_series(&mut out, name, labels, &format!("{:.6}", value));
            }
        }

        let mut hist_names: Vec<&'static str> = storage.histograms.keys().map(|(n, _)| *n).collect();
        hist_names.sort_unstable();
        hist_names.dedup();
        for name in hist_names {
            let _ = writeln!(out, "# HELP {} {}", name, help_text(name));
            let _ = writeln!(out, "# TYPE {} histogram", name);
            for ((n, _), data) in storage.histograms.iter() {
                if *n != name {
                    continue;
                }
                for &bound in DEFAULT_BUCKETS {
                    let count = data.samples.iter().filter(|&&v| v <= bound).count();
                    let mut labels = data.labels.clone();
                    labels.push(("le", format!("{}", bound)));
                    write_series(&mut out, &format!("{}_bucket", name), &labels, &count.to_string());
                }
                let mut inf_labels = data.labels.clone();
                inf_labels.push(("le", "+Inf".to_string()));
                write_series(
                    &mut out,
                    &format!("{}_bucket", name),
                    &inf_labels,
                    &data.count.to_string(),
                );
                write_series(&mut out, &format!("{}_sum", name), &data.labels, &format!("{:.6}", data.sum));
                write_series(&mut out, &format!("{}_count", name), &data.labels, &data.count.to_string());
            }
        }

        out
    }

    #[cfg(test)]
    pub(crate) fn reset(&self) {
        let mut storage = self.storage.write();
        storage.counters.clear();
        storage.gauges.clear();
        storage.histograms.clear();
    }
}

fn help_text(name: &str) -> &'static str {
    match name {
        "routing_requests_total" => "Total requests handled by the router, by plugin and outcome",
        "routing_dlq_size" => "Current number of entries held in the dead-letter queue",
        "routing_latency_seconds" => "Request routing latency in seconds",
        "isolation_execution_duration_ms" => "Isolated plugin execution duration in milliseconds",
        "plugin_failure_total" => "Total plugin failures by platform and error type",
        "circuit_breaker_state" => "Circuit breaker state: 0=closed 1=open 2=half-open",
        "health_check_total" => "Total plugin health checks by platform and status",
        "health_check_duration_seconds" => "Plugin health check duration in seconds",
        "system_resources_percent" => "Host resource utilization percentage by resource",
        _ => "Conductor metric",
    }
}

fn write_series(out: &mut String, name: &str, labels: &Labels, value: &str) {
    if labels.is_empty() {
        let _ = writeln!(out, "{} {}", name, value);
        return;
    }
    let mut parts: Vec<String> = labels
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, v))
        .collect();
    parts.sort();
    let _ = writeln!(out, "{}{{{}}} {}", name, parts.join(","), value);
}

/// RAII guard returned by [`MetricsRegistry::measure_duration`].
pub struct DurationGuard<'a> {
    registry: &'a MetricsRegistry,
    name: &'static str,
    labels: Labels,
    start: Instant,
}

impl Drop for DurationGuard<'_> {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed().as_secs_f64();
        self.registry
            .observe_histogram(self.name, std::mem::take(&mut self.labels), elapsed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_accumulates_per_label_set() {
        let registry = MetricsRegistry::new();
        registry.incr_counter("routing_requests_total", vec![("plugin", "discord".into()), ("status", "success".into())], 1);
        registry.incr_counter("routing_requests_total", vec![("plugin", "discord".into()), ("status", "success".into())], 2);
        registry.incr_counter("routing_requests_total", vec![("plugin", "android".into()), ("status", "error".into())], 1);

        assert_eq!(
            registry.counter_value(
                "routing_requests_total",
                &vec![("plugin", "discord".into()), ("status", "success".into())]
            ),
            Some(3)
        );
        assert_eq!(
            registry.counter_value(
                "routing_requests_total",
                &vec![("plugin", "android".into()), ("status", "error".into())]
            ),
            Some(1)
        );
    }

    #[test]
    fn gauge_set_is_absolute() {
        let registry = MetricsRegistry::new();
        registry.set_gauge("system_resources_percent", vec![("resource", "cpu".into())], 42.0);
        registry.set_gauge("system_resources_percent", vec![("resource", "cpu".into())], 55.0);
        assert_eq!(
            registry.gauge_value("system_resources_percent", &vec![("resource", "cpu".into())]),
            Some(55.0)
        );
    }

    #[test]
    fn histogram_tracks_count_and_sum() {
        let registry = MetricsRegistry::new();
        registry.observe_histogram("health_check_duration_seconds", vec![("platform", "discord".into())], 0.2);
        registry.observe_histogram("health_check_duration_seconds", vec![("platform", "discord".into())], 0.4);

        let out = registry.export_prometheus();
        assert!(out.contains("health_check_duration_seconds_count"));
        assert!(out.contains("health_check_duration_seconds_sum"));
    }

    #[test]
    fn export_includes_help_and_type_lines() {
        let registry = MetricsRegistry::new();
        registry.incr_counter("plugin_failure_total", vec![("platform", "voice".into()), ("error_type", "timeout".into())], 1);
        let out = registry.export_prometheus();
        assert!(out.contains("# TYPE plugin_failure_total counter"));
        assert!(out.contains("plugin_failure_total{"));
    }

    #[test]
    fn duration_guard_records_on_drop() {
        let registry = MetricsRegistry::new();
        {
            let _guard = registry.measure_duration("routing_latency_seconds", vec![("plugin", "discord".into())]);
        }
        let out = registry.export_prometheus();
        assert!(out.contains("routing_latency_seconds_count"));
    }
}
