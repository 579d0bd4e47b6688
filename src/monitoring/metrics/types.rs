//! Storage types backing the Metrics Registry.

use std::collections::HashMap;
use std::collections::VecDeque;

/// A label set is small and string-keyed; callers are expected to use a
/// bounded, known vocabulary (plugin names, statuses, resource names).
pub type Labels = Vec<(&'static str, String)>;

pub(super) fn labels_key(labels: &Labels) -> String {
    if labels.is_empty() {
        return String::new();
    }
    let mut parts: Vec<String> = labels
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, v))
        .collect();
    parts.sort();
    parts.join(",")
}

#[derive(Debug, Default)]
pub(super) struct MetricsStorage {
    pub(super) counters: HashMap<(&'static str, String), (Labels, u64)>,
    pub(super) gauges: HashMap<(&'static str, String), (Labels, f64)>,
    pub(super) histograms: HashMap<(&'static str, String), HistogramData>,
}

#[derive(Debug, Default, Clone)]
pub(super) struct HistogramData {
    pub(super) labels: Labels,
    pub(super) samples: VecDeque<f64>,
    pub(super) sum: f64,
    pub(super) count: u64,
}

pub(super) const MAX_HISTOGRAM_SAMPLES: usize = 10_000;

pub(super) trait BoundedPush<T> {
    fn push_bounded(&mut self, value: T, max_size: usize);
}

impl<T> BoundedPush<T> for VecDeque<T> {
    #[inline]
    fn push_bounded(&mut self, value: T, max_size: usize) {
        if self.len() >= max_size {
            self.pop_front();
        }
        self.push_back(value);
    }
}
