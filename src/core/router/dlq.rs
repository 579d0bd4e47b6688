//! Dead-Letter Queue (component F): holds failed requests and retries
//! them with exponential backoff up to a per-entry cap.

use super::types::Request;
use crate::config::RouterConfig;
use crate::core::isolation::IsolatedPluginRunner;
use crate::monitoring::MetricsRegistry;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct DlqEntry {
    pub request_id: String,
    pub plugin_name: String,
    pub request: Request,
    pub retry_count: u32,
    pub max_retries: u32,
    pub last_attempt: Option<DateTime<Utc>>,
    pub next_retry: DateTime<Utc>,
    pub error: Option<String>,
}

/// Single-writer-per-key map (entries are only ever mutated by the
/// holder of the DashMap shard lock for that key), shared between the
/// router's enqueue path and the retry sweep.
pub struct DeadLetterQueue {
    entries: DashMap<String, DlqEntry>,
    config: RouterConfig,
    isolation: Arc<IsolatedPluginRunner>,
    metrics: MetricsRegistry,
    running: AtomicBool,
    stop: Arc<Notify>,
    task: parking_lot::Mutex<Option<JoinHandle<()>>>,
    retries: AtomicU64,
    failures: AtomicU64,
}

impl DeadLetterQueue {
    pub fn new(config: RouterConfig, isolation: Arc<IsolatedPluginRunner>, metrics: MetricsRegistry) -> Arc<Self> {
        Arc::new(Self {
            entries: DashMap::new(),
            config,
            isolation,
            metrics,
            running: AtomicBool::new(false),
            stop: Arc::new(Notify::new()),
            task: parking_lot::Mutex::new(None),
            retries: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        })
    }

    pub fn retries_count(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    pub fn failures_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn enqueue(&self, plugin_name: &str, request: Request, error: Option<String>) {
        let request_id = request.id.clone().unwrap_or_default();
        let entry = DlqEntry {
            request_id: request_id.clone(),
            plugin_name: plugin_name.to_string(),
            request,
            retry_count: 0,
            max_retries: self.config.dlq_max_retries,
            last_attempt: None,
            next_retry: Utc::now(),
            error,
        };
        self.entries.insert(request_id, entry);
        self.metrics.set_gauge("routing_dlq_size", Vec::new(), self.entries.len() as f64);
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn snapshot(&self) -> Vec<DlqEntry> {
        self.entries.iter().map(|e| e.value().clone()).collect()
    }

    /// Spawn the 5 s cooperative retry sweep. Idempotent.
    pub fn start_background(self: &Arc<Self>, plugin_code_for: impl Fn(&str) -> Option<String> + Send + Sync + 'static) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("DLQ retry loop already running");
            return;
        }
        let this = self.clone();
        let stop = self.stop.clone();
        let interval = std::time::Duration::from_secs(this.config.dlq_retry_interval_seconds);
        let plugin_code_for = Arc::new(plugin_code_for);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        this.sweep(plugin_code_for.as_ref()).await;
                    }
                    _ = stop.notified() => {
                        debug!("DLQ retry loop stopping");
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

    async fn sweep(&self, plugin_code_for: &(impl Fn(&str) -> Option<String> + Send + Sync)) {
        let now = Utc::now();
        let due: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.next_retry <= now && e.retry_count < e.max_retries)
            .map(|e| e.key().clone())
            .collect();

        for request_id in due {
            let Some(mut entry) = self.entries.get_mut(&request_id) else {
                continue;
            };
            let Some(plugin_code) = plugin_code_for(&entry.plugin_name) else {
                continue;
            };
            let retry_timeout = std::time::Duration::from_secs(self.config.dlq_retry_timeout_seconds);
            let attempt = tokio::time::timeout(
                retry_timeout,
                self.isolation
                    .execute_request(&entry.plugin_name, &entry.request.content, &plugin_code),
            )
            .await;

            entry.last_attempt = Some(Utc::now());

            let succeeded = matches!(&attempt, Ok(result) if result.success);
            if succeeded {
                drop(entry);
                self.entries.remove(&request_id);
                self.retries.fetch_add(1, Ordering::Relaxed);
                self.metrics.set_gauge("routing_dlq_size", Vec::new(), self.entries.len() as f64);
                info!(request_id, "DLQ retry succeeded");
                continue;
            }

            entry.error = Some(match attempt {
                Ok(result) => result.error.unwrap_or_else(|| "unknown failure".to_string()),
                Err(_) => "retry timed out".to_string(),
            });
            let backoff = 2u64.saturating_pow(entry.retry_count).min(self.config.dlq_max_backoff_seconds);
            entry.next_retry = Utc::now() + chrono::Duration::seconds(backoff as i64);
            entry.retry_count += 1;

            if entry.retry_count >= entry.max_retries {
                warn!(request_id, "DLQ entry exhausted retries, dropping");
                let plugin_name = entry.plugin_name.clone();
                drop(entry);
                self.entries.remove(&request_id);
                self.failures.fetch_add(1, Ordering::Relaxed);
                self.metrics.incr_counter(
                    "plugin_failure_total",
                    vec![("platform", plugin_name), ("error_type", "dlq_exhausted".to_string())],
                    1,
                );
            }
            self.metrics.set_gauge("routing_dlq_size", Vec::new(), self.entries.len() as f64);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IsolationConfig;
    use crate::core::router::types::RequestType;

    fn sample_request() -> Request {
        Request {
            id: Some("req-1".to_string()),
            request_type: RequestType::Discord,
            content: serde_json::json!({"hello": "world"}),
            context: Default::default(),
            priority: None,
            requested_timeout: None,
        }
    }

    fn dlq() -> Arc<DeadLetterQueue> {
        let isolation = IsolatedPluginRunner::new(IsolationConfig::default(), MetricsRegistry::new());
        DeadLetterQueue::new(RouterConfig::default(), isolation, MetricsRegistry::new())
    }

    #[test]
    fn enqueue_updates_gauge_and_size() {
        let queue = dlq();
        queue.enqueue("discord", sample_request(), Some("timeout".to_string()));
        assert_eq!(queue.size(), 1);
    }

    #[tokio::test]
    async fn sweep_drops_entry_with_no_resolvable_plugin_code() {
        let queue = dlq();
        queue.enqueue("discord", sample_request(), Some("timeout".to_string()));
        queue.sweep(&|_name: &str| None).await;
        assert_eq!(queue.size(), 1, "entry stays queued when plugin_code can't be resolved yet");
    }

    #[tokio::test]
    async fn sweep_exhausts_retries_and_drops() {
        let queue = dlq();
        queue.enqueue("ghost", sample_request(), Some("boom".to_string()));
        for _ in 0..(RouterConfig::default().dlq_max_retries + 1) {
            if let Some(mut entry) = queue.entries.get_mut("req-1") {
                entry.next_retry = Utc::now();
            }
            queue.sweep(&|_name: &str| Some("/nonexistent/plugin-loader".to_string())).await;
        }
        assert_eq!(queue.size(), 0);
    }
}
