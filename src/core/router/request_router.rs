//! Request Router (component E): the authoritative entry point for a
//! single request.

use super::dlq::DeadLetterQueue;
use super::types::{Request, ResponseEnvelope, RouteStatus, RouterStats, RoutingDecision};
use crate::config::RouterConfig;
use crate::core::isolation::IsolatedPluginRunner;
use crate::core::plugin_manager::PluginManager;
use crate::core::refusal::RefusalScreener;
use crate::monitoring::MetricsRegistry;
use crate::utils::generate_request_id;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// A name-keyed table of loader command lines (see
/// [`crate::core::isolation::IsolatedPluginRunner::execute_request`]),
/// supplied by the embedding binary — this crate ships no plugin
/// binaries of its own.
pub type PluginCodeTable = Arc<DashMap<String, String>>;

struct PluginCounters {
    requests: AtomicU64,
    successes: AtomicU64,
    round_robin: AtomicU64,
}

/// Classifies, dispatches, times out, and retries requests, feeding
/// failures into a dead-letter queue.
pub struct RequestRouter {
    config: RouterConfig,
    plugins: Arc<PluginManager>,
    isolation: Arc<IsolatedPluginRunner>,
    refusal: RefusalScreener,
    dlq: Arc<DeadLetterQueue>,
    metrics: MetricsRegistry,
    plugin_code: PluginCodeTable,
    total_requests: AtomicU64,
    successful_routes: AtomicU64,
    failed_routes: AtomicU64,
    per_plugin: DashMap<String, PluginCounters>,
    instances_per_plugin: Mutex<HashMap<String, usize>>,
}

impl RequestRouter {
    pub fn new(
        config: RouterConfig,
        plugins: Arc<PluginManager>,
        isolation: Arc<IsolatedPluginRunner>,
        metrics: MetricsRegistry,
        plugin_code: PluginCodeTable,
    ) -> Arc<Self> {
        let dlq = DeadLetterQueue::new(config.clone(), isolation.clone(), metrics.clone());
        Arc::new(Self {
            config,
            plugins,
            isolation,
            refusal: RefusalScreener::new(),
            dlq,
            metrics,
            plugin_code,
            total_requests: AtomicU64::new(0),
            successful_routes: AtomicU64::new(0),
            failed_routes: AtomicU64::new(0),
            per_plugin: DashMap::new(),
            instances_per_plugin: Mutex::new(HashMap::new()),
        })
    }

    /// Register how many instances of `plugin_name` exist, for
    /// round-robin selection (currently always one per plugin, but the
    /// counter design permits N).
    pub fn set_instance_count(&self, plugin_name: &str, count: usize) {
        self.instances_per_plugin.lock().insert(plugin_name.to_string(), count.max(1));
    }

    pub fn start_dlq_background(self: &Arc<Self>) {
        let table = self.plugin_code.clone();
        self.dlq.start_background(move |name| table.get(name).map(|e| e.value().clone()));
    }

    pub async fn stop(&self) {
        self.dlq.stop_background().await;
    }

    /// Pure function of `request.type` and plugin availability —
    /// unknown types and unavailable plugins both produce an invalid
    /// decision, never a panic.
    fn determine_route(&self, request: &Request) -> RoutingDecision {
        let target_plugin = request.request_type.as_str().to_string();
        let route = self.config.route_for(&target_plugin);

        if request.request_type == super::types::RequestType::Internal {
            return RoutingDecision {
                target_plugin,
                request_type: request.request_type,
                valid: true,
                error: None,
                priority: route.priority,
                timeout_seconds: request.requested_timeout.unwrap_or(route.timeout_seconds),
            };
        }

        if self.plugins.get_plugin(&target_plugin).is_none() {
            return RoutingDecision {
                target_plugin,
                request_type: request.request_type,
                valid: false,
                error: Some("target plugin is not loaded".to_string()),
                priority: route.priority,
                timeout_seconds: route.timeout_seconds,
            };
        }

        RoutingDecision {
            target_plugin,
            request_type: request.request_type,
            valid: true,
            error: None,
            priority: route.priority,
            timeout_seconds: request.requested_timeout.unwrap_or(route.timeout_seconds),
        }
    }

    /// Run the full per-request pipeline: refusal screen → routing
    /// decision → isolation → envelope.
    pub async fn route(&self, mut request: Request) -> ResponseEnvelope {
        let start = std::time::Instant::now();
        let request_id = request.id.clone().unwrap_or_else(generate_request_id);
        request.id = Some(request_id.clone());
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        if request.request_type != super::types::RequestType::Internal {
            if let Some(text) = request.content.as_str() {
                let verdict = self.refusal.should_refuse(text);
                if verdict.should_refuse {
                    // A refusal is a synthetic *success*, not a distinct
                    // error status — the caller always gets exactly one
                    // well-formed envelope, and refusal is not a routing
                    // failure.
                    self.successful_routes.fetch_add(1, Ordering::Relaxed);
                    return ResponseEnvelope {
                        status: RouteStatus::Success,
                        request_id,
                        result: Some(serde_json::json!({
                            "refused": true,
                            "reason": verdict.reason,
                        })),
                        error: None,
                        duration_ms: elapsed_ms(start),
                        plugin: None,
                        queued_for_retry: false,
                        refusal_category: verdict.category.map(|c| c.as_str().to_string()),
                    };
                }
            }
        }

        let decision = self.determine_route(&request);
        if !decision.valid {
            self.failed_routes.fetch_add(1, Ordering::Relaxed);
            return ResponseEnvelope {
                status: RouteStatus::Error,
                request_id,
                result: None,
                error: decision.error,
                duration_ms: elapsed_ms(start),
                plugin: Some(decision.target_plugin),
                queued_for_retry: false,
                refusal_category: None,
            };
        }

        let plugin_name = decision.target_plugin.clone();
        self.record_dispatch(&plugin_name);

        let Some(plugin_code) = self.plugin_code.get(&plugin_name).map(|e| e.value().clone()) else {
            self.failed_routes.fetch_add(1, Ordering::Relaxed);
            self.metrics.incr_counter(
                "plugin_failure_total",
                vec![("platform", plugin_name.clone()), ("error_type", "no_loader".to_string())],
                1,
            );
            self.dlq.enqueue(&plugin_name, request, Some("no loader binary registered".to_string()));
            return ResponseEnvelope {
                status: RouteStatus::Error,
                request_id,
                result: None,
                error: Some("no loader binary registered for plugin".to_string()),
                duration_ms: elapsed_ms(start),
                plugin: Some(plugin_name),
                queued_for_retry: true,
                refusal_category: None,
            };
        };

        let timeout = std::time::Duration::from_secs(decision.timeout_seconds);
        let isolation_result = tokio::time::timeout(
            timeout,
            self.isolation.execute_request(&plugin_name, &request.content, &plugin_code),
        )
        .await;

        let duration_ms = elapsed_ms(start);
        self.metrics.observe_histogram(
            "routing_latency_seconds",
            vec![("plugin", plugin_name.clone())],
            duration_ms as f64 / 1000.0,
        );

        match isolation_result {
            Ok(result) if result.success => {
                self.record_outcome(&plugin_name, true).await;
                self.successful_routes.fetch_add(1, Ordering::Relaxed);
                self.metrics.incr_counter(
                    "routing_requests_total",
                    vec![("plugin", plugin_name.clone()), ("status", "success".to_string())],
                    1,
                );
                ResponseEnvelope {
                    status: RouteStatus::Success,
                    request_id,
                    result: result.output,
                    error: None,
                    duration_ms,
                    plugin: Some(plugin_name),
                    queued_for_retry: false,
                    refusal_category: None,
                }
            }
            Ok(result) => {
                self.record_outcome(&plugin_name, false).await;
                self.failed_routes.fetch_add(1, Ordering::Relaxed);
                self.metrics.incr_counter(
                    "routing_requests_total",
                    vec![("plugin", plugin_name.clone()), ("status", "error".to_string())],
                    1,
                );
                self.metrics.incr_counter(
                    "plugin_failure_total",
                    vec![("platform", plugin_name.clone()), ("error_type", "isolation_error".to_string())],
                    1,
                );
                self.dlq.enqueue(&plugin_name, request, result.error.clone());
                ResponseEnvelope {
                    status: RouteStatus::Error,
                    request_id,
                    result: None,
                    error: result.error,
                    duration_ms,
                    plugin: Some(plugin_name),
                    queued_for_retry: true,
                    refusal_category: None,
                }
            }
            Err(_) => {
                warn!(plugin = plugin_name, request_id, "request timed out");
                self.record_outcome(&plugin_name, false).await;
                self.failed_routes.fetch_add(1, Ordering::Relaxed);
                self.metrics.incr_counter(
                    "routing_requests_total",
                    vec![("plugin", plugin_name.clone()), ("status", "timeout".to_string())],
                    1,
                );
                self.metrics.incr_counter(
                    "plugin_failure_total",
                    vec![("platform", plugin_name.clone()), ("error_type", "timeout".to_string())],
                    1,
                );
                self.dlq.enqueue(&plugin_name, request, Some("timeout".to_string()));
                ResponseEnvelope {
                    status: RouteStatus::Timeout,
                    request_id,
                    result: None,
                    error: Some("timeout".to_string()),
                    duration_ms,
                    plugin: Some(plugin_name),
                    queued_for_retry: true,
                    refusal_category: None,
                }
            }
        }
    }

    /// Round-robin instance selection: currently always resolves to
    /// instance 0 (one instance per plugin) but the counter advances
    /// so a future N-instance plugin pool works unchanged.
    fn record_dispatch(&self, plugin_name: &str) {
        let instances = *self.instances_per_plugin.lock().get(plugin_name).unwrap_or(&1);
        let counters = self.per_plugin.entry(plugin_name.to_string()).or_insert_with(|| PluginCounters {
            requests: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            round_robin: AtomicU64::new(0),
        });
        counters.requests.fetch_add(1, Ordering::Relaxed);
        let _instance_index = counters.round_robin.fetch_add(1, Ordering::Relaxed) % instances.max(1) as u64;
        info!(plugin = plugin_name, "request dispatched");
    }

    async fn record_outcome(&self, plugin_name: &str, success: bool) {
        if let Some(counters) = self.per_plugin.get(plugin_name) {
            if success {
                counters.successes.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.plugins.record_request_outcome(plugin_name, success).await;
    }

    pub fn stats(&self) -> RouterStats {
        let mut per_plugin_requests = HashMap::new();
        let mut per_plugin_success_rate = HashMap::new();
        for entry in self.per_plugin.iter() {
            let requests = entry.value().requests.load(Ordering::Relaxed);
            let successes = entry.value().successes.load(Ordering::Relaxed);
            per_plugin_requests.insert(entry.key().clone(), requests);
            let rate = if requests == 0 { 0.0 } else { successes as f64 / requests as f64 };
            per_plugin_success_rate.insert(entry.key().clone(), rate);
        }
        RouterStats {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_routes: self.successful_routes.load(Ordering::Relaxed),
            failed_routes: self.failed_routes.load(Ordering::Relaxed),
            dlq_entries: self.dlq.size() as u64,
            dlq_retries: self.dlq.retries_count(),
            dlq_failures: self.dlq.failures_count(),
            per_plugin_requests,
            per_plugin_success_rate,
        }
    }
}

fn elapsed_ms(start: std::time::Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
