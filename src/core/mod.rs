//! Core functionality for the Conductor complex.
//!
//! This module owns the Resource Monitor, Predictive Scaler, Plugin
//! Manager, Isolated Plugin Runner, Request Router (with its
//! Dead-Letter Queue), Autonomy Coordinator, Refusal Screener, and the
//! plugin capability set they all share.

pub mod autonomy;
pub mod isolation;
pub mod plugin;
pub mod plugin_manager;
pub mod refusal;
pub mod resource_monitor;
pub mod router;
pub mod scaler;

use crate::config::Config;
use crate::monitoring::MetricsRegistry;
use crate::utils::error::Result;
use autonomy::{AutonomyCoordinator, EmotionalStateProvider};
use isolation::IsolatedPluginRunner;
use plugin::PluginFactory;
use plugin_manager::PluginManager;
use resource_monitor::ResourceMonitor;
use router::{PluginCodeTable, RequestRouter};
use scaler::PredictiveScaler;
use std::sync::Arc;
use tracing::info;

/// Owns one instance each of the Conductor's stateful components and
/// wires them together.
pub struct Conductor {
    config: Arc<Config>,
    metrics: MetricsRegistry,
    resource_monitor: Arc<ResourceMonitor>,
    scaler: Arc<PredictiveScaler>,
    plugins: Arc<PluginManager>,
    isolation: Arc<IsolatedPluginRunner>,
    router: Arc<RequestRouter>,
    autonomy: Option<Arc<AutonomyCoordinator>>,
}

impl Conductor {
    /// Build every subsystem from `config`, registering `plugin_factories`
    /// (name -> factory) and `plugin_code` (name -> loader command line)
    /// supplied by the embedding binary. `state_provider` is optional:
    /// without one, the Autonomy Coordinator is not started (there is
    /// nothing for it to evaluate).
    pub fn new(
        config: Config,
        plugin_factories: Vec<(String, PluginFactory)>,
        plugin_code: PluginCodeTable,
        state_provider: Option<Arc<dyn EmotionalStateProvider>>,
    ) -> Result<Self> {
        let config = Arc::new(config);
        let metrics = MetricsRegistry::new();

        let resource_monitor = ResourceMonitor::new(config.resource.clone(), metrics.clone());

        let plugins = PluginManager::new(metrics.clone());
        for (name, factory) in plugin_factories {
            plugins.register_factory(name, factory);
        }
        plugins.discover_and_register();

        let scaler = PredictiveScaler::new(
            config.scaler.clone(),
            config.resource.ram_threshold,
            config.resource.emergency_threshold,
            resource_monitor.clone(),
            plugins.clone(),
        );

        let isolation = IsolatedPluginRunner::new(config.isolation.clone(), metrics.clone());

        let router = RequestRouter::new(config.router.clone(), plugins.clone(), isolation.clone(), metrics.clone(), plugin_code);

        let autonomy =
            state_provider.map(|provider| AutonomyCoordinator::new(config.autonomy.clone(), provider, router.clone(), plugins.clone()));

        Ok(Self {
            config,
            metrics,
            resource_monitor,
            scaler,
            plugins,
            isolation,
            router,
            autonomy,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    pub fn router(&self) -> &Arc<RequestRouter> {
        &self.router
    }

    pub fn plugins(&self) -> &Arc<PluginManager> {
        &self.plugins
    }

    pub fn resource_monitor(&self) -> &Arc<ResourceMonitor> {
        &self.resource_monitor
    }

    pub fn scaler(&self) -> &Arc<PredictiveScaler> {
        &self.scaler
    }

    /// Start every background loop: resource sampling, the scaler's
    /// periodic tick (piggybacked on the autonomy interval when present,
    /// else driven by its own ticker below), the DLQ sweep, and the
    /// autonomy tick if configured.
    pub async fn run(&self) -> Result<()> {
        info!("starting Conductor background tasks");
        self.resource_monitor.start_background();
        self.router.start_dlq_background();

        let scaler = self.scaler.clone();
        let scaler_interval = std::time::Duration::from_secs(self.config.resource.collection_interval_seconds);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(scaler_interval);
            loop {
                ticker.tick().await;
                scaler.evaluate_tick().await;
            }
        });

        if let Some(autonomy) = &self.autonomy {
            autonomy.start_background();
        }

        Ok(())
    }

    /// Cancel every background loop and kill all active child
    /// processes. Must complete within a 5 s budget; each stop call
    /// below is itself bounded by its loop's own cooperative
    /// cancellation, so the aggregate is expected to return well under
    /// that budget in practice.
    pub async fn shutdown(&self) -> Result<()> {
        info!("shutting down Conductor");
        self.resource_monitor.stop_background().await;
        if let Some(autonomy) = &self.autonomy {
            autonomy.stop_background().await;
        }
        self.router.stop().await;
        self.isolation.shutdown().await;
        info!("Conductor shutdown complete");
        Ok(())
    }

    pub fn health_check(&self) -> ConductorHealth {
        ConductorHealth {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now(),
            active_isolations: self.isolation.active_count(),
            dlq_size: self.router.stats().dlq_entries,
        }
    }
}

/// Top-level health snapshot, distinct from per-plugin [`plugin::PluginHealth`].
#[derive(Debug, Clone, serde::Serialize)]
pub struct ConductorHealth {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub active_isolations: usize,
    pub dlq_size: u64,
}
