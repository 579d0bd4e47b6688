//! # conductor-core
//!
//! Core runtime for an AI companion platform's "Conductor complex": a
//! resource-aware plugin scaler, an isolated plugin runner, a request
//! router with a dead-letter queue, and an autonomy coordinator that
//! fires bounded outbound actions from an externally supplied emotional
//! state.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use conductor_core::{Conductor, Config};
//! use dashmap::DashMap;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_file("config/conductor.yaml").await?;
//!     let conductor = Conductor::new(config, Vec::new(), Arc::new(DashMap::new()), None)?;
//!     conductor.run().await?;
//!     Ok(())
//! }
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod config;
pub mod core;
pub mod monitoring;
pub mod utils;

pub use config::Config;
pub use core::Conductor;
pub use core::autonomy::{AutonomyAction, EmotionalStateProvider};
pub use core::plugin::{Plugin, PluginFactory, PluginHealth, PluginMetadata, PluginState};
pub use core::refusal::{RefusalCategory, RefusalScreener, RefusalVerdict};
pub use core::router::{PluginCodeTable, Request, RequestType, ResponseEnvelope, RouteStatus};
pub use monitoring::MetricsRegistry;
pub use utils::error::{ConductorError, Result};

/// Current version of the crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Name of the crate.
pub const NAME: &str = env!("CARGO_PKG_NAME");
/// Description of the crate.
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Build metadata, stamped in by `build.rs`.
#[derive(Debug, Clone)]
pub struct BuildInfo {
    pub version: &'static str,
    pub build_time: &'static str,
    pub git_hash: &'static str,
    pub rust_version: &'static str,
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self {
            version: VERSION,
            build_time: env!("BUILD_TIME"),
            git_hash: env!("GIT_HASH"),
            rust_version: env!("RUST_VERSION"),
        }
    }
}

pub fn build_info() -> BuildInfo {
    BuildInfo::default()
}
