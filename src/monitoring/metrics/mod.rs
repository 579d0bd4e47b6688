//! Metrics Registry: typed counters, gauges, and histograms with label
//! sets, shared by every Conductor subsystem.

mod registry;
mod types;

pub use registry::{DurationGuard, MetricsRegistry};
pub use types::Labels;
