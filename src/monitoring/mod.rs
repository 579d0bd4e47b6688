//! Monitoring and observability
//!
//! Houses the host-resource sampling probe and the process-wide Metrics
//! Registry. The domain-level Resource Monitor (component A) lives in
//! `crate::core::resource_monitor` and uses [`sysinfo_probe`] as its
//! sampling source.

pub mod metrics;
pub(crate) mod sysinfo_probe;

pub use metrics::{Labels, MetricsRegistry};
