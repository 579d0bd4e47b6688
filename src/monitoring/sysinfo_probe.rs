//! Host resource sampling via the `sysinfo` crate.
//!
//! Each accessor refreshes only the subsystem it needs and returns a
//! fresh reading; nothing here caches across calls beyond the process
//! handles themselves. When the `metrics` feature is disabled, every
//! accessor degrades to a constant so the Resource Monitor can still be
//! built and exercised without the dependency.

#[cfg(feature = "metrics")]
use once_cell::sync::Lazy;
#[cfg(feature = "metrics")]
use sysinfo::{Disks, System};

#[cfg(feature = "metrics")]
static SYSTEM: Lazy<parking_lot::Mutex<System>> =
    Lazy::new(|| parking_lot::Mutex::new(System::new_all()));

#[cfg(feature = "metrics")]
static DISKS: Lazy<parking_lot::Mutex<Disks>> =
    Lazy::new(|| parking_lot::Mutex::new(Disks::new_with_refreshed_list()));

#[cfg(feature = "metrics")]
pub(crate) fn cpu_percent() -> f64 {
    let mut sys = SYSTEM.lock();
    sys.refresh_cpu_usage();
    sys.global_cpu_usage() as f64
}

#[cfg(not(feature = "metrics"))]
pub(crate) fn cpu_percent() -> f64 {
    0.0
}

#[cfg(feature = "metrics")]
pub(crate) fn memory_percent_and_mb() -> (f64, u64) {
    let mut sys = SYSTEM.lock();
    sys.refresh_memory();
    let total = sys.total_memory();
    let used = sys.used_memory();
    let pct = if total > 0 {
        (used as f64 / total as f64) * 100.0
    } else {
        0.0
    };
    (pct, used / (1024 * 1024))
}

#[cfg(not(feature = "metrics"))]
pub(crate) fn memory_percent_and_mb() -> (f64, u64) {
    (0.0, 0)
}

#[cfg(feature = "metrics")]
pub(crate) fn disk_percent_and_free_mb() -> (f64, u64) {
    let mut disks = DISKS.lock();
    disks.refresh(true);
    let (total, available): (u64, u64) = disks
        .iter()
        .fold((0, 0), |(t, a), d| (t + d.total_space(), a + d.available_space()));
    let pct = if total > 0 {
        ((total - available) as f64 / total as f64) * 100.0
    } else {
        0.0
    };
    (pct, available / (1024 * 1024))
}

#[cfg(not(feature = "metrics"))]
pub(crate) fn disk_percent_and_free_mb() -> (f64, u64) {
    (0.0, 0)
}
