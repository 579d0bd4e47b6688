//! Resource Monitor and Predictive Scaler configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the Resource Monitor (component A).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Number of samples kept in the sliding window.
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    /// Sampling period in seconds.
    #[serde(default = "default_collection_interval")]
    pub collection_interval_seconds: u64,
    /// Memory percentage at which the scaler starts disabling plugins.
    #[serde(default = "default_ram_threshold")]
    pub ram_threshold: f64,
    /// Memory percentage above which every non-stub plugin is disabled.
    #[serde(default = "default_emergency_threshold")]
    pub emergency_threshold: f64,
    /// Minimum samples required before trend/anomaly detection activates.
    #[serde(default = "default_min_samples_for_anomaly")]
    pub min_samples_for_anomaly: usize,
    /// Standard-deviation multiplier used by anomaly detection.
    #[serde(default = "default_anomaly_sigma")]
    pub anomaly_sigma: f64,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            collection_interval_seconds: default_collection_interval(),
            ram_threshold: default_ram_threshold(),
            emergency_threshold: default_emergency_threshold(),
            min_samples_for_anomaly: default_min_samples_for_anomaly(),
            anomaly_sigma: default_anomaly_sigma(),
        }
    }
}

#[allow(dead_code)]
impl ResourceConfig {
    pub fn merge(mut self, other: Self) -> Self {
        if other.window_size != default_window_size() {
            self.window_size = other.window_size;
        }
        if other.collection_interval_seconds != default_collection_interval() {
            self.collection_interval_seconds = other.collection_interval_seconds;
        }
        if other.ram_threshold != default_ram_threshold() {
            self.ram_threshold = other.ram_threshold;
        }
        if other.emergency_threshold != default_emergency_threshold() {
            self.emergency_threshold = other.emergency_threshold;
        }
        if other.min_samples_for_anomaly != default_min_samples_for_anomaly() {
            self.min_samples_for_anomaly = other.min_samples_for_anomaly;
        }
        if other.anomaly_sigma != default_anomaly_sigma() {
            self.anomaly_sigma = other.anomaly_sigma;
        }
        self
    }

    /// The threshold below which disabled plugins are re-enabled.
    /// Fixed 15-point hysteresis gap below `ram_threshold`, per the
    /// disable/enable/emergency three-tier scheme.
    pub fn enable_threshold(&self) -> f64 {
        self.ram_threshold - 15.0
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.window_size == 0 {
            return Err("resource.window_size must be greater than 0".to_string());
        }
        if !(0.0..=100.0).contains(&self.ram_threshold) {
            return Err("system.ram_threshold must be between 0 and 100".to_string());
        }
        if self.emergency_threshold <= self.ram_threshold {
            return Err("emergency_threshold must be greater than ram_threshold".to_string());
        }
        if self.enable_threshold() >= self.ram_threshold {
            return Err("enable_threshold must stay below ram_threshold".to_string());
        }
        Ok(())
    }
}

/// Configuration for the Predictive Scaler (component B).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalerConfig {
    /// Exponential moving average smoothing factor applied to the
    /// linear-regression forecast.
    #[serde(default = "default_ema_alpha")]
    pub ema_alpha: f64,
    /// Minimum samples required before linear regression is attempted;
    /// below this the scaler falls back to `min(100, current + 5)`.
    #[serde(default = "default_regression_min_samples")]
    pub regression_min_samples: usize,
}

impl Default for ScalerConfig {
    fn default() -> Self {
        Self {
            ema_alpha: default_ema_alpha(),
            regression_min_samples: default_regression_min_samples(),
        }
    }
}

#[allow(dead_code)]
impl ScalerConfig {
    pub fn merge(mut self, other: Self) -> Self {
        if other.ema_alpha != default_ema_alpha() {
            self.ema_alpha = other.ema_alpha;
        }
        if other.regression_min_samples != default_regression_min_samples() {
            self.regression_min_samples = other.regression_min_samples;
        }
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.ema_alpha) {
            return Err("scaler.ema_alpha must be between 0 and 1".to_string());
        }
        Ok(())
    }
}

fn default_window_size() -> usize {
    60
}

fn default_collection_interval() -> u64 {
    30
}

fn default_ram_threshold() -> f64 {
    80.0
}

fn default_emergency_threshold() -> f64 {
    95.0
}

fn default_min_samples_for_anomaly() -> usize {
    10
}

fn default_anomaly_sigma() -> f64 {
    2.0
}

fn default_ema_alpha() -> f64 {
    0.7
}

fn default_regression_min_samples() -> usize {
    10
}
