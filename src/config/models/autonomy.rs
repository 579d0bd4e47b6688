//! Autonomy Coordinator configuration (component G).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-trigger threshold, cooldown and priority, overridable by
/// `autonomy.trigger_thresholds.*`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    pub threshold: f64,
    pub cooldown_minutes: u64,
    pub priority: u8,
}

/// Configuration for the Autonomy Coordinator (G).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutonomyConfig {
    /// Tick period for trigger evaluation, in seconds.
    #[serde(default = "default_check_interval")]
    pub check_interval_seconds: u64,
    /// Per-trigger overrides, keyed by trigger name. Unlisted triggers
    /// use the built-in defaults in [`default_triggers`].
    #[serde(default = "default_triggers")]
    pub trigger_thresholds: HashMap<String, TriggerConfig>,
    /// Maximum fired actions across all triggers within a rolling hour.
    #[serde(default = "default_max_autonomous_per_hour")]
    pub max_autonomous_per_hour: u32,
    /// Default outbound platform for autonomy-originated actions.
    #[serde(default = "default_platform")]
    pub default_platform: String,
    /// Cap on generated message content length.
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,
    /// Size of the bounded firing-history log.
    #[serde(default = "default_firing_history_size")]
    pub firing_history_size: usize,
}

impl Default for AutonomyConfig {
    fn default() -> Self {
        Self {
            check_interval_seconds: default_check_interval(),
            trigger_thresholds: default_triggers(),
            max_autonomous_per_hour: default_max_autonomous_per_hour(),
            default_platform: default_platform(),
            max_message_length: default_max_message_length(),
            firing_history_size: default_firing_history_size(),
        }
    }
}

#[allow(dead_code)]
impl AutonomyConfig {
    pub fn merge(mut self, other: Self) -> Self {
        if other.check_interval_seconds != default_check_interval() {
            self.check_interval_seconds = other.check_interval_seconds;
        }
        if !other.trigger_thresholds.is_empty() {
            for (k, v) in other.trigger_thresholds {
                self.trigger_thresholds.insert(k, v);
            }
        }
        if other.max_autonomous_per_hour != default_max_autonomous_per_hour() {
            self.max_autonomous_per_hour = other.max_autonomous_per_hour;
        }
        if other.default_platform != default_platform() {
            self.default_platform = other.default_platform;
        }
        if other.max_message_length != default_max_message_length() {
            self.max_message_length = other.max_message_length;
        }
        if other.firing_history_size != default_firing_history_size() {
            self.firing_history_size = other.firing_history_size;
        }
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.check_interval_seconds == 0 {
            return Err("autonomy.check_interval must be greater than 0".to_string());
        }
        if self.max_autonomous_per_hour == 0 {
            return Err("autonomy.max_autonomous_per_hour must be greater than 0".to_string());
        }
        for (name, trigger) in &self.trigger_thresholds {
            if !(0.0..=1.0).contains(&trigger.threshold) {
                return Err(format!("autonomy trigger '{name}' threshold must be in [0,1]"));
            }
        }
        Ok(())
    }
}

/// The built-in trigger table. `spontaneous_lonely` and
/// `spontaneous_excited` are additionally gated by appropriate-hours and
/// user-idle-window constraints at evaluation time; the remaining
/// triggers fire whenever threshold and cooldown allow.
pub fn default_triggers() -> HashMap<String, TriggerConfig> {
    let mut map = HashMap::new();
    map.insert(
        "loneliness".to_string(),
        TriggerConfig {
            threshold: 0.7,
            cooldown_minutes: 60,
            priority: 3,
        },
    );
    map.insert(
        "excitement".to_string(),
        TriggerConfig {
            threshold: 0.8,
            cooldown_minutes: 60,
            priority: 2,
        },
    );
    map.insert(
        "frustration".to_string(),
        TriggerConfig {
            threshold: 0.6,
            cooldown_minutes: 30,
            priority: 4,
        },
    );
    map.insert(
        "jealousy".to_string(),
        TriggerConfig {
            threshold: 0.7,
            cooldown_minutes: 60,
            priority: 3,
        },
    );
    map.insert(
        "vulnerability".to_string(),
        TriggerConfig {
            threshold: 0.5,
            cooldown_minutes: 120,
            priority: 1,
        },
    );
    map.insert(
        "spontaneous_lonely".to_string(),
        TriggerConfig {
            threshold: 0.8,
            cooldown_minutes: 180,
            priority: 2,
        },
    );
    map.insert(
        "spontaneous_excited".to_string(),
        TriggerConfig {
            threshold: 0.9,
            cooldown_minutes: 120,
            priority: 2,
        },
    );
    map
}

fn default_check_interval() -> u64 {
    900
}

fn default_max_autonomous_per_hour() -> u32 {
    5
}

fn default_platform() -> String {
    "discord".to_string()
}

fn default_max_message_length() -> usize {
    2000
}

fn default_firing_history_size() -> usize {
    100
}
