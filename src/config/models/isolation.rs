//! Isolated Plugin Runner configuration (component D).

use serde::{Deserialize, Serialize};

/// Resource limits applied to every isolated plugin child process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationConfig {
    /// Address-space cap (`RLIMIT_AS`) per child, in megabytes.
    #[serde(default = "default_memory_limit_mb")]
    pub memory_limit_mb: u64,
    /// Wall-clock timeout before the child is killed. The CPU-time cap
    /// (`RLIMIT_CPU`) is derived from this as `ceil(1.5 * timeout_seconds)`,
    /// not independently configurable.
    #[serde(default = "default_isolation_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for IsolationConfig {
    fn default() -> Self {
        Self {
            memory_limit_mb: default_memory_limit_mb(),
            timeout_seconds: default_isolation_timeout_seconds(),
        }
    }
}

#[allow(dead_code)]
impl IsolationConfig {
    pub fn merge(mut self, other: Self) -> Self {
        if other.memory_limit_mb != default_memory_limit_mb() {
            self.memory_limit_mb = other.memory_limit_mb;
        }
        if other.timeout_seconds != default_isolation_timeout_seconds() {
            self.timeout_seconds = other.timeout_seconds;
        }
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.memory_limit_mb == 0 {
            return Err("conductor.isolation_memory_limit_mb must be greater than 0".to_string());
        }
        if self.timeout_seconds == 0 {
            return Err("conductor.isolation_timeout_seconds must be greater than 0".to_string());
        }
        Ok(())
    }
}

fn default_memory_limit_mb() -> u64 {
    512
}

fn default_isolation_timeout_seconds() -> u64 {
    30
}
