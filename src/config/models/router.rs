//! Request Router and Dead-Letter Queue configuration (components E, F).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-request-type routing defaults, keyed by `request.type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteTypeConfig {
    pub priority: u8,
    pub timeout_seconds: u64,
}

/// Configuration for the Request Router (E) and its Dead-Letter Queue (F).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Per-request-type priority/timeout overrides, falling back to
    /// `default_request_timeout` when a type is not listed here.
    #[serde(default = "default_route_types")]
    pub route_types: HashMap<String, RouteTypeConfig>,
    /// Timeout applied to request types absent from `route_types`.
    #[serde(default = "default_request_timeout")]
    pub default_request_timeout_seconds: u64,
    /// Maximum retry attempts before a DLQ entry is dropped.
    #[serde(default = "default_dlq_max_retries")]
    pub dlq_max_retries: u32,
    /// Cooperative DLQ retry-loop period, in seconds.
    #[serde(default = "default_dlq_retry_interval")]
    pub dlq_retry_interval_seconds: u64,
    /// Timeout applied to each DLQ retry attempt.
    #[serde(default = "default_dlq_retry_timeout")]
    pub dlq_retry_timeout_seconds: u64,
    /// Upper bound on the exponential backoff delay between retries.
    #[serde(default = "default_dlq_max_backoff")]
    pub dlq_max_backoff_seconds: u64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            route_types: default_route_types(),
            default_request_timeout_seconds: default_request_timeout(),
            dlq_max_retries: default_dlq_max_retries(),
            dlq_retry_interval_seconds: default_dlq_retry_interval(),
            dlq_retry_timeout_seconds: default_dlq_retry_timeout(),
            dlq_max_backoff_seconds: default_dlq_max_backoff(),
        }
    }
}

#[allow(dead_code)]
impl RouterConfig {
    pub fn merge(mut self, other: Self) -> Self {
        if !other.route_types.is_empty() {
            for (k, v) in other.route_types {
                self.route_types.insert(k, v);
            }
        }
        if other.default_request_timeout_seconds != default_request_timeout() {
            self.default_request_timeout_seconds = other.default_request_timeout_seconds;
        }
        if other.dlq_max_retries != default_dlq_max_retries() {
            self.dlq_max_retries = other.dlq_max_retries;
        }
        if other.dlq_retry_interval_seconds != default_dlq_retry_interval() {
            self.dlq_retry_interval_seconds = other.dlq_retry_interval_seconds;
        }
        if other.dlq_retry_timeout_seconds != default_dlq_retry_timeout() {
            self.dlq_retry_timeout_seconds = other.dlq_retry_timeout_seconds;
        }
        if other.dlq_max_backoff_seconds != default_dlq_max_backoff() {
            self.dlq_max_backoff_seconds = other.dlq_max_backoff_seconds;
        }
        self
    }

    /// Priority/timeout for a given request type, falling back to the
    /// crate-wide default timeout and priority 1 for unlisted types.
    pub fn route_for(&self, request_type: &str) -> RouteTypeConfig {
        self.route_types
            .get(request_type)
            .cloned()
            .unwrap_or(RouteTypeConfig {
                priority: 1,
                timeout_seconds: self.default_request_timeout_seconds,
            })
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.dlq_max_retries == 0 {
            return Err("conductor.dlq_max_retries must be greater than 0".to_string());
        }
        if self.default_request_timeout_seconds == 0 {
            return Err("conductor.default_request_timeout must be greater than 0".to_string());
        }
        Ok(())
    }
}

fn default_route_types() -> HashMap<String, RouteTypeConfig> {
    let mut map = HashMap::new();
    map.insert(
        "internal".to_string(),
        RouteTypeConfig {
            priority: 3,
            timeout_seconds: 10,
        },
    );
    map.insert(
        "discord".to_string(),
        RouteTypeConfig {
            priority: 2,
            timeout_seconds: 3,
        },
    );
    map.insert(
        "android".to_string(),
        RouteTypeConfig {
            priority: 2,
            timeout_seconds: 5,
        },
    );
    for platform in ["twitch", "minecraft", "tiktok", "youtube"] {
        map.insert(
            platform.to_string(),
            RouteTypeConfig {
                priority: 1,
                timeout_seconds: 5,
            },
        );
    }
    map
}

fn default_request_timeout() -> u64 {
    5
}

fn default_dlq_max_retries() -> u32 {
    3
}

fn default_dlq_retry_interval() -> u64 {
    5
}

fn default_dlq_retry_timeout() -> u64 {
    5
}

fn default_dlq_max_backoff() -> u64 {
    30
}
