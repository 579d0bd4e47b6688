//! Request Router data types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Front-end origin of a request; also doubles as the target plugin
/// name for everything except `internal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    Discord,
    Android,
    Twitch,
    Minecraft,
    Tiktok,
    Youtube,
    Internal,
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestType::Discord => "discord",
            RequestType::Android => "android",
            RequestType::Twitch => "twitch",
            RequestType::Minecraft => "minecraft",
            RequestType::Tiktok => "tiktok",
            RequestType::Youtube => "youtube",
            RequestType::Internal => "internal",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "discord" => Some(RequestType::Discord),
            "android" => Some(RequestType::Android),
            "twitch" => Some(RequestType::Twitch),
            "minecraft" => Some(RequestType::Minecraft),
            "tiktok" => Some(RequestType::Tiktok),
            "youtube" => Some(RequestType::Youtube),
            "internal" => Some(RequestType::Internal),
            _ => None,
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single inbound (or internally generated) request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub request_type: RequestType,
    pub content: serde_json::Value,
    #[serde(default)]
    pub context: HashMap<String, serde_json::Value>,
    pub priority: Option<u8>,
    pub requested_timeout: Option<u64>,
}

/// Ephemeral routing output; lives only inside one router invocation.
#[derive(Debug, Clone, Serialize)]
pub struct RoutingDecision {
    pub target_plugin: String,
    pub request_type: RequestType,
    pub valid: bool,
    pub error: Option<String>,
    pub priority: u8,
    pub timeout_seconds: u64,
}

/// Exactly three wire values: `success | error | timeout`. A refusal is
/// reported as `Success` with a synthetic payload, not a fourth status —
/// `refusal_category` on the envelope is what distinguishes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteStatus {
    Success,
    Timeout,
    Error,
}

/// The envelope returned to whatever called the router.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseEnvelope {
    pub status: RouteStatus,
    pub request_id: String,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub duration_ms: u64,
    pub plugin: Option<String>,
    pub queued_for_retry: bool,
    pub refusal_category: Option<String>,
}

/// Running counters the router exposes for introspection, distinct
/// from the Prometheus export — a convenience separate from metrics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RouterStats {
    pub total_requests: u64,
    pub successful_routes: u64,
    pub failed_routes: u64,
    pub dlq_entries: u64,
    pub dlq_retries: u64,
    pub dlq_failures: u64,
    pub per_plugin_requests: HashMap<String, u64>,
    pub per_plugin_success_rate: HashMap<String, f64>,
}
