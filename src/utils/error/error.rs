//! Error handling for the Conductor
//!
//! This module defines all error types used throughout the core.

#![allow(missing_docs)]

use thiserror::Error;

/// Result type alias for the Conductor
pub type Result<T> = std::result::Result<T, ConductorError>;

/// Main error type for the Conductor core.
///
/// One variant per error kind in the taxonomy: request-path errors are
/// converted into a response envelope by the router, sweep-local errors
/// (health checks, scaling) are logged and swallowed by their callers.
#[derive(Error, Debug)]
#[allow(dead_code)]
pub enum ConductorError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Request failed schema/shape validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Target plugin not loaded or in Error state
    #[error("Plugin unavailable: {0}")]
    PluginUnavailable(String),

    /// Isolated execution exceeded its wall-clock deadline
    #[error("Isolation timeout after {0}s")]
    IsolationTimeout(u64),

    /// Isolated execution failed to spawn or exited non-zero
    #[error("Isolation failure: {0}")]
    IsolationFailure(String),

    /// A plugin health probe failed
    #[error("Health check failed for '{0}': {1}")]
    HealthCheckFailure(String, String),

    /// Content was screened out before dispatch
    #[error("Refusal required: category={0}")]
    RefusalRequired(String),

    /// Resource Monitor observed a statistical anomaly
    #[error("Resource anomaly on {0}: {1}")]
    ResourceAnomaly(String, f64),

    /// Memory usage crossed the emergency threshold
    #[error("Emergency condition: memory at {0:.1}%")]
    EmergencyCondition(f64),

    /// Circuit breaker is open for the named plugin
    #[error("Circuit breaker open: {0}")]
    CircuitBreaker(String),

    /// Generic timeout, outside the isolation path (e.g. DLQ retry)
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Entity not found (plugin, deployment, trigger)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal invariant violated
    #[error("Internal error: {0}")]
    Internal(String),
}

#[allow(dead_code)]
impl ConductorError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    pub fn plugin_unavailable<S: Into<String>>(message: S) -> Self {
        Self::PluginUnavailable(message.into())
    }

    pub fn isolation_failure<S: Into<String>>(message: S) -> Self {
        Self::IsolationFailure(message.into())
    }

    pub fn health_check_failure<S: Into<String>, T: Into<String>>(plugin: S, message: T) -> Self {
        Self::HealthCheckFailure(plugin.into(), message.into())
    }

    pub fn refusal_required<S: Into<String>>(category: S) -> Self {
        Self::RefusalRequired(category.into())
    }

    pub fn circuit_breaker<S: Into<String>>(message: S) -> Self {
        Self::CircuitBreaker(message.into())
    }

    pub fn timeout<S: Into<String>>(message: S) -> Self {
        Self::Timeout(message.into())
    }

    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::NotFound(message.into())
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Whether this error should ever be retried from the dead-letter queue.
    ///
    /// Validation and refusal are permanent. `PluginUnavailable` is also
    /// excluded: there is no plugin to retry against, so it is returned
    /// synchronously instead of DLQ'd. Everything else that reflects a
    /// transient subprocess/host condition is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ConductorError::IsolationTimeout(_) | ConductorError::IsolationFailure(_) | ConductorError::Timeout(_)
        )
    }
}
