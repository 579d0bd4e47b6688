//! Configuration data models
//!
//! Defines the per-concern sub-configs that together make up
//! [`super::Config`].

#![allow(missing_docs)]

pub mod autonomy;
pub mod isolation;
pub mod monitoring;
pub mod resource;
pub mod router;

pub use autonomy::*;
pub use isolation::*;
pub use monitoring::*;
pub use resource::*;
pub use router::*;

pub fn default_metrics_port() -> u16 {
    9090
}

pub fn default_metrics_path() -> String {
    "/metrics".to_string()
}

pub fn default_health_path() -> String {
    "/health".to_string()
}

pub fn default_service_name() -> String {
    "conductor".to_string()
}
