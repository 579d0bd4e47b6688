//! Small cross-cutting helpers shared by every core subsystem.
//!
//! Error handling lives in [`error`]; everything else the core needs
//! (request ids, timestamps) is small enough to keep at the top level.

pub mod error;

use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Generate an opaque request identifier.
pub fn generate_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// Current Unix timestamp, in seconds.
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Current Unix timestamp, in milliseconds.
pub fn current_timestamp_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_ids_are_unique() {
        assert_ne!(generate_request_id(), generate_request_id());
    }

    #[test]
    fn millis_timestamp_is_monotonic_enough() {
        let a = current_timestamp_millis();
        let b = current_timestamp_millis();
        assert!(b >= a);
    }
}
