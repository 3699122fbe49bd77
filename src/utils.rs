//! Utility functions for the party-finder service

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a unique id for one timer registration of a queue
pub fn generate_registration_id() -> Uuid {
    Uuid::new_v4()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}
