//! UUID and timestamp helpers shared across the crate.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A UTC timestamp used on every persisted record.
pub type Timestamp = DateTime<Utc>;

/// Returns the current UTC time.
#[must_use]
pub fn now_utc() -> Timestamp {
    Utc::now()
}

/// Generates a random v4 UUID for a new record.
#[must_use]
pub fn generate_uuid() -> Uuid {
    Uuid::new_v4()
}
