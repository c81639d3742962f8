//! Clock helpers for event timestamps and track positions
//!
//! Engine positions and durations are plain milliseconds; user-facing
//! readouts are whole seconds, always rounded down.

use chrono::{DateTime, Utc};

/// Timestamp stamped on every `TapedeckEvent`
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

pub fn millis_to_duration(millis: u64) -> std::time::Duration {
    std::time::Duration::from_millis(millis)
}

/// Whole seconds contained in `millis`, rounded down
pub fn millis_to_secs(millis: u64) -> u64 {
    millis / 1000
}
