//! Utility functions for the matchmaking service

use chrono::{DateTime, Utc};

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Convert a unix timestamp in seconds, treating 0 as "never"
pub fn timestamp_from_unix(seconds: i64) -> Option<DateTime<Utc>> {
    if seconds <= 0 {
        return None;
    }
    DateTime::from_timestamp(seconds, 0)
}

/// Round to one decimal place
pub fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Convert minutes of playtime to hours
pub fn minutes_to_hours(minutes: u64) -> f64 {
    minutes as f64 / 60.0
}

/// A handle made only of digits is taken to be a platform id already
pub fn is_numeric_handle(handle: &str) -> bool {
    !handle.is_empty() && handle.chars().all(|c| c.is_ascii_digit())
}
