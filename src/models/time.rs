//! Wire timestamp handling.
//!
//! The feed reports sample times in two shapes: a pre-normalized numeric
//! field in epoch milliseconds, and a legacy seconds-based text field. Both
//! funnel through [`delta_timestamp`], which falls back to the ingestion time
//! when neither is usable.

use chrono::{DateTime, TimeZone, Utc};

/// Convert an epoch-milliseconds value into a UTC timestamp.
pub fn from_epoch_millis(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

/// Convert an epoch-seconds value into a UTC timestamp.
pub fn from_epoch_seconds(seconds: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(seconds, 0).single()
}

/// Resolve a delta's timestamp from the wire fields.
///
/// Preference order:
/// 1. the pre-normalized numeric field (epoch milliseconds)
/// 2. the seconds-based text field
/// 3. the ingestion time `fallback`
pub fn delta_timestamp(
    pre_normalized_millis: Option<f64>,
    wire_seconds: Option<&str>,
    fallback: DateTime<Utc>,
) -> DateTime<Utc> {
    if let Some(millis) = pre_normalized_millis {
        if millis.is_finite() {
            if let Some(ts) = from_epoch_millis(millis as i64) {
                return ts;
            }
        }
    }

    if let Some(raw) = wire_seconds {
        if let Ok(seconds) = raw.trim().parse::<i64>() {
            if let Some(ts) = from_epoch_seconds(seconds) {
                return ts;
            }
        }
    }

    fallback
}

#[cfg(test)]
#[path = "time_tests.rs"]
mod time_tests;
