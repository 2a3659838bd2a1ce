//! Dataset checksum and cache-freshness policy.

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};

/// Calculate SHA-256 checksum of dataset JSON content.
///
/// Used as the identity of a loaded dataset so a persisted snapshot can be
/// matched against the dataset it was written under.
pub fn calculate_checksum(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    hex::encode(result)
}

/// Judge whether a persisted snapshot is fresh enough to skip a refetch.
///
/// A missing last-sync record is never fresh.
pub fn is_cache_fresh(
    last_sync: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    max_age: Duration,
) -> bool {
    match last_sync {
        Some(ts) => now - ts <= max_age,
        None => false,
    }
}
