//! Shared utilities for storage implementations

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Current wall-clock time in UTC
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current unix timestamp in seconds (the store's `_ts` field)
pub fn unix_timestamp() -> i64 {
    Utc::now().timestamp()
}

/// Compute SHA-256 hash of a serialized document body
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
