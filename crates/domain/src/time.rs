//! Time and timestamp helpers.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// UTC timestamp used for `last_seen` and message times.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Whether more than `ttl` has passed between `last_seen` and `now`.
///
/// A timestamp in the future (clock skew) is never expired.
#[must_use]
pub fn is_expired(last_seen: Timestamp, now: Timestamp, ttl: Duration) -> bool {
    match (now - last_seen).to_std() {
        Ok(elapsed) => elapsed > ttl,
        Err(_) => false,
    }
}
