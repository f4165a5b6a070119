//! Wall-clock time as the mirror stores it.

use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch.
///
/// Ball timestamps and mirrored `last_seen` values use this so several
/// server processes agree on them. A clock set before 1970 reads as 0.
pub fn epoch_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
