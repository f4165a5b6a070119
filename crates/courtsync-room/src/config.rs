//! Room configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Settings shared by every room in a registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Players allowed in a room at once.
    pub capacity: usize,

    /// How often a room's coalescer checks the dirty flag and flushes a
    /// `state` snapshot.
    pub coalesce_interval: Duration,

    /// How often the reaper sweeps for idle players.
    pub reap_interval: Duration,

    /// A player with no heartbeat for longer than this is evicted.
    pub stale_timeout: Duration,

    /// Ball velocity decay constant `k` in `exp(-k * dt)`, per second.
    pub damping: f64,

    /// Upper bound on closing a connection during leave or shutdown.
    pub close_timeout: Duration,

    /// Spawn distance from the top or bottom edge, as a fraction of the
    /// world height.
    pub spawn_margin: f64,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            capacity: 2,
            coalesce_interval: Duration::from_millis(50),
            reap_interval: Duration::from_secs(10),
            stale_timeout: Duration::from_secs(60),
            damping: crate::physics::DEFAULT_DAMPING,
            close_timeout: Duration::from_secs(2),
            spawn_margin: 0.2,
        }
    }
}
