//! Fixed-interval ticker for courtsync.
//!
//! Both background loops of the server run on a fixed cadence: the
//! per-room broadcast coalescer (every 50 ms by default) and the global
//! inactivity reaper (every 10 s). [`Ticker`] is the shared clock they
//! wait on.
//!
//! # Integration
//!
//! The ticker is meant to sit inside a `tokio::select!` next to a
//! cancellation signal, so a loop can be stopped at the wait boundary:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         _ = stop.changed() => break,
//!         _ = ticker.wait() => flush_if_dirty().await,
//!     }
//! }
//! ```
//!
//! All timing goes through `tokio::time`, so tests can drive it with
//! `#[tokio::test(start_paused = true)]`.

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do when a tick fires late.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TickPolicy {
    /// Skip the missed tick(s) and re-anchor the cadence on now.
    #[default]
    Skip,
    /// Keep the original cadence. The next tick is due one interval after
    /// the missed deadline, which may already have passed.
    Drop,
}

/// Configuration for a [`Ticker`].
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Time between ticks.
    pub interval: Duration,
    /// Overrun handling policy.
    pub policy: TickPolicy,
}

impl TickConfig {
    /// Shortest interval accepted. Anything below is raised to this.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

    /// A config ticking every `interval` with the default policy.
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            policy: TickPolicy::default(),
        }
    }

    /// Fixes out-of-range values so the config is safe to use.
    pub fn validated(mut self) -> Self {
        if self.interval < Self::MIN_INTERVAL {
            warn!(
                interval_ms = self.interval.as_secs_f64() * 1000.0,
                "tick interval below minimum, raising"
            );
            self.interval = Self::MIN_INTERVAL;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Tick info
// ---------------------------------------------------------------------------

/// Information about a fired tick, returned by [`Ticker::wait`].
#[derive(Debug, Clone)]
pub struct TickInfo {
    /// Monotonically increasing tick number (starts at 1).
    pub tick: u64,
    /// `true` if this tick fired more than 10% of an interval late.
    pub overrun: bool,
    /// Whole intervals missed because of the overrun (0 normally).
    pub ticks_skipped: u64,
}

// ---------------------------------------------------------------------------
// Ticker
// ---------------------------------------------------------------------------

/// Fixed-interval ticker. The first tick fires one interval after creation.
#[derive(Debug)]
pub struct Ticker {
    config: TickConfig,
    tick_count: u64,
    next_tick: Instant,
}

impl Ticker {
    /// Creates a ticker from config.
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        debug!(
            interval_ms = config.interval.as_secs_f64() * 1000.0,
            policy = ?config.policy,
            "ticker created"
        );
        Self {
            next_tick: Instant::now() + config.interval,
            tick_count: 0,
            config,
        }
    }

    /// Creates a ticker for `interval` with the default policy.
    pub fn every(interval: Duration) -> Self {
        Self::new(TickConfig::every(interval))
    }

    /// Waits until the next tick is due.
    ///
    /// Cancel-safe: dropping the future before it resolves leaves the
    /// schedule untouched.
    pub async fn wait(&mut self) -> TickInfo {
        let next = self.next_tick;
        let interval = self.config.interval;

        time::sleep_until(next).await;

        let now = Instant::now();
        self.tick_count += 1;

        let late_by = now.saturating_duration_since(next);
        let overrun = late_by > interval / 10;
        let mut ticks_skipped = 0u64;

        self.next_tick = match self.config.policy {
            TickPolicy::Skip => {
                if overrun {
                    ticks_skipped = (late_by.as_nanos() / interval.as_nanos()) as u64;
                    if ticks_skipped > 0 {
                        warn!(
                            tick = self.tick_count,
                            skipped = ticks_skipped,
                            late_ms = late_by.as_secs_f64() * 1000.0,
                            "tick overrun, skipping ahead"
                        );
                    }
                }
                now + interval
            }
            TickPolicy::Drop => {
                if overrun {
                    warn!(
                        tick = self.tick_count,
                        late_ms = late_by.as_secs_f64() * 1000.0,
                        "tick overrun, keeping original schedule"
                    );
                }
                next + interval
            }
        };

        trace!(tick = self.tick_count, overrun, "tick fired");

        TickInfo {
            tick: self.tick_count,
            overrun,
            ticks_skipped,
        }
    }

    /// Ticks fired so far.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// The configured interval.
    pub fn interval(&self) -> Duration {
        self.config.interval
    }

    /// The configured overrun policy.
    pub fn policy(&self) -> TickPolicy {
        self.config.policy
    }
}
