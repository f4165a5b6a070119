//! Global inactivity reaper.
//!
//! One task per process sweeps every room on a fixed interval (see
//! [`RoomRegistry::reap_once`]). A sweep never fails as a whole: errors
//! are absorbed per player and per mirror key, so the loop only ends
//! when it is stopped.

use std::sync::Arc;

use courtsync_mirror::MirrorStore;
use courtsync_tick::Ticker;
use courtsync_transport::Connection;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::RoomRegistry;

/// Handle to the running reaper.
pub struct ReaperHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReaperHandle {
    /// Stops the reaper at its next wait boundary and waits for it.
    ///
    /// A sweep already in progress finishes first.
    pub async fn stop(self) {
        let _ = self.stop.send(true);
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "reaper task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Starts the reaper for `registry`, sweeping every `reap_interval`.
pub fn spawn_reaper<C: Connection, S: MirrorStore>(
    registry: Arc<RoomRegistry<C, S>>,
) -> ReaperHandle {
    let (stop, mut stop_rx) = watch::channel(false);
    let mut ticker = Ticker::every(registry.config().reap_interval);

    let task = tokio::spawn(async move {
        tracing::debug!(interval = ?ticker.interval(), "reaper started");
        loop {
            tokio::select! {
                _ = stop_rx.changed() => break,
                _ = ticker.wait() => {
                    let report = registry.reap_once().await;
                    if report.evicted > 0 || report.purged > 0 {
                        tracing::debug!(evicted = report.evicted, purged = report.purged, "reaper sweep");
                    }
                }
            }
        }
        tracing::debug!("reaper stopped");
    });

    ReaperHandle { stop, task }
}
