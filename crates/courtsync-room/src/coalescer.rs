//! Per-room broadcast coalescer.
//!
//! Position updates only mark the room dirty. This task wakes once per
//! interval and, if the flag is set, clears it and sends one `state`
//! snapshot to every member. Any number of moves within an interval
//! therefore cost a single broadcast.
//!
//! The task holds a `Weak` reference to its room and stops when it is
//! told to, when its handle is dropped, or when the room itself is gone.

use std::sync::{Arc, Weak};
use std::time::Duration;

use courtsync_protocol::ServerFrame;
use courtsync_tick::{TickConfig, TickPolicy, Ticker};
use courtsync_transport::Connection;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::broadcast::fan_out;
use crate::room::Room;

/// Owner's side of a running coalescer.
pub(crate) struct CoalescerHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl CoalescerHandle {
    /// Asks the task to stop at its next wait boundary.
    pub(crate) fn cancel(self) {
        let _ = self.stop.send(true);
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Starts a coalescer for `room`.
pub(crate) fn spawn<C: Connection>(room: Weak<Room<C>>, interval: Duration) -> CoalescerHandle {
    let (stop, stop_rx) = watch::channel(false);
    let task = tokio::spawn(run(room, ticker(interval), stop_rx));
    CoalescerHandle { stop, task }
}

/// Snapshots go out on a fixed grid; a late flush does not shift it.
fn ticker(interval: Duration) -> Ticker {
    Ticker::new(TickConfig {
        interval,
        policy: TickPolicy::Drop,
    })
}

async fn run<C: Connection>(room: Weak<Room<C>>, mut ticker: Ticker, mut stop: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            _ = stop.changed() => break,
            _ = ticker.wait() => {
                let Some(room) = room.upgrade() else { break };
                flush(&room).await;
            }
        }
    }
    tracing::trace!("coalescer stopped");
}

/// Sends a snapshot if the room changed since the last flush.
async fn flush<C: Connection>(room: &Arc<Room<C>>) {
    let pending = room
        .locked(|s| {
            if !s.dirty {
                return None;
            }
            s.dirty = false;
            Some((s.snapshot(), s.targets()))
        })
        .await;

    if let Some((players, targets)) = pending {
        fan_out(room.id(), &targets, &ServerFrame::State { players }).await;
    }
}
