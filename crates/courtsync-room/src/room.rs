//! In-memory state of one room.
//!
//! Everything mutable about a room sits behind a single
//! `tokio::sync::Mutex`, reached only through [`Room::locked`]. The
//! closure it takes is synchronous, so nothing can `.await` while the
//! lock is held: callers mutate, copy out what they need (a snapshot, the
//! connections to send to) and do their I/O after the lock is gone.

use std::collections::HashMap;
use std::sync::Arc;

use courtsync_protocol::{PlayerId, PlayerView, Role, RoomId};
use courtsync_transport::Connection;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::coalescer::CoalescerHandle;
use crate::physics::{Ball, World};

/// A connection paired with the player it belongs to.
pub(crate) type Target<C> = (PlayerId, Arc<C>);

#[derive(Debug, Clone)]
pub(crate) struct Player {
    pub(crate) x: f64,
    pub(crate) y: f64,
    pub(crate) color: String,
    pub(crate) role: Role,
    pub(crate) last_seen: Instant,
}

impl Player {
    fn view(&self, player_id: &PlayerId) -> PlayerView {
        PlayerView {
            player_id: player_id.clone(),
            x: self.x,
            y: self.y,
            color: self.color.clone(),
            player_type: self.role,
        }
    }
}

/// Lock-guarded part of a room.
///
/// `connections` and `players` always have the same keys.
pub(crate) struct RoomInner<C> {
    pub(crate) name: String,
    pub(crate) world: Option<World>,
    pub(crate) started: bool,
    pub(crate) dirty: bool,
    pub(crate) connections: HashMap<PlayerId, Arc<C>>,
    pub(crate) players: HashMap<PlayerId, Player>,
    pub(crate) ball: Option<Ball>,
    pub(crate) coalescer: Option<CoalescerHandle>,
}

impl<C> RoomInner<C> {
    /// Role for the next joiner: A unless someone already holds it.
    pub(crate) fn free_role(&self) -> Role {
        if self.players.values().any(|p| p.role == Role::A) {
            Role::B
        } else {
            Role::A
        }
    }

    /// Every player's public view, ordered by player id.
    pub(crate) fn snapshot(&self) -> Vec<PlayerView> {
        let mut players: Vec<PlayerView> = self
            .players
            .iter()
            .map(|(id, player)| player.view(id))
            .collect();
        players.sort_by(|a, b| a.player_id.cmp(&b.player_id));
        players
    }

    /// Every live connection, cloned out for sending after unlock.
    pub(crate) fn targets(&self) -> Vec<Target<C>> {
        self.connections
            .iter()
            .map(|(id, conn)| (id.clone(), Arc::clone(conn)))
            .collect()
    }

    pub(crate) fn coalescer_running(&self) -> bool {
        self.coalescer.as_ref().is_some_and(|h| !h.is_finished())
    }
}

/// One room: its id plus the lock-guarded state.
///
/// Shared as `Arc<Room<C>>` between the registry, the gateway tasks and
/// the room's coalescer.
pub struct Room<C> {
    id: RoomId,
    inner: Mutex<RoomInner<C>>,
}

impl<C: Connection> Room<C> {
    pub(crate) fn new(id: RoomId, name: String) -> Self {
        Self {
            id,
            inner: Mutex::new(RoomInner {
                name,
                world: None,
                started: false,
                dirty: false,
                connections: HashMap::new(),
                players: HashMap::new(),
                ball: None,
                coalescer: None,
            }),
        }
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    /// Runs `f` with the room lock held.
    pub(crate) async fn locked<R>(&self, f: impl FnOnce(&mut RoomInner<C>) -> R) -> R {
        let mut inner = self.inner.lock().await;
        f(&mut inner)
    }

    /// Display name; empty for rooms created implicitly by id.
    pub async fn name(&self) -> String {
        self.locked(|s| s.name.clone()).await
    }

    /// Live connections held locally.
    pub async fn connection_count(&self) -> usize {
        self.locked(|s| s.connections.len()).await
    }

    pub async fn contains(&self, player_id: &PlayerId) -> bool {
        self.locked(|s| s.connections.contains_key(player_id)).await
    }

    /// Players ordered by id.
    pub async fn players(&self) -> Vec<PlayerView> {
        self.locked(|s| s.snapshot()).await
    }

    pub async fn world(&self) -> Option<World> {
        self.locked(|s| s.world).await
    }

    pub async fn ball(&self) -> Option<Ball> {
        self.locked(|s| s.ball).await
    }

    pub async fn is_started(&self) -> bool {
        self.locked(|s| s.started).await
    }

    /// Whether the room's coalescer task is alive.
    pub async fn coalescer_running(&self) -> bool {
        self.locked(|s| s.coalescer_running()).await
    }
}
