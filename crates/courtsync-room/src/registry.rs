//! Room registry: owns every room of the process and implements the
//! join/leave/update protocol on top of them.
//!
//! Each operation follows the same shape:
//!
//! 1. resolve the room (creating it on first reference where that makes
//!    sense),
//! 2. mutate under the room lock and copy out whatever the I/O needs,
//! 3. after the lock is released, write the mirror and broadcast.
//!
//! No operation holds two room locks, and none awaits while holding one.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use courtsync_mirror::MirrorStore;
use courtsync_protocol::{
    CLOSE_NORMAL, PlayerId, PlayerView, Role, RoomId, RoomListEntry, ServerFrame,
};
use courtsync_transport::Connection;
use futures_util::future::join_all;
use rand::Rng;
use tokio::sync::RwLock;
use tokio::time::{Instant, timeout};

use crate::broadcast::fan_out;
use crate::clock::epoch_seconds;
use crate::coalescer;
use crate::mirror::Mirror;
use crate::physics::{Ball, World, spawn_point};
use crate::room::{Player, Room};
use crate::{RoomConfig, RoomError};

/// What a successful join assigned to the player.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinOutcome {
    pub role: Role,
    /// Random `#rrggbb` color.
    pub color: String,
    /// Spawn position.
    pub x: f64,
    pub y: f64,
}

/// Every room of this process, plus the mirror they report to.
///
/// Built once at startup and shared as `Arc<RoomRegistry<..>>` by the
/// gateway tasks and the reaper.
pub struct RoomRegistry<C, S> {
    rooms: RwLock<HashMap<RoomId, Arc<Room<C>>>>,
    mirror: Mirror<S>,
    config: RoomConfig,
}

fn random_color() -> String {
    format!("#{:06x}", rand::rng().random_range(0..=0x00FF_FFFFu32))
}

fn random_room_id() -> RoomId {
    RoomId::new(format!("{:012x}", rand::rng().random::<u64>() >> 16))
}

impl<C: Connection, S: MirrorStore> RoomRegistry<C, S> {
    pub fn new(config: RoomConfig, store: Arc<S>) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            mirror: Mirror::new(store),
            config,
        }
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    pub fn mirror(&self) -> &Mirror<S> {
        &self.mirror
    }

    // -----------------------------------------------------------------------
    // Lookup and listing
    // -----------------------------------------------------------------------

    /// Returns the room, creating an unnamed one if it does not exist yet.
    pub async fn ensure(&self, room_id: &RoomId) -> Arc<Room<C>> {
        if let Some(room) = self.get(room_id).await {
            return room;
        }

        let (room, created) = {
            let mut rooms = self.rooms.write().await;
            match rooms.get(room_id) {
                Some(room) => (Arc::clone(room), false),
                None => {
                    let room = Arc::new(Room::new(room_id.clone(), String::new()));
                    rooms.insert(room_id.clone(), Arc::clone(&room));
                    (room, true)
                }
            }
        };

        if created {
            tracing::info!(%room_id, "room created");
            self.mirror.register_room(room_id, None).await;
        }
        room
    }

    /// Mints a fresh room id and registers the room under `name`.
    pub async fn create(&self, name: &str) -> RoomId {
        let room_id = {
            let mut rooms = self.rooms.write().await;
            let mut room_id = random_room_id();
            while rooms.contains_key(&room_id) {
                room_id = random_room_id();
            }
            rooms.insert(
                room_id.clone(),
                Arc::new(Room::new(room_id.clone(), name.to_owned())),
            );
            room_id
        };

        tracing::info!(%room_id, name, "room created");
        self.mirror.register_room(&room_id, Some(name)).await;
        room_id
    }

    pub async fn get(&self, room_id: &RoomId) -> Option<Arc<Room<C>>> {
        self.rooms.read().await.get(room_id).cloned()
    }

    /// Ids of rooms held by this process.
    pub async fn local_room_ids(&self) -> Vec<RoomId> {
        self.rooms.read().await.keys().cloned().collect()
    }

    async fn local_rooms(&self) -> Vec<Arc<Room<C>>> {
        self.rooms.read().await.values().cloned().collect()
    }

    /// Every known room, local or mirrored, ordered by id.
    ///
    /// Names come from the local room, then the mirror, then the id
    /// itself. Counts are capped at capacity.
    pub async fn list_rooms(&self) -> Vec<RoomListEntry> {
        let mut ids: BTreeSet<RoomId> = self.local_room_ids().await.into_iter().collect();
        ids.extend(self.mirror.room_ids().await);

        let mut entries = Vec::with_capacity(ids.len());
        for room_id in ids {
            let local_name = match self.get(&room_id).await {
                Some(room) => Some(room.name().await).filter(|n| !n.is_empty()),
                None => None,
            };
            let name = match local_name {
                Some(name) => name,
                None => self
                    .mirror
                    .room_name(&room_id)
                    .await
                    .unwrap_or_else(|| room_id.to_string()),
            };
            let player_count = self.player_count(&room_id).await.min(self.config.capacity);
            entries.push(RoomListEntry {
                name,
                room_id,
                player_count,
                capacity: self.config.capacity,
            });
        }
        entries
    }

    /// Players in the room as the mirror sees them (heartbeat-fresh
    /// members only), or the local connection count when the mirror is
    /// unreachable or reports nobody.
    pub async fn player_count(&self, room_id: &RoomId) -> usize {
        let mirrored = self
            .mirror
            .fresh_member_count(room_id, epoch_seconds(), self.config.stale_timeout)
            .await;
        match mirrored {
            Some(count) if count > 0 => count,
            _ => match self.get(room_id).await {
                Some(room) => room.connection_count().await,
                None => 0,
            },
        }
    }

    pub async fn is_full(&self, room_id: &RoomId) -> bool {
        self.player_count(room_id).await >= self.config.capacity
    }

    /// Players of a room ordered by id; empty for unknown rooms.
    pub async fn players(&self, room_id: &RoomId) -> Vec<PlayerView> {
        match self.get(room_id).await {
            Some(room) => room.players().await,
            None => Vec::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------------

    /// Adds `player_id` to the room over `connection`.
    ///
    /// # Errors
    /// - [`RoomError::RoomFull`] when the room is at capacity
    /// - [`RoomError::AlreadyInRoom`] when the player is already a member
    ///
    /// On error nothing about the room has changed.
    pub async fn join(
        &self,
        room_id: &RoomId,
        player_id: &PlayerId,
        connection: Arc<C>,
    ) -> Result<JoinOutcome, RoomError> {
        let room = self.ensure(room_id).await;
        let capacity = self.config.capacity;
        let margin = self.config.spawn_margin;
        let color = random_color();

        let (outcome, targets, members) = room
            .locked(|s| {
                if s.players.contains_key(player_id) {
                    return Err(RoomError::AlreadyInRoom(player_id.clone(), room_id.clone()));
                }
                if s.connections.len() >= capacity {
                    return Err(RoomError::RoomFull(room_id.clone()));
                }

                let role = s.free_role();
                let (x, y) = spawn_point(s.world, role, margin);
                s.connections.insert(player_id.clone(), connection);
                s.players.insert(
                    player_id.clone(),
                    Player {
                        x,
                        y,
                        color: color.clone(),
                        role,
                        last_seen: Instant::now(),
                    },
                );
                let outcome = JoinOutcome { role, color, x, y };
                Ok((outcome, s.targets(), s.connections.len()))
            })
            .await?;

        tracing::info!(
            %room_id,
            %player_id,
            role = %outcome.role,
            players = members,
            "player joined"
        );

        self.mirror
            .add_player(
                room_id,
                player_id,
                (outcome.x, outcome.y),
                &outcome.color,
                outcome.role,
                epoch_seconds(),
            )
            .await;

        let frame = ServerFrame::Join {
            player_id: player_id.clone(),
            player_type: outcome.role,
        };
        fan_out(room_id, &targets, &frame).await;

        let weak = Arc::downgrade(&room);
        let interval = self.config.coalesce_interval;
        room.locked(|s| {
            s.dirty = true;
            if !s.connections.is_empty() && !s.coalescer_running() {
                s.coalescer = Some(coalescer::spawn(weak, interval));
            }
        })
        .await;

        Ok(outcome)
    }

    /// Removes the player, closes its connection and tells the others.
    ///
    /// Idempotent: leaving twice, or leaving a room one never joined, does
    /// nothing.
    pub async fn leave(&self, room_id: &RoomId, player_id: &PlayerId) {
        let Some(room) = self.get(room_id).await else {
            return;
        };

        let removed = room
            .locked(|s| {
                let connection = s.connections.remove(player_id)?;
                s.players.remove(player_id);
                let coalescer = if s.connections.is_empty() {
                    s.coalescer.take()
                } else {
                    None
                };
                Some((connection, s.targets(), coalescer))
            })
            .await;
        let Some((connection, targets, coalescer)) = removed else {
            return;
        };

        self.close_connection(room_id, player_id, &connection).await;
        self.mirror.remove_player(room_id, player_id.as_str()).await;

        let frame = ServerFrame::Leave {
            player_id: player_id.clone(),
        };
        fan_out(room_id, &targets, &frame).await;

        room.locked(|s| s.dirty = true).await;
        if let Some(handle) = coalescer {
            handle.cancel();
        }

        tracing::info!(%room_id, %player_id, players = targets.len(), "player left");
    }

    async fn close_connection(&self, room_id: &RoomId, player_id: &PlayerId, connection: &C) {
        match timeout(self.config.close_timeout, connection.close(CLOSE_NORMAL, "")).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::debug!(%room_id, %player_id, error = %e, "close failed");
            }
            Err(_) => {
                tracing::warn!(%room_id, %player_id, "close timed out");
            }
        }
    }

    // -----------------------------------------------------------------------
    // Player updates
    // -----------------------------------------------------------------------

    /// Refreshes the player's heartbeat. No-op for non-members.
    pub async fn touch(&self, room_id: &RoomId, player_id: &PlayerId) {
        let Some(room) = self.get(room_id).await else {
            return;
        };
        let now = Instant::now();
        let found = room
            .locked(|s| match s.players.get_mut(player_id) {
                Some(player) => {
                    player.last_seen = now;
                    true
                }
                None => false,
            })
            .await;

        if found {
            self.mirror.touch(room_id, player_id, epoch_seconds()).await;
        }
    }

    /// Moves the player and marks the room dirty for the next coalesced
    /// `state`. No-op for non-members.
    pub async fn update_position(&self, room_id: &RoomId, player_id: &PlayerId, x: f64, y: f64) {
        let Some(room) = self.get(room_id).await else {
            return;
        };
        let now = Instant::now();
        let found = room
            .locked(|s| {
                let Some(player) = s.players.get_mut(player_id) else {
                    return false;
                };
                player.x = x;
                player.y = y;
                player.last_seen = now;
                s.dirty = true;
                true
            })
            .await;

        if found {
            self.mirror
                .update_position(room_id, player_id, (x, y), epoch_seconds())
                .await;
        }
    }

    // -----------------------------------------------------------------------
    // Room-wide state
    // -----------------------------------------------------------------------

    /// Stores a ball sample received now and relays it immediately.
    pub async fn record_ball(&self, room_id: &RoomId, x: f64, y: f64, vx: f64, vy: f64) -> Ball {
        self.record_ball_at(room_id, x, y, vx, vy, epoch_seconds())
            .await
    }

    /// [`record_ball`](Self::record_ball) with an explicit receive time in
    /// epoch seconds.
    pub async fn record_ball_at(
        &self,
        room_id: &RoomId,
        x: f64,
        y: f64,
        vx: f64,
        vy: f64,
        now: f64,
    ) -> Ball {
        let room = self.ensure(room_id).await;
        let damping = self.config.damping;
        let (ball, targets) = room
            .locked(|s| {
                let ball = Ball::sample(s.ball.as_ref(), x, y, vx, vy, now, damping);
                s.ball = Some(ball);
                (ball, s.targets())
            })
            .await;

        self.mirror.set_ball(room_id, &ball).await;
        fan_out(room_id, &targets, &ball.to_frame()).await;
        ball
    }

    /// Sets the world bounds if none are set. Returns whether this call
    /// set them.
    pub async fn set_world(&self, room_id: &RoomId, width: f64, height: f64) -> bool {
        let room = self.ensure(room_id).await;
        let set = room
            .locked(|s| {
                if s.world.is_some() {
                    return false;
                }
                s.world = Some(World { width, height });
                true
            })
            .await;
        if set {
            tracing::debug!(%room_id, width, height, "world bounds set");
        }
        set
    }

    /// Marks the game started and announces it, once. Returns whether
    /// this call started it.
    pub async fn start_game(&self, room_id: &RoomId) -> bool {
        let room = self.ensure(room_id).await;
        let targets = room
            .locked(|s| {
                if s.started {
                    return None;
                }
                s.started = true;
                Some(s.targets())
            })
            .await;
        let Some(targets) = targets else {
            return false;
        };

        tracing::info!(%room_id, "game started");
        self.mirror.set_started(room_id).await;
        fan_out(room_id, &targets, &ServerFrame::GameStarted).await;
        true
    }

    /// Sends a `state` snapshot right away, outside the coalescer cadence.
    pub async fn broadcast_state(&self, room_id: &RoomId) {
        let Some(room) = self.get(room_id).await else {
            return;
        };
        let (players, targets) = room.locked(|s| (s.snapshot(), s.targets())).await;
        fan_out(room_id, &targets, &ServerFrame::State { players }).await;
    }

    // -----------------------------------------------------------------------
    // Eviction and shutdown
    // -----------------------------------------------------------------------

    /// One reaper sweep.
    ///
    /// Evicts every local player whose heartbeat is older than the stale
    /// timeout, then purges stale or unreadable members from the mirror
    /// of every known room, local or not.
    pub async fn reap_once(&self) -> ReapReport {
        let now = Instant::now();
        let stale_after = self.config.stale_timeout;
        let mut report = ReapReport::default();

        for room in self.local_rooms().await {
            let stale: Vec<PlayerId> = room
                .locked(|s| {
                    s.players
                        .iter()
                        .filter(|(_, p)| now.saturating_duration_since(p.last_seen) > stale_after)
                        .map(|(id, _)| id.clone())
                        .collect()
                })
                .await;

            for player_id in stale {
                tracing::info!(room_id = %room.id(), %player_id, "evicting idle player");
                self.leave(room.id(), &player_id).await;
                report.evicted += 1;
            }
        }

        let mut connected: BTreeMap<RoomId, Vec<PlayerId>> = BTreeMap::new();
        for room in self.local_rooms().await {
            let ids: Vec<PlayerId> = room.locked(|s| s.players.keys().cloned().collect()).await;
            connected.insert(room.id().clone(), ids);
        }
        let mut ids: BTreeSet<RoomId> = connected.keys().cloned().collect();
        ids.extend(self.mirror.room_ids().await);
        let epoch = epoch_seconds();
        for room_id in ids {
            let keep = connected.get(&room_id).map(Vec::as_slice).unwrap_or_default();
            let purged = self
                .mirror
                .reconcile_room(&room_id, epoch, stale_after, keep)
                .await;
            if !purged.is_empty() {
                tracing::info!(%room_id, count = purged.len(), "purged stale mirror members");
            }
            report.purged += purged.len();
        }

        report
    }

    /// Stops every coalescer, closes every connection, clears the mirror
    /// membership of every room and forgets all rooms.
    pub async fn shutdown(&self) {
        let rooms: Vec<Arc<Room<C>>> = self.rooms.write().await.drain().map(|(_, r)| r).collect();

        for room in rooms {
            let (targets, coalescer) = room
                .locked(|s| {
                    let targets: Vec<_> = s.connections.drain().collect();
                    s.players.clear();
                    s.dirty = false;
                    (targets, s.coalescer.take())
                })
                .await;
            if let Some(handle) = coalescer {
                handle.cancel();
            }

            let closes = targets
                .iter()
                .map(|(player_id, conn)| self.close_connection(room.id(), player_id, conn));
            join_all(closes).await;

            self.mirror.clear_members(room.id()).await;
            tracing::debug!(room_id = %room.id(), closed = targets.len(), "room shut down");
        }
        tracing::info!("room registry shut down");
    }
}

/// Outcome of one [`RoomRegistry::reap_once`] sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReapReport {
    /// Local players evicted.
    pub evicted: usize,
    /// Mirror members purged.
    pub purged: usize,
}
