//! Best-effort writes and reads against the mirror store.
//!
//! Every method here swallows store errors after logging them at debug
//! level. Reads that fail come back as `None` or empty so the caller can
//! fall back to local state.

use std::sync::Arc;
use std::time::Duration;

use courtsync_mirror::{Fields, MirrorError, MirrorStore, keys};
use courtsync_protocol::{PlayerId, Role, RoomId};

use crate::physics::Ball;

/// Room-level view of a [`MirrorStore`].
pub struct Mirror<S> {
    store: Arc<S>,
}

impl<S> Clone for Mirror<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

fn fields<const N: usize>(pairs: [(&str, String); N]) -> Fields {
    pairs.into_iter().map(|(k, v)| (k.to_owned(), v)).collect()
}

fn absorb<T>(result: Result<T, MirrorError>, op: &'static str, room_id: &RoomId) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!(%room_id, op, error = %e, "mirror operation failed");
            None
        }
    }
}

/// Reads a mirrored `last_seen`; missing or garbled values read as `None`.
fn last_seen(player: &Fields) -> Option<f64> {
    player
        .get(keys::player::LAST_SEEN)
        .and_then(|raw| raw.parse::<f64>().ok())
        .filter(|ts| ts.is_finite())
}

fn role(player: &Fields) -> Option<Role> {
    player
        .get(keys::player::ROLE)
        .map(String::as_str)
        .and_then(Role::parse)
}

impl<S: MirrorStore> Mirror<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    // -----------------------------------------------------------------------
    // Room index
    // -----------------------------------------------------------------------

    /// Adds the room to the global index, recording its name if it has one.
    pub async fn register_room(&self, room_id: &RoomId, name: Option<&str>) {
        absorb(
            self.store.set_add(keys::ROOMS, room_id.as_str()).await,
            "register_room",
            room_id,
        );
        if let Some(name) = name {
            absorb(
                self.store
                    .hash_set(
                        &keys::meta(room_id.as_str()),
                        fields([(keys::meta::NAME, name.to_owned())]),
                    )
                    .await,
                "set_room_name",
                room_id,
            );
        }
    }

    pub async fn set_started(&self, room_id: &RoomId) {
        absorb(
            self.store
                .hash_set(
                    &keys::meta(room_id.as_str()),
                    fields([(keys::meta::STARTED, "1".to_owned())]),
                )
                .await,
            "set_started",
            room_id,
        );
    }

    /// Ids in the global room index. Empty when the store is unreachable.
    pub async fn room_ids(&self) -> Vec<RoomId> {
        match self.store.set_members(keys::ROOMS).await {
            Ok(ids) => ids.into_iter().map(RoomId::new).collect(),
            Err(e) => {
                tracing::debug!(error = %e, "mirror room index unavailable");
                Vec::new()
            }
        }
    }

    pub async fn room_name(&self, room_id: &RoomId) -> Option<String> {
        let meta = absorb(
            self.store.hash_get_all(&keys::meta(room_id.as_str())).await,
            "room_name",
            room_id,
        )?;
        meta.get(keys::meta::NAME)
            .filter(|name| !name.is_empty())
            .cloned()
    }

    // -----------------------------------------------------------------------
    // Players
    // -----------------------------------------------------------------------

    pub async fn add_player(
        &self,
        room_id: &RoomId,
        player_id: &PlayerId,
        (x, y): (f64, f64),
        color: &str,
        role: Role,
        seen_at: f64,
    ) {
        absorb(
            self.store
                .set_add(&keys::members(room_id.as_str()), player_id.as_str())
                .await,
            "add_member",
            room_id,
        );
        absorb(
            self.store
                .hash_set(
                    &keys::player(room_id.as_str(), player_id.as_str()),
                    fields([
                        (keys::player::X, x.to_string()),
                        (keys::player::Y, y.to_string()),
                        (keys::player::COLOR, color.to_owned()),
                        (keys::player::ROLE, role.as_str().to_owned()),
                        (keys::player::LAST_SEEN, seen_at.to_string()),
                    ]),
                )
                .await,
            "set_player",
            room_id,
        );
    }

    /// Refreshes the heartbeat. Membership is re-asserted too, so a
    /// connected player purged during a store outage shows up again.
    pub async fn touch(&self, room_id: &RoomId, player_id: &PlayerId, seen_at: f64) {
        self.ensure_member(room_id, player_id).await;
        absorb(
            self.store
                .hash_set(
                    &keys::player(room_id.as_str(), player_id.as_str()),
                    fields([(keys::player::LAST_SEEN, seen_at.to_string())]),
                )
                .await,
            "touch",
            room_id,
        );
    }

    pub async fn update_position(
        &self,
        room_id: &RoomId,
        player_id: &PlayerId,
        (x, y): (f64, f64),
        seen_at: f64,
    ) {
        self.ensure_member(room_id, player_id).await;
        absorb(
            self.store
                .hash_set(
                    &keys::player(room_id.as_str(), player_id.as_str()),
                    fields([
                        (keys::player::X, x.to_string()),
                        (keys::player::Y, y.to_string()),
                        (keys::player::LAST_SEEN, seen_at.to_string()),
                    ]),
                )
                .await,
            "update_position",
            room_id,
        );
    }

    async fn ensure_member(&self, room_id: &RoomId, player_id: &PlayerId) {
        absorb(
            self.store
                .set_add(&keys::members(room_id.as_str()), player_id.as_str())
                .await,
            "add_member",
            room_id,
        );
    }

    /// Drops the player from the member set and deletes its field map.
    pub async fn remove_player(&self, room_id: &RoomId, player_id: &str) {
        absorb(
            self.store
                .set_remove(&keys::members(room_id.as_str()), player_id)
                .await,
            "remove_member",
            room_id,
        );
        absorb(
            self.store
                .delete(&keys::player(room_id.as_str(), player_id))
                .await,
            "delete_player",
            room_id,
        );
    }

    /// Members whose mirrored heartbeat is no older than `stale_after`.
    ///
    /// `None` when the member set cannot be read.
    pub async fn fresh_member_count(
        &self,
        room_id: &RoomId,
        now: f64,
        stale_after: Duration,
    ) -> Option<usize> {
        let members = absorb(
            self.store.set_members(&keys::members(room_id.as_str())).await,
            "members",
            room_id,
        )?;

        let mut fresh = 0;
        for member in &members {
            let Ok(player) = self
                .store
                .hash_get_all(&keys::player(room_id.as_str(), member))
                .await
            else {
                continue;
            };
            if last_seen(&player).is_some_and(|ts| now - ts <= stale_after.as_secs_f64()) {
                fresh += 1;
            }
        }
        Some(fresh)
    }

    /// Purges members whose heartbeat is stale or whose record is
    /// unreadable (no parseable `last_seen` or `role`). Ids in `keep` are
    /// connected to this process and are never purged. Returns the purged
    /// player ids.
    pub async fn reconcile_room(
        &self,
        room_id: &RoomId,
        now: f64,
        stale_after: Duration,
        keep: &[PlayerId],
    ) -> Vec<String> {
        let Some(members) = absorb(
            self.store.set_members(&keys::members(room_id.as_str())).await,
            "members",
            room_id,
        ) else {
            return Vec::new();
        };

        let mut purged = Vec::new();
        for member in members {
            if keep.iter().any(|p| p.as_str() == member) {
                continue;
            }
            let player = self
                .store
                .hash_get_all(&keys::player(room_id.as_str(), &member))
                .await;
            let stale = match player {
                Ok(player) => {
                    role(&player).is_none()
                        || last_seen(&player)
                            .is_none_or(|ts| now - ts > stale_after.as_secs_f64())
                }
                Err(e) => {
                    tracing::debug!(%room_id, player_id = %member, error = %e, "mirror player unreadable");
                    true
                }
            };
            if stale {
                self.remove_player(room_id, &member).await;
                purged.push(member);
            }
        }
        purged
    }

    /// Removes every member of the room from the mirror.
    pub async fn clear_members(&self, room_id: &RoomId) {
        let members = absorb(
            self.store.set_members(&keys::members(room_id.as_str())).await,
            "members",
            room_id,
        )
        .unwrap_or_default();
        for member in &members {
            absorb(
                self.store
                    .delete(&keys::player(room_id.as_str(), member))
                    .await,
                "delete_player",
                room_id,
            );
        }
        absorb(
            self.store.delete(&keys::members(room_id.as_str())).await,
            "delete_members",
            room_id,
        );
    }

    // -----------------------------------------------------------------------
    // Ball
    // -----------------------------------------------------------------------

    pub async fn set_ball(&self, room_id: &RoomId, ball: &Ball) {
        absorb(
            self.store
                .hash_set(
                    &keys::ball(room_id.as_str()),
                    fields([
                        (keys::ball::X, ball.x.to_string()),
                        (keys::ball::Y, ball.y.to_string()),
                        (keys::ball::VX, ball.vx.to_string()),
                        (keys::ball::VY, ball.vy.to_string()),
                        (keys::ball::TS, ball.ts.to_string()),
                    ]),
                )
                .await,
            "set_ball",
            room_id,
        );
    }
}
