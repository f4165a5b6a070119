//! Key layout of the mirror.
//!
//! | Key | Type | Contents |
//! |-----|------|----------|
//! | `rooms` | Set | Every room id ever registered |
//! | `room:{id}:members` | Set | Player ids currently in the room |
//! | `room:{id}:player:{pid}` | Hash | `x`, `y`, `color`, `role`, `last_seen` |
//! | `room:{id}:ball` | Hash | `x`, `y`, `vx`, `vy`, `ts` |
//! | `room:{id}:meta` | Hash | `name`, `started` |
//!
//! `last_seen` and `ts` are Unix epoch seconds as decimal strings, so
//! several server processes can compare them.

/// Global set of room ids.
pub const ROOMS: &str = "rooms";

/// Player hash field names.
pub mod player {
    pub const X: &str = "x";
    pub const Y: &str = "y";
    pub const COLOR: &str = "color";
    pub const ROLE: &str = "role";
    pub const LAST_SEEN: &str = "last_seen";
}

/// Ball hash field names.
pub mod ball {
    pub const X: &str = "x";
    pub const Y: &str = "y";
    pub const VX: &str = "vx";
    pub const VY: &str = "vy";
    pub const TS: &str = "ts";
}

/// Room metadata hash field names.
pub mod meta {
    pub const NAME: &str = "name";
    pub const STARTED: &str = "started";
}

pub fn members(room_id: &str) -> String {
    format!("room:{room_id}:members")
}

pub fn player(room_id: &str, player_id: &str) -> String {
    format!("room:{room_id}:player:{player_id}")
}

pub fn ball(room_id: &str) -> String {
    format!("room:{room_id}:ball")
}

pub fn meta(room_id: &str) -> String {
    format!("room:{room_id}:meta")
}
