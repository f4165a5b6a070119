//! Frames exchanged over a room connection.
//!
//! Every frame is a JSON object with a `type` field. Outbound frames are
//! a plain serde enum; inbound frames go through [`ClientFrame::decode`],
//! which is deliberately lenient: a bad number drops the frame, an unknown
//! `type` becomes [`ClientFrame::Unknown`], and only bytes that are not a
//! JSON object at all are reported as an error.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Codec, PlayerId, ProtocolError, Role, RoomId};

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// One player's entry in a `state` snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub player_id: PlayerId,
    pub x: f64,
    pub y: f64,
    pub color: String,
    pub player_type: Role,
}

/// Server → client frames.
///
/// `#[serde(tag = "type", rename_all = "snake_case")]` produces the
/// internally tagged shape clients expect, e.g.
/// `{"type":"leave","player_id":"7"}` and `{"type":"game_started"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// A player entered the room.
    Join { player_id: PlayerId, player_type: Role },

    /// A player left the room (explicitly, by disconnect, or by eviction).
    Leave { player_id: PlayerId },

    /// Coalesced full snapshot of every player in the room.
    State { players: Vec<PlayerView> },

    /// Latest ball sample, velocity already decayed. `ts` is seconds since
    /// the Unix epoch.
    Ball { x: f64, y: f64, vx: f64, vy: f64, ts: f64 },

    /// The room's game was started. Sent once per room.
    GameStarted,

    /// Reply to a `ping`.
    Pong,

    /// Non-fatal error reply.
    Error { message: String },

    /// Authentication notice, sent immediately before a forced close.
    Auth { message: String },
}

impl ServerFrame {
    /// The frame sent right before closing a connection whose credential
    /// is missing, invalid, or expired.
    pub fn auth_failed() -> Self {
        Self::Auth {
            message: "false".to_owned(),
        }
    }

    /// Generic error reply.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

/// A room as reported by room listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomListEntry {
    pub name: String,
    pub room_id: RoomId,
    /// Current occupancy, never above `capacity`.
    pub player_count: usize,
    pub capacity: usize,
}

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// Client → server frames, decoded once at the connection boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientFrame {
    /// `{"type":"move","x":..,"y":..}`
    Move { x: f64, y: f64 },

    /// `{"type":"ping"}` heartbeat.
    Ping,

    /// `{"type":"ball","x":..,"y":..,"vx":..,"vy":..}` ball sample.
    Ball { x: f64, y: f64, vx: f64, vy: f64 },

    /// `{"type":"world","width":..,"height":..}` world bounds.
    World { width: f64, height: f64 },

    /// `{"type":"start"}` request to start the room's game.
    Start,

    /// A known kind whose fields could not be used. Dropped silently.
    Dropped { kind: &'static str },

    /// Any other `type` value (including a missing one).
    Unknown(String),
}

impl ClientFrame {
    /// Decodes one inbound frame.
    ///
    /// `type` matching is case-insensitive. Numbers may arrive as JSON
    /// numbers or numeric strings; non-finite values count as unparsable.
    ///
    /// # Errors
    /// Returns a [`ProtocolError`] only when the bytes are not a JSON
    /// object. Callers ignore such frames and keep reading.
    pub fn decode(codec: &impl Codec, data: &[u8]) -> Result<Self, ProtocolError> {
        let fields: Map<String, Value> = codec.decode(data)?;
        Ok(Self::from_fields(&fields))
    }

    fn from_fields(fields: &Map<String, Value>) -> Self {
        let kind = match fields.get("type") {
            Some(Value::String(s)) => s.to_lowercase(),
            None | Some(Value::Null) => String::new(),
            Some(other) => other.to_string(),
        };

        match kind.as_str() {
            "move" => match (number(fields, "x"), number(fields, "y")) {
                (Some(x), Some(y)) => Self::Move { x, y },
                _ => Self::Dropped { kind: "move" },
            },
            "ping" => Self::Ping,
            "ball" => match (
                number(fields, "x"),
                number(fields, "y"),
                number(fields, "vx"),
                number(fields, "vy"),
            ) {
                (Some(x), Some(y), Some(vx), Some(vy)) => Self::Ball { x, y, vx, vy },
                _ => Self::Dropped { kind: "ball" },
            },
            "world" => match (number(fields, "width"), number(fields, "height")) {
                (Some(width), Some(height)) if width > 0.0 && height > 0.0 => {
                    Self::World { width, height }
                }
                _ => Self::Dropped { kind: "world" },
            },
            "start" => Self::Start,
            _ => Self::Unknown(kind),
        }
    }
}

/// Reads a numeric field, accepting numeric strings.
fn number(fields: &Map<String, Value>, key: &str) -> Option<f64> {
    let value = match fields.get(key)? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    value.is_finite().then_some(value)
}
