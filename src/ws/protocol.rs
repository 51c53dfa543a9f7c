//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::combat::HitZone;
use crate::game::r#match::MatchPhase;
use crate::game::vector::Vec3;

/// Permission level of a player
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    #[default]
    User,
    Moderator,
    Admin,
}

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum ClientMsg {
    /// Spawn into the world. Binds the connection to `name`.
    AddNewPlayer {
        name: String,
        position: Vec3,
        #[serde(default)]
        rotation: Vec3,
        #[serde(default)]
        pitch: f32,
    },

    /// Current movement keys and look direction
    UpdatePlayerKeybinds {
        name: String,
        movement: MovementInput,
        /// Client clock when the input was sampled (ms)
        #[serde(default)]
        timestamp: u64,
        /// Client's estimate of its clock skew against the server (ms)
        #[serde(default)]
        network_time_offset: f64,
    },

    /// Client-predicted position to check against the server
    VerifyPosition { name: String, position: Vec3 },

    /// Explicit leave
    Disconnect { name: String },

    /// Hitscan shot resolved on the client
    ShotFired {
        name: String,
        #[serde(default)]
        target: Option<String>,
        hit_zone: HitZone,
    },

    Reload { name: String },

    Chat { name: String, text: String },

    /// Moderator action removing another player
    KickPlayer { name: String, target: String },
}

impl ClientMsg {
    /// Every `type` tag the server understands
    pub const KINDS: [&'static str; 8] = [
        "ADD_NEW_PLAYER",
        "UPDATE_PLAYER_KEYBINDS",
        "VERIFY_POSITION",
        "DISCONNECT",
        "SHOT_FIRED",
        "RELOAD",
        "CHAT",
        "KICK_PLAYER",
    ];

    /// Name of the player the message is about
    pub fn name(&self) -> &str {
        match self {
            ClientMsg::AddNewPlayer { name, .. }
            | ClientMsg::UpdatePlayerKeybinds { name, .. }
            | ClientMsg::VerifyPosition { name, .. }
            | ClientMsg::Disconnect { name }
            | ClientMsg::ShotFired { name, .. }
            | ClientMsg::Reload { name }
            | ClientMsg::Chat { name, .. }
            | ClientMsg::KickPlayer { name, .. } => name,
        }
    }
}

/// Movement block of a keybind update
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementInput {
    #[serde(default)]
    pub forward: f32,
    #[serde(default)]
    pub side: f32,
    #[serde(default)]
    pub is_sprinting: bool,
    #[serde(default)]
    pub is_jumping: bool,
    #[serde(default)]
    pub rotation: Vec3,
    #[serde(default)]
    pub pitch: f32,
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum ServerMsg {
    /// Sent once the connection is bound to a player
    Welcome {
        name: String,
        server_time: u64,
        tick_rate: u32,
    },

    NewPlayer { player: PlayerSnapshot },

    UpdatePlayer { player: PlayerSnapshot },

    RemovePlayer { name: String },

    /// Authoritative transform replacing a rejected client prediction
    PositionCorrection {
        position: Vec3,
        rotation: Vec3,
        pitch: f32,
    },

    MatchPhaseChange {
        phase: MatchPhase,
        /// Absent while waiting for players
        match_id: Option<Uuid>,
        time_remaining: u64,
    },

    MatchTimerUpdate { time_remaining: u64 },

    MatchStatsUpdate { stats: Vec<ScoreboardEntry> },

    MatchEnd { match_id: Option<Uuid> },

    AmmoUpdate { ammo: u32, max_ammo: u32 },

    Chat { name: String, text: String },

    Error { code: String, message: String },
}

impl ServerMsg {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        ServerMsg::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Position and look direction
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformSnapshot {
    pub position: Vec3,
    /// Euler angles; only `y` (yaw) is used
    pub rotation: Vec3,
    pub pitch: f32,
}

/// Public view of one player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub name: String,
    pub role: Role,
    pub position: Vec3,
    pub rotation: Vec3,
    pub pitch: f32,
    pub velocity: Vec3,
    pub is_jumping: bool,
    pub health: f32,
    pub kills: u32,
    pub deaths: u32,
}

impl PlayerSnapshot {
    pub fn transform(&self) -> TransformSnapshot {
        TransformSnapshot {
            position: self.position,
            rotation: self.rotation,
            pitch: self.pitch,
        }
    }
}

/// One scoreboard row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreboardEntry {
    pub name: String,
    pub kills: u32,
    pub deaths: u32,
    pub headshots: u32,
    pub bodyshots: u32,
    pub missedshots: u32,
    /// False for players who left mid-match
    pub active: bool,
}

/// Inbound frame errors
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Unknown message type: {0}")]
    UnknownKind(String),
}

/// Parse an inbound text frame. Unknown `type` tags are reported as
/// [`ProtocolError::UnknownKind`] rather than a generic parse failure.
pub fn decode_client_msg(text: &str) -> Result<ClientMsg, ProtocolError> {
    #[derive(Deserialize)]
    struct Envelope {
        #[serde(rename = "type")]
        kind: String,
    }

    let envelope: Envelope = serde_json::from_str(text)?;
    if !ClientMsg::KINDS.contains(&envelope.kind.as_str()) {
        return Err(ProtocolError::UnknownKind(envelope.kind));
    }
    Ok(serde_json::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_keybinds_with_camel_case_fields() {
        let text = r#"{
            "type": "UPDATE_PLAYER_KEYBINDS",
            "name": "alice",
            "movement": {
                "forward": 1.0,
                "side": -1.0,
                "isSprinting": true,
                "isJumping": false,
                "rotation": {"x": 0.0, "y": 1.5, "z": 0.0},
                "pitch": 0.2
            },
            "timestamp": 1700000000000,
            "networkTimeOffset": -12.5
        }"#;

        match decode_client_msg(text).unwrap() {
            ClientMsg::UpdatePlayerKeybinds {
                name,
                movement,
                timestamp,
                network_time_offset,
            } => {
                assert_eq!(name, "alice");
                assert!(movement.is_sprinting);
                assert_eq!(movement.side, -1.0);
                assert_eq!(movement.rotation.y, 1.5);
                assert_eq!(timestamp, 1_700_000_000_000);
                assert_eq!(network_time_offset, -12.5);
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn unknown_kind_is_distinct_from_malformed() {
        let unknown = decode_client_msg(r#"{"type":"TELEPORT","name":"bob"}"#);
        assert!(matches!(unknown, Err(ProtocolError::UnknownKind(kind)) if kind == "TELEPORT"));

        let malformed = decode_client_msg(r#"{"type":"VERIFY_POSITION","name":"bob"}"#);
        assert!(matches!(malformed, Err(ProtocolError::Malformed(_))));

        let garbage = decode_client_msg("not json");
        assert!(matches!(garbage, Err(ProtocolError::Malformed(_))));
    }

    #[test]
    fn every_known_kind_has_a_variant() {
        let samples = [
            r#"{"type":"ADD_NEW_PLAYER","name":"a","position":{"x":0,"y":0,"z":0}}"#,
            r#"{"type":"UPDATE_PLAYER_KEYBINDS","name":"a","movement":{}}"#,
            r#"{"type":"VERIFY_POSITION","name":"a","position":{"x":0,"y":0,"z":0}}"#,
            r#"{"type":"DISCONNECT","name":"a"}"#,
            r#"{"type":"SHOT_FIRED","name":"a","target":"b","hitZone":"HEAD"}"#,
            r#"{"type":"RELOAD","name":"a"}"#,
            r#"{"type":"CHAT","name":"a","text":"gg"}"#,
            r#"{"type":"KICK_PLAYER","name":"a","target":"b"}"#,
        ];
        assert_eq!(samples.len(), ClientMsg::KINDS.len());
        for sample in samples {
            let msg = decode_client_msg(sample).unwrap();
            assert_eq!(msg.name(), "a");
        }
    }

    #[test]
    fn phase_change_wire_shape() {
        let msg = ServerMsg::MatchPhaseChange {
            phase: MatchPhase::WaitingForPlayers,
            match_id: None,
            time_remaining: 0,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "MATCH_PHASE_CHANGE");
        assert_eq!(json["phase"], "WAITING_FOR_PLAYERS");
        assert_eq!(json["timeRemaining"], 0);
        assert!(json["matchId"].is_null());
    }
}
