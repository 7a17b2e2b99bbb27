//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::session::{Blast, Bomb};
use crate::lobby::RoomId;
use crate::player::Player;

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Pick a display name; must precede any other intent.
    Login { username: String },

    /// Open a new room with the sender as its first member.
    CreateRoom,

    /// Join a waiting room by its code.
    JoinRoom { room_id: RoomId },

    /// Request the current room listing.
    GetRooms,

    /// Relative movement intent.
    PlayerMove { dx: f32, dy: f32 },

    /// Place a bomb at the given position.
    DropBomb { x: f32, y: f32 },
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Login accepted; carries the new player record.
    LoginSuccess { player: Player },

    /// A room was created for the requesting player.
    RoomCreated { room_id: RoomId },

    /// Current room listing. Broadcast on every room-set change.
    RoomsList { rooms: Vec<RoomSummary> },

    /// A game began; carries the full starting roster.
    GameStart { players: HashMap<Uuid, Player> },

    /// Full authoritative state, pushed after every mutation.
    GameUpdate {
        players: HashMap<Uuid, Player>,
        bombs: HashMap<Uuid, Bomb>,
        blasts: Vec<Blast>,
    },

    /// One newly eliminated player.
    PlayerKilled { player_id: Uuid },

    /// The game concluded; carries the sole survivor.
    GameOver { winner: Player },

    /// A failed request (unknown room, full room, duplicate login).
    Error { code: String, message: String },
}

/// One row of the lobby room listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSummary {
    pub id: RoomId,
    pub player_count: usize,
    pub status: RoomStatus,
}

/// Room lifecycle as shown to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Waiting,
    Playing,
}
