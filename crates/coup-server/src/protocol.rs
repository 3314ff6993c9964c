//! WebSocket protocol messages for Coup multiplayer.

use coup_core::{ErrorKind, Event, GameSnapshot, GameStatus, HandView, IntentEnvelope, PlayerId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientMessage {
    /// Create a new game and take the host seat
    CreateGame { player_name: String },

    /// Take a seat in a game that is still in the lobby
    JoinGame { game_id: Uuid, player_name: String },

    /// Submit an intent to the current game
    Intent { envelope: IntentEnvelope },

    /// Ask for the full snapshot and log of the current game
    GetSnapshot,

    /// Request game list
    ListGames,

    /// Ping for keepalive
    Ping,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerMessage {
    /// Welcome message with the session id
    Welcome { session_id: Uuid },

    /// Seated in a game
    Joined { game_id: Uuid, player_id: PlayerId },

    /// Full state on attach or request, with the whole log
    Snapshot {
        snapshot: GameSnapshot,
        events: Vec<Event>,
    },

    /// State after an accepted intent, with the events it appended
    Update {
        snapshot: GameSnapshot,
        events: Vec<Event>,
    },

    /// The receiving player's own cards
    Hand { hand: HandView },

    /// An intent was refused; nothing changed
    Rejected { reason: String, kind: ErrorKind },

    /// List of joinable games
    GameList { games: Vec<GameInfo> },

    /// Error occurred
    Error { message: String },

    /// Pong response
    Pong,
}

/// Game listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameInfo {
    pub id: Uuid,
    pub host_name: String,
    pub players: usize,
    pub status: GameStatus,
}
