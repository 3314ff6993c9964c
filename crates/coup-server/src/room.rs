//! Game room management.
//!
//! A room owns one authoritative [`Game`], maps connection sessions to
//! seats, remembers recently applied intent ids so retried messages are
//! answered without being applied twice, and publishes every accepted
//! transition to its subscribers.

use coup_core::{
    timeout_intents, ErrorKind, Event, Game, GameError, GameSnapshot, GameStatus, HandView,
    Intent, IntentEnvelope, PlayerId,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

use crate::protocol::GameInfo;

/// Applied intent ids remembered per room
pub const DEDUP_CAPACITY: usize = 256;

/// Updates buffered per subscriber before it starts lagging
const UPDATE_BUFFER: usize = 64;

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("Room is full")]
    RoomFull,

    #[error("Player not in room")]
    PlayerNotInRoom,

    #[error("Room not found")]
    RoomNotFound,

    #[error("Invalid intent: {0}")]
    InvalidIntent(String),

    #[error(transparent)]
    Game(#[from] GameError),
}

impl RoomError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RoomError::Game(err) => err.kind(),
            _ => ErrorKind::IllegalIntent,
        }
    }
}

/// An accepted transition, as published to subscribers
#[derive(Debug, Clone)]
pub struct RoomUpdate {
    pub snapshot: GameSnapshot,
    pub events: Vec<Event>,
    /// Private hands, to be split up by the forwarding side
    pub hands: Arc<HashMap<PlayerId, HandView>>,
}

impl RoomUpdate {
    pub fn hand_for(&self, player: PlayerId) -> Option<&HandView> {
        self.hands.get(&player)
    }
}

/// Result of a submitted intent
#[derive(Debug, Clone)]
pub struct Submission {
    pub snapshot: GameSnapshot,
    /// Events appended by this intent (empty for a replay)
    pub events: Vec<Event>,
    /// The intent id had already been applied
    pub replayed: bool,
}

/// A game room with one authoritative game.
pub struct GameRoom {
    pub id: Uuid,
    pub game: Game,
    /// Connection session to seat
    sessions: HashMap<Uuid, PlayerId>,
    applied: VecDeque<(PlayerId, u64, GameSnapshot)>,
    updates: broadcast::Sender<RoomUpdate>,
    /// Last time the game accepted an intent
    last_progress: Instant,
}

impl GameRoom {
    pub fn new(id: Uuid, host_session: Uuid, host_name: &str) -> Result<Self, RoomError> {
        Self::with_game(id, Game::new(id.to_string()), host_session, host_name)
    }

    /// Build a room around a prepared lobby (a fixed seed, for instance)
    pub fn with_game(
        id: Uuid,
        mut game: Game,
        host_session: Uuid,
        host_name: &str,
    ) -> Result<Self, RoomError> {
        let host = game.join(host_name)?;
        let (updates, _) = broadcast::channel(UPDATE_BUFFER);

        Ok(Self {
            id,
            game,
            sessions: HashMap::from([(host_session, host)]),
            applied: VecDeque::with_capacity(DEDUP_CAPACITY),
            updates,
            last_progress: Instant::now(),
        })
    }

    pub fn player_count(&self) -> usize {
        self.game.player_count()
    }

    pub fn player_for(&self, session: Uuid) -> Result<PlayerId, RoomError> {
        self.sessions
            .get(&session)
            .copied()
            .ok_or(RoomError::PlayerNotInRoom)
    }

    pub fn add_player(&mut self, session: Uuid, name: &str) -> Result<PlayerId, RoomError> {
        let player = self.game.join(name).map_err(|err| match err {
            GameError::GameFull => RoomError::RoomFull,
            other => RoomError::Game(other),
        })?;
        self.sessions.insert(session, player);
        self.publish(Vec::new());
        Ok(player)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoomUpdate> {
        self.updates.subscribe()
    }

    pub fn snapshot(&self) -> GameSnapshot {
        self.game.snapshot()
    }

    pub fn hand(&self, session: Uuid) -> Option<HandView> {
        let player = self.sessions.get(&session)?;
        self.game.hand_view(*player)
    }

    /// Apply an intent from a session, deduplicating by intent id
    pub fn submit(
        &mut self,
        session: Uuid,
        envelope: IntentEnvelope,
    ) -> Result<Submission, RoomError> {
        let player = self.player_for(session)?;

        if let Some(intent_id) = envelope.intent_id {
            if let Some(snapshot) = self.replayed(player, intent_id) {
                debug!(room = %self.id, player, intent_id, "replayed intent");
                return Ok(Submission {
                    snapshot,
                    events: Vec::new(),
                    replayed: true,
                });
            }
        }

        if let Some(expected) = envelope.expected_seq {
            if expected != self.game.seq {
                debug!(room = %self.id, player, expected, seq = self.game.seq, "stale intent");
                return Err(GameError::StaleIntent.into());
            }
        }

        let submission = self.apply(player, envelope.intent)?;
        if let Some(intent_id) = envelope.intent_id {
            self.remember(player, intent_id, submission.snapshot.clone());
        }
        Ok(submission)
    }

    fn apply(&mut self, player: PlayerId, intent: Intent) -> Result<Submission, RoomError> {
        let events = self.game.apply_intent(player, intent).map_err(|err| {
            debug!(room = %self.id, player, error = %err, "intent rejected");
            err
        })?;
        self.last_progress = Instant::now();

        let snapshot = self.publish(events.clone());
        debug!(room = %self.id, player, seq = snapshot.seq, "intent accepted");
        Ok(Submission {
            snapshot,
            events,
            replayed: false,
        })
    }

    fn replayed(&self, player: PlayerId, intent_id: u64) -> Option<GameSnapshot> {
        self.applied
            .iter()
            .find(|(p, id, _)| *p == player && *id == intent_id)
            .map(|(_, _, snapshot)| snapshot.clone())
    }

    fn remember(&mut self, player: PlayerId, intent_id: u64, snapshot: GameSnapshot) {
        if self.applied.len() == DEDUP_CAPACITY {
            self.applied.pop_front();
        }
        self.applied.push_back((player, intent_id, snapshot));
    }

    /// Send the current state to every subscriber
    fn publish(&self, events: Vec<Event>) -> GameSnapshot {
        let snapshot = self.game.snapshot();
        let hands: HashMap<PlayerId, HandView> = self
            .game
            .players
            .iter()
            .filter_map(|p| self.game.hand_view(p.id).map(|h| (p.id, h)))
            .collect();

        // No subscribers is fine
        let _ = self.updates.send(RoomUpdate {
            snapshot: snapshot.clone(),
            events,
            hands: Arc::new(hands),
        });
        snapshot
    }

    /// Whether the game has waited on a decision for at least `timeout`
    pub fn is_stalled(&self, now: Instant, timeout: Duration) -> bool {
        self.game.is_running()
            && !self.game.is_frozen()
            && now.saturating_duration_since(self.last_progress) >= timeout
    }

    /// Submit the default decision for everyone the game is waiting on.
    ///
    /// Returns how many intents were applied.
    pub fn expire_turn(&mut self) -> Result<usize, RoomError> {
        let mut applied = 0;
        for (player, intent) in timeout_intents(&self.game) {
            // An earlier default may already have moved the game on
            if !self.game.awaiting().contains(&player) {
                continue;
            }
            info!(room = %self.id, player, ?intent, "turn timed out");
            self.apply(player, intent)?;
            applied += 1;
        }
        Ok(applied)
    }

    /// Handle a dropped connection. Returns true when the room has no
    /// sessions left.
    pub fn disconnect(&mut self, session: Uuid) -> Result<bool, RoomError> {
        let player = self.player_for(session)?;

        match self.game.status {
            GameStatus::Lobby => {
                self.sessions.remove(&session);
                self.apply(player, Intent::Leave)?;
            }
            GameStatus::Running | GameStatus::Finished => {
                self.game.set_connected(player, false)?;
                self.sessions.remove(&session);
                self.publish(Vec::new());
            }
        }

        Ok(self.sessions.is_empty())
    }

    pub fn to_info(&self) -> GameInfo {
        GameInfo {
            id: self.id,
            host_name: self
                .game
                .host()
                .map(|host| self.game.player_name(host))
                .unwrap_or_default(),
            players: self.player_count(),
            status: self.game.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coup_core::{ActionKind, TurnState};

    fn room() -> (GameRoom, Uuid, Uuid) {
        let host = Uuid::new_v4();
        let guest = Uuid::new_v4();
        let mut room =
            GameRoom::with_game(Uuid::new_v4(), Game::with_seed("room", 4), host, "Host").unwrap();
        room.add_player(guest, "Guest").unwrap();
        (room, host, guest)
    }

    fn started() -> (GameRoom, Uuid, Uuid) {
        let (mut room, host, guest) = room();
        room.submit(host, Intent::StartGame.into()).unwrap();
        (room, host, guest)
    }

    #[test]
    fn test_create_room() {
        let (room, host, guest) = room();
        assert_eq!(room.player_count(), 2);
        assert_eq!(room.player_for(host).unwrap(), 0);
        assert_eq!(room.player_for(guest).unwrap(), 1);
        assert_eq!(room.to_info().host_name, "Host");
        assert_eq!(room.to_info().status, GameStatus::Lobby);
    }

    #[test]
    fn test_room_full() {
        let (mut room, _, _) = room();
        for i in 0..4 {
            room.add_player(Uuid::new_v4(), &format!("P{}", i)).unwrap();
        }
        assert!(matches!(
            room.add_player(Uuid::new_v4(), "Late"),
            Err(RoomError::RoomFull)
        ));
    }

    #[test]
    fn test_unknown_session_rejected() {
        let (mut room, _, _) = started();
        let err = room
            .submit(Uuid::new_v4(), Intent::Accept.into())
            .unwrap_err();
        assert!(matches!(err, RoomError::PlayerNotInRoom));
    }

    #[test]
    fn test_replayed_intent_id_is_not_applied_twice() {
        let (mut room, host, _) = started();
        let envelope = IntentEnvelope {
            intent_id: Some(1),
            expected_seq: None,
            intent: Intent::action(ActionKind::Income),
        };

        let first = room.submit(host, envelope.clone()).unwrap();
        assert!(!first.replayed);
        assert_eq!(first.events.len(), 1);
        let logged = room.game.events().len();

        let second = room.submit(host, envelope).unwrap();
        assert!(second.replayed);
        assert!(second.events.is_empty());
        assert_eq!(second.snapshot, first.snapshot);
        assert_eq!(room.game.events().len(), logged);
        assert_eq!(room.game.get_player(0).unwrap().coins, 3);
    }

    #[test]
    fn test_stale_sequence_rejected() {
        let (mut room, host, guest) = started();
        let seq = room.game.seq;
        room.submit(host, Intent::action(ActionKind::Income).into())
            .unwrap();

        let err = room
            .submit(
                guest,
                IntentEnvelope {
                    intent_id: None,
                    expected_seq: Some(seq),
                    intent: Intent::action(ActionKind::Income),
                },
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StaleIntent);
        assert_eq!(room.game.current_player, Some(1));
    }

    #[test]
    fn test_dedup_window_is_bounded() {
        let (mut room, _, _) = room();
        for id in 0..(DEDUP_CAPACITY as u64 + 10) {
            room.remember(0, id, room.snapshot());
        }
        assert_eq!(room.applied.len(), DEDUP_CAPACITY);
        assert!(room.replayed(0, 0).is_none());
        assert!(room.replayed(0, DEDUP_CAPACITY as u64).is_some());
        assert!(room.replayed(1, DEDUP_CAPACITY as u64).is_none());
    }

    #[test]
    fn test_subscribers_receive_updates_with_private_hands() {
        let (mut room, host, _) = started();
        let mut rx = room.subscribe();

        room.submit(host, Intent::action(ActionKind::Tax).into())
            .unwrap();
        let update = rx.try_recv().unwrap();

        assert_eq!(update.snapshot.turn_state, TurnState::Attempted);
        assert_eq!(update.events.len(), 1);
        assert_eq!(update.hand_for(0).unwrap().player, 0);
        assert_eq!(update.hand_for(1).unwrap().player, 1);
    }

    #[test]
    fn test_stalled_turn_expires_to_income() {
        let (mut room, _, _) = started();
        let timeout = Duration::from_secs(10);

        assert!(!room.is_stalled(Instant::now(), timeout));
        assert!(room.is_stalled(Instant::now() + timeout, timeout));

        assert_eq!(room.expire_turn().unwrap(), 1);
        assert_eq!(room.game.get_player(0).unwrap().coins, 3);
        assert_eq!(room.game.current_player, Some(1));
        assert!(!room.is_stalled(Instant::now(), timeout));
    }

    #[test]
    fn test_disconnect_in_lobby_leaves() {
        let (mut room, host, guest) = room();
        assert!(!room.disconnect(host).unwrap());
        assert_eq!(room.player_count(), 1);
        assert_eq!(room.to_info().host_name, "Guest");
        assert!(room.disconnect(guest).unwrap());
    }

    #[test]
    fn test_disconnect_while_running_keeps_seat() {
        let (mut room, _, guest) = started();
        let seq = room.game.seq;
        assert!(!room.disconnect(guest).unwrap());
        assert_eq!(room.player_count(), 2);
        assert!(!room.game.get_player(1).unwrap().connected);
        assert_eq!(room.game.seq, seq);
    }
}
