//! WebSocket server and connection handling.

use crate::protocol::{ClientMessage, GameInfo, ServerMessage};
use crate::room::{GameRoom, RoomError, RoomUpdate, Submission};
use coup_core::{GameSnapshot, GameStatus, IntentEnvelope, PlayerId};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Server state shared across all connections.
///
/// Each room is mutated only while its map entry is locked, so intents for
/// one game are applied strictly one at a time while other games proceed
/// independently.
pub struct ServerState {
    /// All active rooms
    pub rooms: DashMap<Uuid, GameRoom>,
    /// Mapping from session ID to its room ID
    pub session_rooms: DashMap<Uuid, Uuid>,
    /// Mapping from session ID to its message sender
    pub session_senders: DashMap<Uuid, mpsc::UnboundedSender<ServerMessage>>,
}

impl ServerState {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            session_rooms: DashMap::new(),
            session_senders: DashMap::new(),
        }
    }

    /// Send a message to a specific session.
    pub fn send_to_session(&self, session: Uuid, msg: ServerMessage) {
        if let Some(sender) = self.session_senders.get(&session) {
            let _ = sender.send(msg);
        }
    }

    fn room_of(&self, session: Uuid) -> Result<Uuid, RoomError> {
        self.session_rooms
            .get(&session)
            .map(|entry| *entry)
            .ok_or(RoomError::PlayerNotInRoom)
    }

    /// Open a new game with the session as host
    pub fn create_game(&self, session: Uuid, player_name: &str) -> Result<(Uuid, PlayerId), RoomError> {
        let game_id = Uuid::new_v4();
        let room = GameRoom::new(game_id, session, player_name)?;
        let player = room.player_for(session)?;

        self.rooms.insert(game_id, room);
        self.session_rooms.insert(session, game_id);
        info!(game = %game_id, "game created");
        Ok((game_id, player))
    }

    /// Seat the session in a game that is still in the lobby
    pub fn join_game(
        &self,
        session: Uuid,
        game_id: Uuid,
        player_name: &str,
    ) -> Result<PlayerId, RoomError> {
        let mut room = self.rooms.get_mut(&game_id).ok_or(RoomError::RoomNotFound)?;
        let player = room.add_player(session, player_name)?;
        self.session_rooms.insert(session, game_id);
        info!(game = %game_id, player, "player joined");
        Ok(player)
    }

    /// Apply an intent to the session's game
    pub fn submit_intent(
        &self,
        session: Uuid,
        envelope: IntentEnvelope,
    ) -> Result<Submission, RoomError> {
        let game_id = self.room_of(session)?;
        let mut room = self.rooms.get_mut(&game_id).ok_or(RoomError::RoomNotFound)?;
        room.submit(session, envelope)
    }

    pub fn snapshot(&self, game_id: Uuid) -> Result<GameSnapshot, RoomError> {
        self.rooms
            .get(&game_id)
            .map(|room| room.snapshot())
            .ok_or(RoomError::RoomNotFound)
    }

    /// Stream of every accepted transition in a game
    pub fn subscribe(&self, game_id: Uuid) -> Result<broadcast::Receiver<RoomUpdate>, RoomError> {
        self.rooms
            .get(&game_id)
            .map(|room| room.subscribe())
            .ok_or(RoomError::RoomNotFound)
    }

    /// Games still seating players
    pub fn list_games(&self) -> Vec<GameInfo> {
        self.rooms
            .iter()
            .filter(|room| room.game.status == GameStatus::Lobby)
            .map(|room| room.to_info())
            .collect()
    }

    /// Apply default decisions in every game that has waited too long.
    ///
    /// Returns how many intents were applied.
    pub fn expire_stalled_turns(&self, now: Instant, timeout: Duration) -> usize {
        let mut applied = 0;
        for mut room in self.rooms.iter_mut() {
            if !room.is_stalled(now, timeout) {
                continue;
            }
            match room.expire_turn() {
                Ok(count) => applied += count,
                Err(e) => error!(game = %room.id, error = %e, "timeout policy failed"),
            }
        }
        applied
    }

    /// Handle a dropped connection.
    pub fn disconnect(&self, session: Uuid) {
        let Some((_, game_id)) = self.session_rooms.remove(&session) else {
            return;
        };

        let empty = match self.rooms.get_mut(&game_id) {
            Some(mut room) => match room.disconnect(session) {
                Ok(empty) => empty,
                Err(e) => {
                    warn!(game = %game_id, error = %e, "disconnect failed");
                    false
                }
            },
            None => false,
        };

        if empty {
            self.rooms.remove(&game_id);
            info!(game = %game_id, "game closed");
        }
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Run the WebSocket server.
pub async fn run_server(addr: SocketAddr, state: Arc<ServerState>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Coup server listening on {}", addr);

    while let Ok((stream, peer_addr)) = listener.accept().await {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, state).await {
                error!("Connection error from {}: {}", peer_addr, e);
            }
        });
    }

    Ok(())
}

/// Handle a single WebSocket connection.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    state: Arc<ServerState>,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream).await?;
    info!("New WebSocket connection from {}", addr);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let session = Uuid::new_v4();

    // Create channel for outgoing messages
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    state.session_senders.insert(session, tx.clone());

    let welcome = ServerMessage::Welcome { session_id: session };
    ws_sender
        .send(Message::Text(serde_json::to_string(&welcome)?))
        .await?;

    // Forward queued messages to the socket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Ok(text) = serde_json::to_string(&msg) {
                if ws_sender.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
        }
    });

    let mut updates_task: Option<JoinHandle<()>> = None;

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => {
                    if let Some((game_id, player)) = handle_message(session, client_msg, &state) {
                        if let Some(task) = updates_task.take() {
                            task.abort();
                        }
                        // Subscribe before the attach snapshot so nothing falls in between
                        updates_task =
                            Some(forward_updates(&state, game_id, player, tx.clone()));
                        send_attach(&state, session, game_id);
                    }
                }
                Err(e) => {
                    warn!("Invalid message from {}: {}", session, text);
                    let err = RoomError::InvalidIntent(e.to_string());
                    state.send_to_session(
                        session,
                        ServerMessage::Rejected {
                            reason: err.to_string(),
                            kind: err.kind(),
                        },
                    );
                }
            },
            Ok(Message::Close(_)) => {
                info!("Client {} closing connection", session);
                break;
            }
            Ok(Message::Ping(_)) => {
                state.send_to_session(session, ServerMessage::Pong);
            }
            Err(e) => {
                error!("WebSocket error from {}: {}", session, e);
                break;
            }
            _ => {}
        }
    }

    // Clean up on disconnect
    state.disconnect(session);
    state.session_senders.remove(&session);
    if let Some(task) = updates_task {
        task.abort();
    }
    send_task.abort();

    info!("Connection closed for {}", session);
    Ok(())
}

/// Relay a game's updates to one connection, keeping only its own hand
fn forward_updates(
    state: &Arc<ServerState>,
    game_id: Uuid,
    player: PlayerId,
    tx: mpsc::UnboundedSender<ServerMessage>,
) -> JoinHandle<()> {
    let receiver = state.subscribe(game_id);
    let state = Arc::clone(state);

    tokio::spawn(async move {
        let mut receiver = match receiver {
            Ok(receiver) => receiver,
            Err(_) => return,
        };

        loop {
            match receiver.recv().await {
                Ok(update) => {
                    let hand = update.hand_for(player).cloned();
                    let msg = ServerMessage::Update {
                        snapshot: update.snapshot,
                        events: update.events,
                    };
                    if tx.send(msg).is_err() {
                        break;
                    }
                    if let Some(hand) = hand {
                        let _ = tx.send(ServerMessage::Hand { hand });
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(game = %game_id, player, skipped, "subscriber lagged, resyncing");
                    if let Some(room) = state.rooms.get(&game_id) {
                        let _ = tx.send(ServerMessage::Snapshot {
                            snapshot: room.snapshot(),
                            events: room.game.events_since(0),
                        });
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

/// Send the full state of the session's game to that session
fn send_attach(state: &ServerState, session: Uuid, game_id: Uuid) {
    if let Some(room) = state.rooms.get(&game_id) {
        let snapshot = room.snapshot();
        let events = room.game.events_since(0);
        let hand = room.hand(session);
        drop(room);

        state.send_to_session(session, ServerMessage::Snapshot { snapshot, events });
        if let Some(hand) = hand {
            state.send_to_session(session, ServerMessage::Hand { hand });
        }
    }
}

/// A session holds at most one seat
fn already_seated(state: &ServerState, session: Uuid) -> bool {
    if !state.session_rooms.contains_key(&session) {
        return false;
    }
    state.send_to_session(
        session,
        ServerMessage::Error {
            message: "Already in a game".to_string(),
        },
    );
    true
}

fn reject(state: &ServerState, session: Uuid, err: RoomError) {
    state.send_to_session(
        session,
        ServerMessage::Rejected {
            reason: err.to_string(),
            kind: err.kind(),
        },
    );
}

/// Handle a client message. Returns the game and seat when the session
/// has just been seated, so the caller can attach it to the game.
fn handle_message(
    session: Uuid,
    msg: ClientMessage,
    state: &Arc<ServerState>,
) -> Option<(Uuid, PlayerId)> {
    match msg {
        ClientMessage::CreateGame { player_name } => {
            if already_seated(state, session) {
                return None;
            }
            match state.create_game(session, &player_name) {
                Ok((game_id, player_id)) => {
                    state.send_to_session(session, ServerMessage::Joined { game_id, player_id });
                    Some((game_id, player_id))
                }
                Err(e) => {
                    reject(state, session, e);
                    None
                }
            }
        }

        ClientMessage::JoinGame {
            game_id,
            player_name,
        } => {
            if already_seated(state, session) {
                return None;
            }

            match state.join_game(session, game_id, &player_name) {
                Ok(player_id) => {
                    state.send_to_session(session, ServerMessage::Joined { game_id, player_id });
                    Some((game_id, player_id))
                }
                Err(e) => {
                    reject(state, session, e);
                    None
                }
            }
        }

        ClientMessage::Intent { envelope } => {
            match state.submit_intent(session, envelope) {
                // Fresh transitions reach the session through its subscription
                Ok(submission) if submission.replayed => {
                    state.send_to_session(
                        session,
                        ServerMessage::Snapshot {
                            snapshot: submission.snapshot,
                            events: submission.events,
                        },
                    );
                }
                Ok(_) => {}
                Err(e) => reject(state, session, e),
            }
            None
        }

        ClientMessage::GetSnapshot => {
            match state.room_of(session) {
                Ok(game_id) => send_attach(state, session, game_id),
                Err(e) => reject(state, session, e),
            }
            None
        }

        ClientMessage::ListGames => {
            let games = state.list_games();
            state.send_to_session(session, ServerMessage::GameList { games });
            None
        }

        ClientMessage::Ping => {
            state.send_to_session(session, ServerMessage::Pong);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coup_core::{ActionKind, ErrorKind, Intent, TurnState};

    fn two_player_game(state: &ServerState) -> (Uuid, Uuid, Uuid) {
        let host = Uuid::new_v4();
        let guest = Uuid::new_v4();
        let (game_id, _) = state.create_game(host, "Host").unwrap();
        state.join_game(guest, game_id, "Guest").unwrap();
        (game_id, host, guest)
    }

    #[tokio::test]
    async fn test_submit_and_subscribe() {
        let state = ServerState::new();
        let (game_id, host, _) = two_player_game(&state);
        let mut updates = state.subscribe(game_id).unwrap();

        state.submit_intent(host, Intent::StartGame.into()).unwrap();
        state
            .submit_intent(host, Intent::action(ActionKind::Tax).into())
            .unwrap();

        let started = updates.recv().await.unwrap();
        assert_eq!(started.snapshot.status, GameStatus::Running);
        let taxed = updates.recv().await.unwrap();
        assert_eq!(taxed.snapshot.turn_state, TurnState::Attempted);
        assert_eq!(taxed.snapshot.seq, started.snapshot.seq + 1);
        assert_eq!(taxed.events[0].message, "Host attempts to collect tax");
        assert_eq!(state.snapshot(game_id).unwrap(), taxed.snapshot);
    }

    #[tokio::test]
    async fn test_rejection_is_reported_and_harmless() {
        let state = ServerState::new();
        let (game_id, host, guest) = two_player_game(&state);
        state.submit_intent(host, Intent::StartGame.into()).unwrap();
        let before = state.snapshot(game_id).unwrap();

        let err = state
            .submit_intent(guest, Intent::action(ActionKind::Income).into())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalIntent);
        assert_eq!(state.snapshot(game_id).unwrap(), before);

        let err = state
            .submit_intent(Uuid::new_v4(), Intent::Accept.into())
            .unwrap_err();
        assert!(matches!(err, RoomError::PlayerNotInRoom));
    }

    #[tokio::test]
    async fn test_games_are_independent() {
        let state = Arc::new(ServerState::new());
        let (first, host_a, _) = two_player_game(&state);
        let (second, host_b, _) = two_player_game(&state);

        let a = {
            let state = Arc::clone(&state);
            tokio::spawn(async move { state.submit_intent(host_a, Intent::StartGame.into()) })
        };
        let b = {
            let state = Arc::clone(&state);
            tokio::spawn(async move { state.submit_intent(host_b, Intent::StartGame.into()) })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        assert_eq!(state.snapshot(first).unwrap().seq, 1);
        assert_eq!(state.snapshot(second).unwrap().seq, 1);
        assert!(state.list_games().is_empty());
    }

    #[tokio::test]
    async fn test_lobby_disconnects_close_the_game() {
        let state = ServerState::new();
        let (game_id, host, guest) = two_player_game(&state);
        assert_eq!(state.list_games().len(), 1);

        state.disconnect(host);
        assert_eq!(state.list_games()[0].host_name, "Guest");

        state.disconnect(guest);
        assert!(matches!(
            state.snapshot(game_id),
            Err(RoomError::RoomNotFound)
        ));
    }

    #[tokio::test]
    async fn test_expire_stalled_turns() {
        let state = ServerState::new();
        let (game_id, host, _) = two_player_game(&state);
        let timeout = Duration::from_secs(10);

        assert_eq!(state.expire_stalled_turns(Instant::now() + timeout, timeout), 0);

        state.submit_intent(host, Intent::StartGame.into()).unwrap();
        assert_eq!(state.expire_stalled_turns(Instant::now(), timeout), 0);
        assert_eq!(state.expire_stalled_turns(Instant::now() + timeout, timeout), 1);

        let snapshot = state.snapshot(game_id).unwrap();
        assert_eq!(snapshot.players[0].coins, 3);
        assert_eq!(snapshot.current_player, Some(1));
    }
}
