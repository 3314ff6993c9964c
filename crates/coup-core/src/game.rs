//! Core game state machine.
//!
//! This module contains the `Game` struct: seating, the per-turn state
//! machine that resolves actions, challenges and blocks, and win detection.
//! All mutation goes through [`Game::apply_intent`], which validates with
//! the legality resolver before touching anything.

use crate::actions::{ActionKind, Intent};
use crate::cards::{Deck, Role};
use crate::events::{Event, EventLog, GameEvent};
use crate::legality;
use crate::player::{Influence, Player, PlayerId, HAND_SIZE, STARTING_COINS};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{debug, error};

/// Fewest players a game can start with
pub const MIN_PLAYERS: usize = 2;

/// Most players a game can seat (12 cards dealt leaves 3 for exchanges)
pub const MAX_PLAYERS: usize = 6;

/// At this many coins a player must launch a coup
pub const MUST_COUP_COINS: u32 = 10;

/// Longest allowed display name
pub const MAX_NAME_LEN: usize = 20;

/// Cards drawn by an exchange
pub const EXCHANGE_DRAW: usize = 2;

/// Lifecycle of a game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameStatus {
    /// Seating players
    Lobby,
    /// Turns are being played
    Running,
    /// One player is left
    Finished,
}

/// Where the current turn stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnState {
    /// Waiting for the current player to declare an action
    Start,
    /// Action declared; other players accept, challenge or block
    Attempted,
    /// The actor must reveal to prove or disprove their claim
    Challenged,
    /// The challenger was wrong and must give up an influence
    ChallengerRevealing,
    /// A block was declared; players accept it or challenge it
    Blocked,
    /// The blocker must reveal to prove or disprove the block
    BlockChallenged,
    /// The block challenger was wrong and must give up an influence
    BlockChallengerRevealing,
    /// The target must give up an influence to a coup or assassination
    TargetRevealing,
    /// The actor is choosing which cards to keep
    Exchanging,
}

/// Which rejection bucket an error falls in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Wrong actor, phase, resources or target. Nothing changed.
    IllegalIntent,
    /// Duplicate or out-of-order delivery. Nothing changed.
    StaleIntent,
    /// Internal inconsistency. The game is frozen.
    InvariantViolation,
    /// The game is in the lobby or finished.
    GameNotRunning,
}

/// Errors that can occur when applying intents
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum GameError {
    #[error("Not your turn")]
    NotYourTurn,

    #[error("Invalid intent for current turn state")]
    InvalidPhase,

    #[error("Cannot afford this")]
    CannotAfford,

    #[error("Must launch a coup with {} or more coins", MUST_COUP_COINS)]
    MustCoup,

    #[error("Invalid target")]
    InvalidTarget,

    #[error("Not eligible to do that")]
    NotEligible,

    #[error("Already responded")]
    AlreadyResponded,

    #[error("This action makes no claim to challenge")]
    NotClaimable,

    #[error("This action cannot be blocked with that role")]
    NotBlockable,

    #[error("Invalid influence for reveal")]
    InvalidReveal,

    #[error("Invalid exchange selection")]
    InvalidExchange,

    #[error("Name must be 1 to {} characters", MAX_NAME_LEN)]
    InvalidName,

    #[error("Not the host")]
    NotHost,

    #[error("Not enough players")]
    NotEnoughPlayers,

    #[error("Game is full")]
    GameFull,

    #[error("Player not in game")]
    UnknownPlayer,

    #[error("Game is not running")]
    GameNotRunning,

    #[error("Game is over")]
    GameOver,

    #[error("Stale intent")]
    StaleIntent,

    #[error("Invariant violated: {0}")]
    Invariant(String),

    #[error("Game is frozen after an internal error")]
    Frozen,
}

impl GameError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GameError::StaleIntent => ErrorKind::StaleIntent,
            GameError::Invariant(_) | GameError::Frozen => ErrorKind::InvariantViolation,
            GameError::GameNotRunning | GameError::GameOver => ErrorKind::GameNotRunning,
            _ => ErrorKind::IllegalIntent,
        }
    }
}

fn invariant(message: &str) -> GameError {
    GameError::Invariant(message.to_string())
}

/// The complete state of one game
#[derive(Debug, Clone)]
pub struct Game {
    pub id: String,
    pub status: GameStatus,
    /// Seated players, in turn order
    pub players: Vec<Player>,
    /// Whose turn it is (set while running)
    pub current_player: Option<PlayerId>,
    pub turn_state: TurnState,
    /// The action declared this turn
    pub turn_action: Option<ActionKind>,
    pub turn_target: Option<PlayerId>,
    pub turn_challenger: Option<PlayerId>,
    pub turn_blocker: Option<PlayerId>,
    /// Role the blocker claimed
    pub turn_block_claim: Option<Role>,
    pub turn_block_challenger: Option<PlayerId>,
    /// Players who accepted in the current turn state
    pub responded: BTreeSet<PlayerId>,
    pub winner: Option<PlayerId>,
    /// Bumped once per accepted intent
    pub seq: u64,
    /// Turn number (starts at 1 when the game starts)
    pub turn_number: u32,
    deck: Deck,
    /// Cards drawn by an exchange in progress
    exchange_draw: Vec<Role>,
    events: EventLog,
    next_player_id: PlayerId,
    frozen: bool,
}

impl Game {
    /// Create an empty lobby with a randomly shuffled deck
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_seed(id, rand::thread_rng().gen())
    }

    /// Create an empty lobby whose deck order is fixed by `seed`
    pub fn with_seed(id: impl Into<String>, seed: u64) -> Self {
        Self {
            id: id.into(),
            status: GameStatus::Lobby,
            players: Vec::new(),
            current_player: None,
            turn_state: TurnState::Start,
            turn_action: None,
            turn_target: None,
            turn_challenger: None,
            turn_blocker: None,
            turn_block_claim: None,
            turn_block_challenger: None,
            responded: BTreeSet::new(),
            winner: None,
            seq: 0,
            turn_number: 0,
            deck: Deck::standard(seed),
            exchange_draw: Vec::new(),
            events: EventLog::new(),
            next_player_id: 0,
            frozen: false,
        }
    }

    /// Create a running game from a known deal.
    ///
    /// Each hand is pulled out of a fresh deck, so the remaining deck holds
    /// exactly the cards nobody was dealt. The first seat is host and moves
    /// first. Useful for replaying recorded games.
    pub fn with_hands(
        id: impl Into<String>,
        names: &[&str],
        hands: &[[Role; HAND_SIZE]],
        seed: u64,
    ) -> Result<Self, GameError> {
        if names.len() != hands.len() {
            return Err(invariant("every seat needs exactly one hand"));
        }
        if names.len() < MIN_PLAYERS {
            return Err(GameError::NotEnoughPlayers);
        }
        if names.len() > MAX_PLAYERS {
            return Err(GameError::GameFull);
        }

        let mut game = Self::with_seed(id, seed);
        for (name, hand) in names.iter().zip(hands) {
            for role in hand {
                game.deck.take(*role)?;
            }
            let id = game.next_player_id;
            game.next_player_id += 1;
            let mut player = Player::new(id, legality::validate_name(name)?, *hand);
            player.ready = true;
            player.host = game.players.is_empty();
            game.players.push(player);
        }
        game.start()?;
        Ok(game)
    }

    // ==================== Queries ====================

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn get_player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    fn player_mut(&mut self, id: PlayerId) -> Result<&mut Player, GameError> {
        self.players
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| GameError::Invariant(format!("player {} is not seated", id)))
    }

    fn seat_of(&self, id: PlayerId) -> Option<usize> {
        self.players.iter().position(|p| p.id == id)
    }

    pub fn player_name(&self, id: PlayerId) -> String {
        self.get_player(id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| format!("Player {}", id))
    }

    pub fn host(&self) -> Option<PlayerId> {
        self.players.iter().find(|p| p.host).map(|p| p.id)
    }

    /// Players who still hold concealed influence
    pub fn live_players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| p.is_alive())
    }

    pub fn is_running(&self) -> bool {
        self.status == GameStatus::Running
    }

    pub fn is_finished(&self) -> bool {
        self.status == GameStatus::Finished
    }

    /// A frozen game hit an internal inconsistency and accepts nothing more
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn deck(&self) -> &Deck {
        &self.deck
    }

    /// Cards offered by an exchange in progress
    pub fn exchange_draw(&self) -> &[Role] {
        &self.exchange_draw
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// The player who owes a reveal in the current turn state, if any
    pub fn owed_reveal(&self) -> Option<PlayerId> {
        match self.turn_state {
            TurnState::Challenged => self.current_player,
            TurnState::ChallengerRevealing => self.turn_challenger,
            TurnState::BlockChallenged => self.turn_blocker,
            TurnState::BlockChallengerRevealing => self.turn_block_challenger,
            TurnState::TargetRevealing => self.turn_target,
            _ => None,
        }
    }

    /// Players whose decision the game is currently waiting on
    pub fn awaiting(&self) -> Vec<PlayerId> {
        if !self.is_running() {
            return Vec::new();
        }

        match self.turn_state {
            TurnState::Start | TurnState::Exchanging => self.current_player.into_iter().collect(),
            TurnState::Attempted => self.outstanding_responders(self.current_player),
            TurnState::Blocked => self.outstanding_responders(self.turn_blocker),
            _ => self.owed_reveal().into_iter().collect(),
        }
    }

    /// Live players, other than `excluded`, who have not accepted yet
    fn outstanding_responders(&self, excluded: Option<PlayerId>) -> Vec<PlayerId> {
        self.live_players()
            .filter(|p| Some(p.id) != excluded && !self.responded.contains(&p.id))
            .map(|p| p.id)
            .collect()
    }

    fn current(&self) -> Result<PlayerId, GameError> {
        self.current_player
            .ok_or_else(|| invariant("running game has no current player"))
    }

    /// Next live seat after `after`, wrapping around the table
    pub fn next_live_player(&self, after: PlayerId) -> Option<PlayerId> {
        let seat = self.seat_of(after)?;
        let count = self.players.len();
        (1..=count)
            .map(|offset| &self.players[(seat + offset) % count])
            .find(|p| p.is_alive())
            .map(|p| p.id)
    }

    // ==================== Seating ====================

    /// Seat a new player in the lobby and deal them a hand.
    ///
    /// The first player seated becomes host. An empty name gets a default
    /// and leaves the player not ready.
    pub fn join(&mut self, name: &str) -> Result<PlayerId, GameError> {
        if self.status != GameStatus::Lobby {
            return Err(GameError::InvalidPhase);
        }
        if self.players.len() >= MAX_PLAYERS {
            return Err(GameError::GameFull);
        }

        let id = self.next_player_id;
        let (name, ready) = if name.trim().is_empty() {
            (format!("Player {}", id + 1), false)
        } else {
            (legality::validate_name(name)?, true)
        };

        let hand = self.deal_hand()?;
        self.next_player_id += 1;

        let mut player = Player::new(id, name, hand);
        player.ready = ready;
        player.host = self.host().is_none();
        self.players.push(player);
        Ok(id)
    }

    /// Record a transport-level connect or disconnect
    pub fn set_connected(&mut self, id: PlayerId, connected: bool) -> Result<(), GameError> {
        let player = self
            .players
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(GameError::UnknownPlayer)?;
        player.connected = connected;
        Ok(())
    }

    fn deal_hand(&mut self) -> Result<[Role; HAND_SIZE], GameError> {
        self.deck
            .deal(HAND_SIZE)?
            .try_into()
            .map_err(|_| invariant("dealt hand has the wrong size"))
    }

    // ==================== Intents ====================

    /// Apply an intent on behalf of a player.
    ///
    /// Returns the events the intent appended. A rejected intent changes
    /// nothing. An internal inconsistency freezes the game.
    pub fn apply_intent(
        &mut self,
        player: PlayerId,
        intent: Intent,
    ) -> Result<Vec<Event>, GameError> {
        if self.frozen {
            return Err(GameError::Frozen);
        }

        legality::check(self, player, &intent)?;

        let first_new = self.events.last_id();
        let outcome = match intent {
            Intent::TakeAction { action, target } => self.take_action(player, action, target),
            Intent::Accept => self.accept(player),
            Intent::Challenge => self.challenge(player),
            Intent::Block { role } => self.block(player, role),
            Intent::ChallengeBlock => self.challenge_block(player),
            Intent::Reveal { slot } => self.reveal(player, slot),
            Intent::Exchange { keep } => self.exchange(player, &keep),
            Intent::SetName { name } => self.set_name(player, &name),
            Intent::StartGame => self.start(),
            Intent::Restart => self.restart(player),
            Intent::Leave => self.leave(player),
        };

        if let Err(err) = outcome {
            // Legality passed, so any failure here means the state is inconsistent
            let err = match err {
                GameError::Invariant(_) => err,
                other => GameError::Invariant(other.to_string()),
            };
            error!(game = %self.id, player, error = %err, "freezing game");
            self.frozen = true;
            return Err(err);
        }

        self.seq += 1;
        debug!(game = %self.id, player, seq = self.seq, state = ?self.turn_state, "intent applied");
        Ok(self.events.since(first_new).to_vec())
    }

    fn record(&mut self, event: GameEvent) {
        let message = event.describe(|id| self.player_name(id));
        self.events.append(event, message);
    }

    /// Move to a new turn state. Accepts never carry over between states.
    fn enter(&mut self, state: TurnState) {
        self.turn_state = state;
        self.responded.clear();
    }

    fn take_action(
        &mut self,
        player: PlayerId,
        action: ActionKind,
        target: Option<PlayerId>,
    ) -> Result<(), GameError> {
        self.player_mut(player)?.spend_coins(action.cost())?;
        self.turn_action = Some(action);
        self.turn_target = target;

        if action == ActionKind::Income {
            return self.resolve_action();
        }

        self.record(GameEvent::ActionDeclared {
            player,
            action,
            target,
        });

        if action.needs_consensus() {
            self.enter(TurnState::Attempted);
            Ok(())
        } else {
            self.resolve_action()
        }
    }

    fn accept(&mut self, player: PlayerId) -> Result<(), GameError> {
        self.responded.insert(player);
        self.settle_consensus()
    }

    /// Resolve the pending action or block once every responder has accepted
    fn settle_consensus(&mut self) -> Result<(), GameError> {
        match self.turn_state {
            TurnState::Attempted => {
                if self.outstanding_responders(self.current_player).is_empty() {
                    self.resolve_action()?;
                }
            }
            TurnState::Blocked => {
                if self.outstanding_responders(self.turn_blocker).is_empty() {
                    self.block_stands()?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn challenge(&mut self, player: PlayerId) -> Result<(), GameError> {
        let actor = self.current()?;
        self.turn_challenger = Some(player);
        self.record(GameEvent::Challenged {
            challenger: player,
            player: actor,
        });
        self.enter(TurnState::Challenged);
        Ok(())
    }

    fn block(&mut self, player: PlayerId, role: Role) -> Result<(), GameError> {
        let actor = self.current()?;
        self.turn_blocker = Some(player);
        self.turn_block_claim = Some(role);
        self.record(GameEvent::Blocked {
            blocker: player,
            player: actor,
            role,
        });
        self.enter(TurnState::Blocked);
        Ok(())
    }

    fn challenge_block(&mut self, player: PlayerId) -> Result<(), GameError> {
        let blocker = self
            .turn_blocker
            .ok_or_else(|| invariant("block challenged without a blocker"))?;
        self.turn_block_challenger = Some(player);
        self.record(GameEvent::BlockChallenged {
            challenger: player,
            blocker,
        });
        self.enter(TurnState::BlockChallenged);
        Ok(())
    }

    fn reveal(&mut self, player: PlayerId, slot: usize) -> Result<(), GameError> {
        let role = self
            .get_player(player)
            .and_then(|p| p.concealed_role(slot))
            .ok_or_else(|| invariant("revealed slot is not concealed"))?;

        match self.turn_state {
            TurnState::Challenged => {
                let claim = self.turn_action.and_then(|a| a.claim());
                if claim == Some(role) {
                    self.prove_claim(player, slot, role)?;
                    // A challenger who already left has nothing left to lose
                    if !self.holds_influence(self.turn_challenger) {
                        return self.resolve_action();
                    }
                    self.enter(TurnState::ChallengerRevealing);
                    Ok(())
                } else {
                    if self.lose_influence(player, slot)? {
                        return Ok(());
                    }
                    self.cancel_action()
                }
            }

            TurnState::ChallengerRevealing => {
                if self.lose_influence(player, slot)? {
                    return Ok(());
                }
                self.resolve_action()
            }

            TurnState::BlockChallenged => {
                if self.turn_block_claim == Some(role) {
                    self.prove_claim(player, slot, role)?;
                    if !self.holds_influence(self.turn_block_challenger) {
                        return self.block_stands();
                    }
                    self.enter(TurnState::BlockChallengerRevealing);
                    Ok(())
                } else {
                    if self.lose_influence(player, slot)? {
                        return Ok(());
                    }
                    self.resolve_action()
                }
            }

            TurnState::BlockChallengerRevealing => {
                if self.lose_influence(player, slot)? {
                    return Ok(());
                }
                self.block_stands()
            }

            TurnState::TargetRevealing => {
                if self.lose_influence(player, slot)? {
                    return Ok(());
                }
                self.end_turn()
            }

            _ => Err(invariant("reveal outside a revealing state")),
        }
    }

    fn holds_influence(&self, player: Option<PlayerId>) -> bool {
        player
            .and_then(|id| self.get_player(id))
            .map_or(false, |p| p.is_alive())
    }

    /// Show a card to prove a claim, then shuffle it back and draw a new one
    fn prove_claim(&mut self, player: PlayerId, slot: usize, role: Role) -> Result<(), GameError> {
        self.record(GameEvent::Revealed {
            player,
            role,
            lost: false,
        });
        self.deck.return_and_reshuffle([role]);
        let replacement = self.deck.deal_one()?;
        self.player_mut(player)?.replace(slot, replacement)?;
        self.record(GameEvent::CardReplaced { player });
        Ok(())
    }

    /// Spend the card in `slot`. Returns true when this ended the game.
    fn lose_influence(&mut self, player: PlayerId, slot: usize) -> Result<bool, GameError> {
        let role = self.player_mut(player)?.reveal(slot)?;
        self.record(GameEvent::Revealed {
            player,
            role,
            lost: true,
        });
        Ok(self.after_influence_loss(player))
    }

    fn after_influence_loss(&mut self, player: PlayerId) -> bool {
        if self.get_player(player).map_or(false, |p| p.is_eliminated()) {
            self.record(GameEvent::PlayerEliminated { player });
        }
        self.check_winner()
    }

    /// Finish the game if exactly one player has concealed influence left
    fn check_winner(&mut self) -> bool {
        if self.status != GameStatus::Running {
            return self.is_finished();
        }

        let winner = {
            let mut alive = self.live_players();
            match (alive.next(), alive.next()) {
                (Some(winner), None) => winner.id,
                _ => return false,
            }
        };

        if !self.exchange_draw.is_empty() {
            let drawn = std::mem::take(&mut self.exchange_draw);
            self.deck.return_and_reshuffle(drawn);
        }
        self.status = GameStatus::Finished;
        self.winner = Some(winner);
        self.clear_turn();
        self.record(GameEvent::GameWon { player: winner });
        true
    }

    /// Apply the effect of the declared action
    fn resolve_action(&mut self) -> Result<(), GameError> {
        let action = self
            .turn_action
            .ok_or_else(|| invariant("no action to resolve"))?;
        let actor = self.current()?;
        let target = self.turn_target;

        match action {
            ActionKind::Income | ActionKind::ForeignAid | ActionKind::Tax => {
                let coins = action.coins_gained();
                self.player_mut(actor)?.add_coins(coins);
                self.record(GameEvent::ActionResolved {
                    player: actor,
                    action,
                    target: None,
                    coins,
                });
                self.end_turn()
            }

            ActionKind::Steal => {
                let victim = target.ok_or_else(|| invariant("steal without a target"))?;
                let coins = self.player_mut(victim)?.take_coins(action.coins_gained());
                self.player_mut(actor)?.add_coins(coins);
                self.record(GameEvent::ActionResolved {
                    player: actor,
                    action,
                    target,
                    coins,
                });
                self.end_turn()
            }

            ActionKind::Assassinate | ActionKind::Coup => {
                let victim = target.ok_or_else(|| invariant("attack without a target"))?;
                if action == ActionKind::Assassinate {
                    self.record(GameEvent::ActionResolved {
                        player: actor,
                        action,
                        target,
                        coins: 0,
                    });
                }
                let victim_alive = self.get_player(victim).map_or(false, |p| p.is_alive());
                if victim_alive {
                    self.enter(TurnState::TargetRevealing);
                    Ok(())
                } else {
                    self.end_turn()
                }
            }

            ActionKind::Exchange => {
                self.exchange_draw = self.deck.deal(EXCHANGE_DRAW)?;
                self.enter(TurnState::Exchanging);
                Ok(())
            }
        }
    }

    /// The block held: the action is off and the turn is over
    fn block_stands(&mut self) -> Result<(), GameError> {
        let actor = self.current()?;
        let blocker = self
            .turn_blocker
            .ok_or_else(|| invariant("block stands without a blocker"))?;
        self.record(GameEvent::BlockSucceeded {
            blocker,
            player: actor,
        });
        self.cancel_action()
    }

    fn cancel_action(&mut self) -> Result<(), GameError> {
        let actor = self.current()?;
        if let Some(action) = self.turn_action {
            self.record(GameEvent::ActionCancelled {
                player: actor,
                action,
            });
        }
        self.end_turn()
    }

    fn exchange(&mut self, player: PlayerId, keep: &[Role]) -> Result<(), GameError> {
        let mut pool = self
            .get_player(player)
            .map(|p| p.concealed_roles())
            .ok_or(GameError::UnknownPlayer)?;
        pool.extend(self.exchange_draw.drain(..));

        for role in keep {
            let at = pool
                .iter()
                .position(|r| r == role)
                .ok_or_else(|| invariant("kept a role that was not offered"))?;
            pool.swap_remove(at);
        }

        self.player_mut(player)?.set_concealed_roles(keep)?;
        self.deck.return_and_reshuffle(pool);
        self.record(GameEvent::Exchanged { player });
        self.end_turn()
    }

    fn end_turn(&mut self) -> Result<(), GameError> {
        let current = self.current()?;
        let next = self
            .next_live_player(current)
            .ok_or_else(|| invariant("no live player to take the next turn"))?;
        self.clear_turn();
        self.current_player = Some(next);
        self.turn_number += 1;
        Ok(())
    }

    fn clear_turn(&mut self) {
        self.turn_action = None;
        self.turn_target = None;
        self.turn_challenger = None;
        self.turn_blocker = None;
        self.turn_block_claim = None;
        self.turn_block_challenger = None;
        self.enter(TurnState::Start);
    }

    // ==================== Lifecycle ====================

    fn set_name(&mut self, player: PlayerId, name: &str) -> Result<(), GameError> {
        let name = legality::validate_name(name)?;
        let p = self.player_mut(player)?;
        p.name = name;
        p.ready = true;
        Ok(())
    }

    fn start(&mut self) -> Result<(), GameError> {
        let first = self
            .players
            .first()
            .map(|p| p.id)
            .ok_or_else(|| invariant("starting a game with no players"))?;
        self.deck.shuffle();
        self.status = GameStatus::Running;
        self.winner = None;
        self.current_player = Some(first);
        self.turn_number = 1;
        self.clear_turn();
        self.record(GameEvent::GameStarted);
        Ok(())
    }

    fn restart(&mut self, host: PlayerId) -> Result<(), GameError> {
        self.exchange_draw.clear();
        self.deck.rebuild();
        for seat in 0..self.players.len() {
            let hand = self.deal_hand()?;
            let player = &mut self.players[seat];
            player.influence = hand.map(Influence::Concealed);
            player.coins = STARTING_COINS;
        }

        self.status = GameStatus::Lobby;
        self.winner = None;
        self.current_player = None;
        self.turn_number = 0;
        self.clear_turn();
        self.record(GameEvent::GameRestarted { host });
        Ok(())
    }

    fn leave(&mut self, player: PlayerId) -> Result<(), GameError> {
        match self.status {
            GameStatus::Lobby => self.leave_lobby(player),
            GameStatus::Running => self.forfeit(player),
            GameStatus::Finished => Err(GameError::GameOver),
        }
    }

    fn leave_lobby(&mut self, player: PlayerId) -> Result<(), GameError> {
        self.record(GameEvent::PlayerLeft { player });
        let seat = self.seat_of(player).ok_or(GameError::UnknownPlayer)?;
        let leaving = self.players.remove(seat);
        self.deck.return_and_reshuffle(leaving.surrender_cards());
        if leaving.host {
            if let Some(next) = self.players.first_mut() {
                next.host = true;
            }
        }
        Ok(())
    }

    /// A player walks out of a running game: all their influence is spent,
    /// and whatever the turn was waiting on them for resolves against them.
    fn forfeit(&mut self, player: PlayerId) -> Result<(), GameError> {
        let turned = {
            let p = self.player_mut(player)?;
            p.connected = false;
            p.reveal_all()
        };
        self.record(GameEvent::PlayerLeft { player });
        for role in &turned {
            self.record(GameEvent::Revealed {
                player,
                role: *role,
                lost: true,
            });
        }
        if !turned.is_empty() && self.after_influence_loss(player) {
            return Ok(());
        }

        if self.current_player == Some(player) {
            if !self.exchange_draw.is_empty() {
                let drawn = std::mem::take(&mut self.exchange_draw);
                self.deck.return_and_reshuffle(drawn);
            }
            if self.turn_state == TurnState::Start {
                return self.end_turn();
            }
            return self.cancel_action();
        }

        match self.turn_state {
            TurnState::Attempted => self.settle_consensus(),
            TurnState::Blocked if self.turn_blocker == Some(player) => self.resolve_action(),
            TurnState::Blocked => self.settle_consensus(),
            TurnState::ChallengerRevealing if self.turn_challenger == Some(player) => {
                self.resolve_action()
            }
            TurnState::BlockChallenged if self.turn_blocker == Some(player) => {
                self.resolve_action()
            }
            TurnState::BlockChallengerRevealing if self.turn_block_challenger == Some(player) => {
                self.block_stands()
            }
            TurnState::TargetRevealing if self.turn_target == Some(player) => self.end_turn(),
            _ => Ok(()),
        }
    }
}
