//! Coup - an authoritative rules engine for the card game of bluffing
//!
//! This crate provides the core game logic, including:
//! - The court deck and the five character roles
//! - Player state: coins and two influence slots
//! - The turn state machine for actions, challenges, blocks and reveals
//! - Legality checks that reject bad intents without touching state
//! - An append-only event log and serializable snapshots
//!
//! # Architecture
//!
//! The engine is synchronous and performs no I/O. A host (see the
//! `coup-server` crate) owns each [`Game`], feeds it one intent at a time
//! and broadcasts the resulting [`GameSnapshot`].
//!
//! # Modules
//!
//! - [`cards`]: Roles and the deck
//! - [`player`]: Player state and influence
//! - [`actions`]: Action table and intents
//! - [`legality`]: Intent validation
//! - [`events`]: Event log
//! - [`game`]: Game state machine
//! - [`snapshot`]: Public and private views
//! - [`bot`]: Bots and timeout defaults

pub mod actions;
pub mod bot;
pub mod cards;
pub mod events;
pub mod game;
pub mod legality;
pub mod player;
pub mod snapshot;

// Re-export commonly used types
pub use actions::{ActionKind, Intent, IntentEnvelope};
pub use bot::{timeout_intents, Bot, BotMode};
pub use cards::{Deck, Role};
pub use events::{Event, EventLog, GameEvent};
pub use game::{ErrorKind, Game, GameError, GameStatus, TurnState};
pub use legality::{valid_intents, Legal};
pub use player::{Influence, Player, PlayerId};
pub use snapshot::{GameSnapshot, HandView, PlayerView, PublicInfluence};
