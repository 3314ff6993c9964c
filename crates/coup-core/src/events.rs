//! Append-only event log.
//!
//! Every accepted transition appends one or more entries here. Entries are
//! never changed or removed; their order is the game's history.

use crate::actions::ActionKind;
use crate::cards::Role;
use crate::player::PlayerId;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Something that happened in the game
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEvent {
    /// The host started the game
    GameStarted,

    /// An action was declared (and, if it needs consensus, is now pending)
    ActionDeclared {
        player: PlayerId,
        action: ActionKind,
        target: Option<PlayerId>,
    },

    /// An action took effect
    ActionResolved {
        player: PlayerId,
        action: ActionKind,
        target: Option<PlayerId>,
        /// Coins gained by the actor, if any
        coins: u32,
    },

    /// An action was called off by a lost challenge or a standing block
    ActionCancelled { player: PlayerId, action: ActionKind },

    /// A claim was challenged
    Challenged {
        challenger: PlayerId,
        player: PlayerId,
    },

    /// A block was declared
    Blocked {
        blocker: PlayerId,
        player: PlayerId,
        role: Role,
    },

    /// A block was challenged
    BlockChallenged {
        challenger: PlayerId,
        blocker: PlayerId,
    },

    /// Everyone let a block stand, or it survived a challenge
    BlockSucceeded {
        blocker: PlayerId,
        player: PlayerId,
    },

    /// A card was shown, either spent (`lost`) or as proof of a claim
    Revealed {
        player: PlayerId,
        role: Role,
        lost: bool,
    },

    /// A proven card went back into the deck and a new one was drawn
    CardReplaced { player: PlayerId },

    /// An exchange finished
    Exchanged { player: PlayerId },

    /// A player has no concealed influence left
    PlayerEliminated { player: PlayerId },

    /// A player left the game
    PlayerLeft { player: PlayerId },

    /// Only one player is left standing
    GameWon { player: PlayerId },

    /// The host sent the game back to the lobby
    GameRestarted { host: PlayerId },
}

impl GameEvent {
    /// Human-readable message, given a way to name players
    pub fn describe<F>(&self, name_of: F) -> String
    where
        F: Fn(PlayerId) -> String,
    {
        let target_name = |target: &Option<PlayerId>| {
            target.map(&name_of).unwrap_or_else(|| "nobody".to_string())
        };

        match self {
            GameEvent::GameStarted => "Welcome to Coup!".to_string(),

            GameEvent::ActionDeclared {
                player,
                action,
                target,
            } => {
                let p = name_of(*player);
                match action {
                    ActionKind::Income => format!("{} takes income", p),
                    ActionKind::ForeignAid => format!("{} attempts to take foreign aid", p),
                    ActionKind::Tax => format!("{} attempts to collect tax", p),
                    ActionKind::Exchange => format!("{} attempts to exchange", p),
                    ActionKind::Steal => {
                        format!("{} attempts to steal from {}", p, target_name(target))
                    }
                    ActionKind::Assassinate => {
                        format!("{} attempts to assassinate {}", p, target_name(target))
                    }
                    ActionKind::Coup => {
                        format!("{} launches a coup against {}", p, target_name(target))
                    }
                }
            }

            GameEvent::ActionResolved {
                player,
                action,
                target,
                ..
            } => {
                let p = name_of(*player);
                match action {
                    ActionKind::Income => format!("{} takes income", p),
                    ActionKind::ForeignAid => format!("{} takes foreign aid", p),
                    ActionKind::Tax => format!("{} collects tax", p),
                    ActionKind::Exchange => format!("{} exchanges", p),
                    ActionKind::Steal => format!("{} steals from {}", p, target_name(target)),
                    ActionKind::Assassinate => {
                        format!("{} assassinates {}", p, target_name(target))
                    }
                    ActionKind::Coup => format!("{} overthrows {}", p, target_name(target)),
                }
            }

            GameEvent::ActionCancelled { player, action } => {
                format!("{}'s {} was cancelled", name_of(*player), action)
            }

            GameEvent::Challenged { challenger, player } => {
                format!("{} challenges {}", name_of(*challenger), name_of(*player))
            }

            GameEvent::Blocked {
                blocker,
                player,
                role,
            } => format!(
                "{} blocks {} with {}",
                name_of(*blocker),
                name_of(*player),
                role
            ),

            GameEvent::BlockChallenged {
                challenger,
                blocker,
            } => format!("{} challenged {}", name_of(*challenger), name_of(*blocker)),

            GameEvent::BlockSucceeded { blocker, player } => format!(
                "{} successfully blocked {}",
                name_of(*blocker),
                name_of(*player)
            ),

            GameEvent::Revealed { player, role, .. } => {
                format!("{} revealed {} {}", name_of(*player), role.article(), role)
            }

            GameEvent::CardReplaced { player } => {
                format!("{} draws a replacement card", name_of(*player))
            }

            GameEvent::Exchanged { player } => {
                format!("{} returns 2 cards to the deck", name_of(*player))
            }

            GameEvent::PlayerEliminated { player } => {
                format!("{} is out of the game!", name_of(*player))
            }

            GameEvent::PlayerLeft { player } => format!("{} left the game", name_of(*player)),

            GameEvent::GameWon { player } => format!("{} wins the game!", name_of(*player)),

            GameEvent::GameRestarted { host } => {
                format!("{} has restarted the game", name_of(*host))
            }
        }
    }
}

/// A log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Position in the log, starting at 1
    pub id: u64,
    /// Milliseconds since the Unix epoch
    pub timestamp: u64,
    pub message: String,
    pub event: GameEvent,
}

/// The ordered history of a game
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventLog {
    entries: Vec<Event>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry and return its id
    pub fn append(&mut self, event: GameEvent, message: String) -> u64 {
        let id = self.last_id() + 1;
        self.entries.push(Event {
            id,
            timestamp: now_millis(),
            message,
            event,
        });
        id
    }

    pub fn entries(&self) -> &[Event] {
        &self.entries
    }

    /// Entries appended after the entry with id `after`
    pub fn since(&self, after: u64) -> &[Event] {
        let start = (after as usize).min(self.entries.len());
        &self.entries[start..]
    }

    /// Id of the newest entry, or 0 when empty
    pub fn last_id(&self) -> u64 {
        self.entries.len() as u64
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
