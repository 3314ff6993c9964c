//! Automated players.
//!
//! This module provides:
//! - `Bot`: picks intents for a seat, either uniformly at random or by
//!   playing honestly (never claiming a role it does not hold)
//! - `timeout_intents`: the default decisions submitted for players who
//!   take too long

use crate::actions::{ActionKind, Intent};
use crate::game::{Game, GameStatus, TurnState, MUST_COUP_COINS};
use crate::legality::valid_intents;
use crate::player::PlayerId;
use rand::prelude::*;
use serde::{Deserialize, Serialize};

/// How a bot picks its moves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BotMode {
    /// Any legal intent, uniformly at random
    Random,
    /// Never bluffs and never challenges
    Honest,
}

/// A bot player that can decide on intents
pub struct Bot {
    pub player_id: PlayerId,
    pub mode: BotMode,
    rng: StdRng,
}

impl Bot {
    pub fn new(player_id: PlayerId, mode: BotMode) -> Self {
        Self {
            player_id,
            mode,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(player_id: PlayerId, mode: BotMode, seed: u64) -> Self {
        Self {
            player_id,
            mode,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Choose an intent from the ones currently legal for this seat
    pub fn choose_intent(&mut self, game: &Game) -> Option<Intent> {
        let valid = valid_intents(game, self.player_id);
        if valid.is_empty() {
            return None;
        }

        match self.mode {
            BotMode::Random => valid.choose(&mut self.rng).cloned(),
            BotMode::Honest => self.choose_honest(game, &valid),
        }
    }

    fn choose_honest(&mut self, game: &Game, valid: &[Intent]) -> Option<Intent> {
        let me = game.get_player(self.player_id)?;

        match game.turn_state {
            TurnState::Start => {
                let mut options: Vec<&Intent> = valid
                    .iter()
                    .filter(|intent| match intent {
                        Intent::TakeAction { action, target } => {
                            let honest = action.claim().map_or(true, |role| me.holds(role));
                            let worth_it = match (action, target) {
                                (ActionKind::Steal, Some(t)) => {
                                    game.get_player(*t).map_or(false, |p| p.coins > 0)
                                }
                                _ => true,
                            };
                            honest && worth_it
                        }
                        _ => false,
                    })
                    .collect();

                // Spend on attacks first, otherwise grow the purse
                let attacks: Vec<&Intent> = options
                    .iter()
                    .copied()
                    .filter(|intent| {
                        matches!(
                            intent,
                            Intent::TakeAction {
                                action: ActionKind::Coup | ActionKind::Assassinate,
                                ..
                            }
                        )
                    })
                    .collect();
                if !attacks.is_empty() {
                    options = attacks;
                }
                options.choose(&mut self.rng).map(|intent| (*intent).clone())
            }

            TurnState::Attempted => {
                let block = valid.iter().find(|intent| match intent {
                    Intent::Block { role } => me.holds(*role),
                    _ => false,
                });
                block
                    .or_else(|| valid.iter().find(|intent| **intent == Intent::Accept))
                    .cloned()
            }

            TurnState::Challenged | TurnState::BlockChallenged => {
                let claim = if game.turn_state == TurnState::Challenged {
                    game.turn_action.and_then(|a| a.claim())
                } else {
                    game.turn_block_claim
                };
                let proof = me
                    .concealed_slots()
                    .into_iter()
                    .find(|&slot| me.concealed_role(slot) == claim);
                match proof {
                    Some(slot) => Some(Intent::Reveal { slot }),
                    None => valid.first().cloned(),
                }
            }

            TurnState::Exchanging => valid.choose(&mut self.rng).cloned(),

            TurnState::Blocked
            | TurnState::ChallengerRevealing
            | TurnState::BlockChallengerRevealing
            | TurnState::TargetRevealing => valid
                .iter()
                .find(|intent| matches!(intent, Intent::Accept | Intent::Reveal { .. }))
                .or_else(|| valid.first())
                .cloned(),
        }
    }
}

/// Decisions to submit for everyone the game is waiting on when time runs out
pub fn timeout_intents(game: &Game) -> Vec<(PlayerId, Intent)> {
    if game.status != GameStatus::Running || game.is_frozen() {
        return Vec::new();
    }

    game.awaiting()
        .into_iter()
        .filter_map(|player| default_intent(game, player).map(|intent| (player, intent)))
        .collect()
}

fn default_intent(game: &Game, player: PlayerId) -> Option<Intent> {
    let p = game.get_player(player)?;

    match game.turn_state {
        TurnState::Start => {
            if p.coins >= MUST_COUP_COINS {
                let target = game.next_live_player(player)?;
                Some(Intent::targeted(ActionKind::Coup, target))
            } else {
                Some(Intent::action(ActionKind::Income))
            }
        }
        TurnState::Attempted | TurnState::Blocked => Some(Intent::Accept),
        TurnState::Exchanging => Some(Intent::Exchange {
            keep: p.concealed_roles(),
        }),
        _ => p
            .concealed_slots()
            .first()
            .map(|&slot| Intent::Reveal { slot }),
    }
}
