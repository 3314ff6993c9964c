//! Intents that players can submit.
//!
//! This module defines the seven turn actions with their claim and block
//! rules, plus every reactive and lifecycle intent the engine accepts.

use crate::cards::Role;
use crate::player::PlayerId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Cost of an assassination, paid when it is declared
pub const ASSASSINATE_COST: u32 = 3;

/// Cost of a coup, paid when it is declared
pub const COUP_COST: u32 = 7;

/// Most coins a single steal can move
pub const STEAL_AMOUNT: u32 = 2;

/// The seven turn-starting actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Income,
    ForeignAid,
    Tax,
    Exchange,
    Steal,
    Assassinate,
    Coup,
}

impl ActionKind {
    pub const ALL: [ActionKind; 7] = [
        ActionKind::Income,
        ActionKind::ForeignAid,
        ActionKind::Tax,
        ActionKind::Exchange,
        ActionKind::Steal,
        ActionKind::Assassinate,
        ActionKind::Coup,
    ];

    /// Role the actor claims by taking this action
    pub fn claim(&self) -> Option<Role> {
        match self {
            ActionKind::Tax => Some(Role::Duke),
            ActionKind::Exchange => Some(Role::Ambassador),
            ActionKind::Steal => Some(Role::Captain),
            ActionKind::Assassinate => Some(Role::Assassin),
            ActionKind::Income | ActionKind::ForeignAid | ActionKind::Coup => None,
        }
    }

    /// Only claim-bearing actions can be challenged
    pub fn is_challengeable(&self) -> bool {
        self.claim().is_some()
    }

    /// Roles that can be claimed to block this action
    pub fn blockable_by(&self) -> &'static [Role] {
        match self {
            ActionKind::ForeignAid => &[Role::Duke],
            ActionKind::Steal => &[Role::Captain, Role::Ambassador],
            ActionKind::Assassinate => &[Role::Contessa],
            _ => &[],
        }
    }

    pub fn is_blockable(&self) -> bool {
        !self.blockable_by().is_empty()
    }

    pub fn is_targeted(&self) -> bool {
        matches!(
            self,
            ActionKind::Steal | ActionKind::Assassinate | ActionKind::Coup
        )
    }

    /// Coins paid up front when declaring the action
    pub fn cost(&self) -> u32 {
        match self {
            ActionKind::Assassinate => ASSASSINATE_COST,
            ActionKind::Coup => COUP_COST,
            _ => 0,
        }
    }

    /// Coins the actor gains when the action resolves (the most, for a steal)
    pub fn coins_gained(&self) -> u32 {
        match self {
            ActionKind::Income => 1,
            ActionKind::ForeignAid => 2,
            ActionKind::Tax => 3,
            ActionKind::Steal => STEAL_AMOUNT,
            _ => 0,
        }
    }

    /// Whether other players get a chance to respond before it resolves
    pub fn needs_consensus(&self) -> bool {
        self.is_challengeable() || self.is_blockable()
    }

    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::Income => "income",
            ActionKind::ForeignAid => "foreign aid",
            ActionKind::Tax => "tax",
            ActionKind::Exchange => "exchange",
            ActionKind::Steal => "steal",
            ActionKind::Assassinate => "assassination",
            ActionKind::Coup => "coup",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything a player can ask the engine to do
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intent {
    // ==================== Turn Actions ====================
    /// Declare the action for this turn
    TakeAction {
        action: ActionKind,
        target: Option<PlayerId>,
    },

    // ==================== Reactions ====================
    /// Let the pending action (or block) stand
    Accept,
    /// Dispute the actor's claim
    Challenge,
    /// Counter-claim a role that blocks the pending action
    Block { role: Role },
    /// Dispute the blocker's claim
    ChallengeBlock,
    /// Turn over (or show) the card in a concealed slot
    Reveal { slot: usize },
    /// Finish an exchange, keeping these roles
    Exchange { keep: Vec<Role> },

    // ==================== Lifecycle ====================
    /// Pick a display name, which also marks the player ready
    SetName { name: String },
    /// Host starts the game from the lobby
    StartGame,
    /// Host sends a finished game back to the lobby
    Restart,
    /// Leave the lobby, or forfeit a running game
    Leave,
}

impl Intent {
    /// Shorthand for a targetless turn action
    pub fn action(action: ActionKind) -> Self {
        Intent::TakeAction {
            action,
            target: None,
        }
    }

    /// Shorthand for a targeted turn action
    pub fn targeted(action: ActionKind, target: PlayerId) -> Self {
        Intent::TakeAction {
            action,
            target: Some(target),
        }
    }

    /// Intents that only make sense while a game is running
    pub fn requires_running(&self) -> bool {
        matches!(
            self,
            Intent::TakeAction { .. }
                | Intent::Accept
                | Intent::Challenge
                | Intent::Block { .. }
                | Intent::ChallengeBlock
                | Intent::Reveal { .. }
                | Intent::Exchange { .. }
        )
    }
}

/// An intent as it arrives at the boundary, with deduplication metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentEnvelope {
    /// Client-chosen id; a replayed id is answered without re-applying
    #[serde(default)]
    pub intent_id: Option<u64>,
    /// Sequence number the client last saw; a mismatch is stale
    #[serde(default)]
    pub expected_seq: Option<u64>,
    pub intent: Intent,
}

impl From<Intent> for IntentEnvelope {
    fn from(intent: Intent) -> Self {
        Self {
            intent_id: None,
            expected_seq: None,
            intent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims() {
        assert_eq!(ActionKind::Income.claim(), None);
        assert_eq!(ActionKind::ForeignAid.claim(), None);
        assert_eq!(ActionKind::Tax.claim(), Some(Role::Duke));
        assert_eq!(ActionKind::Exchange.claim(), Some(Role::Ambassador));
        assert_eq!(ActionKind::Steal.claim(), Some(Role::Captain));
        assert_eq!(ActionKind::Assassinate.claim(), Some(Role::Assassin));
        assert_eq!(ActionKind::Coup.claim(), None);
    }

    #[test]
    fn test_blockers() {
        assert_eq!(ActionKind::ForeignAid.blockable_by(), &[Role::Duke]);
        assert_eq!(
            ActionKind::Steal.blockable_by(),
            &[Role::Captain, Role::Ambassador]
        );
        assert_eq!(ActionKind::Assassinate.blockable_by(), &[Role::Contessa]);
        for kind in [
            ActionKind::Income,
            ActionKind::Tax,
            ActionKind::Exchange,
            ActionKind::Coup,
        ] {
            assert!(!kind.is_blockable(), "{} should not be blockable", kind);
        }
    }

    #[test]
    fn test_only_income_and_coup_skip_consensus() {
        let instant: Vec<ActionKind> = ActionKind::ALL
            .into_iter()
            .filter(|k| !k.needs_consensus())
            .collect();
        assert_eq!(instant, vec![ActionKind::Income, ActionKind::Coup]);
    }

    #[test]
    fn test_envelope_defaults_when_metadata_missing() {
        let json = r#"{"intent":"Accept"}"#;
        let envelope: IntentEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope, IntentEnvelope::from(Intent::Accept));
    }
}
