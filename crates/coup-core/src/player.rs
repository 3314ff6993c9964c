//! Player state: coins, influence slots and seat flags.

use crate::cards::Role;
use crate::game::GameError;
use serde::{Deserialize, Serialize};

/// Stable player identifier, unique within a game
pub type PlayerId = u32;

/// Coins every player starts with
pub const STARTING_COINS: u32 = 2;

/// Influence slots per player
pub const HAND_SIZE: usize = 2;

/// One influence slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Influence {
    /// Hidden from everyone but the owner
    Concealed(Role),
    /// Face up and spent for good
    Revealed(Role),
}

impl Influence {
    pub fn role(&self) -> Role {
        match *self {
            Influence::Concealed(role) | Influence::Revealed(role) => role,
        }
    }

    pub fn is_concealed(&self) -> bool {
        matches!(self, Influence::Concealed(_))
    }
}

/// A seated player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub coins: u32,
    pub influence: [Influence; HAND_SIZE],
    /// Exactly one player per game is host
    pub host: bool,
    /// Set once the player has chosen a name
    pub ready: bool,
    pub connected: bool,
}

impl Player {
    pub fn new(id: PlayerId, name: String, hand: [Role; HAND_SIZE]) -> Self {
        Self {
            id,
            name,
            coins: STARTING_COINS,
            influence: hand.map(Influence::Concealed),
            host: false,
            ready: false,
            connected: true,
        }
    }

    /// Number of influence slots still concealed
    pub fn concealed_count(&self) -> usize {
        self.influence.iter().filter(|i| i.is_concealed()).count()
    }

    /// A player with no concealed influence is out of the game
    pub fn is_eliminated(&self) -> bool {
        self.concealed_count() == 0
    }

    pub fn is_alive(&self) -> bool {
        !self.is_eliminated()
    }

    /// Roles in concealed slots, in slot order
    pub fn concealed_roles(&self) -> Vec<Role> {
        self.influence
            .iter()
            .filter_map(|i| match i {
                Influence::Concealed(role) => Some(*role),
                Influence::Revealed(_) => None,
            })
            .collect()
    }

    /// Indices of concealed slots
    pub fn concealed_slots(&self) -> Vec<usize> {
        (0..HAND_SIZE)
            .filter(|&slot| self.influence[slot].is_concealed())
            .collect()
    }

    /// Whether the player really holds a role (concealed)
    pub fn holds(&self, role: Role) -> bool {
        self.influence
            .iter()
            .any(|i| *i == Influence::Concealed(role))
    }

    /// Role in a concealed slot, if the slot exists and is concealed
    pub fn concealed_role(&self, slot: usize) -> Option<Role> {
        match self.influence.get(slot) {
            Some(Influence::Concealed(role)) => Some(*role),
            _ => None,
        }
    }

    /// Turn a concealed slot face up. Revealing is permanent.
    pub fn reveal(&mut self, slot: usize) -> Result<Role, GameError> {
        let role = self.concealed_role(slot).ok_or_else(|| {
            GameError::Invariant(format!(
                "player {} slot {} is not concealed",
                self.id, slot
            ))
        })?;
        self.influence[slot] = Influence::Revealed(role);
        Ok(role)
    }

    /// Reveal every concealed slot, returning the roles that were turned
    pub fn reveal_all(&mut self) -> Vec<Role> {
        let mut turned = Vec::new();
        for slot in self.influence.iter_mut() {
            if let Influence::Concealed(role) = *slot {
                *slot = Influence::Revealed(role);
                turned.push(role);
            }
        }
        turned
    }

    /// Swap the card in a concealed slot for another, returning the old card.
    pub fn replace(&mut self, slot: usize, role: Role) -> Result<Role, GameError> {
        let old = self.concealed_role(slot).ok_or_else(|| {
            GameError::Invariant(format!(
                "player {} slot {} cannot be replaced",
                self.id, slot
            ))
        })?;
        self.influence[slot] = Influence::Concealed(role);
        Ok(old)
    }

    /// Refill the concealed slots, in slot order, from `roles`.
    pub fn set_concealed_roles(&mut self, roles: &[Role]) -> Result<(), GameError> {
        let slots = self.concealed_slots();
        if slots.len() != roles.len() {
            return Err(GameError::Invariant(format!(
                "player {} has {} concealed slots, got {} roles",
                self.id,
                slots.len(),
                roles.len()
            )));
        }
        for (slot, role) in slots.into_iter().zip(roles) {
            self.influence[slot] = Influence::Concealed(*role);
        }
        Ok(())
    }

    /// Give back every card, concealed or not. Used when a player leaves the lobby.
    pub fn surrender_cards(&self) -> [Role; HAND_SIZE] {
        self.influence.map(|i| i.role())
    }

    pub fn add_coins(&mut self, amount: u32) {
        self.coins += amount;
    }

    /// Pay a cost in full or not at all
    pub fn spend_coins(&mut self, amount: u32) -> Result<(), GameError> {
        if self.coins < amount {
            return Err(GameError::CannotAfford);
        }
        self.coins -= amount;
        Ok(())
    }

    /// Take up to `max` coins, returning how many were actually taken
    pub fn take_coins(&mut self, max: u32) -> u32 {
        let taken = self.coins.min(max);
        self.coins -= taken;
        taken
    }
}
