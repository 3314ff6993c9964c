//! Character cards and the court deck.
//!
//! This module contains:
//! - The five character roles and what each one lets a player claim
//! - The shuffled court deck, which owns card identity for a game
//!
//! Every card that leaves the deck ends up in exactly one influence slot
//! (or in an in-flight exchange) and every card that comes back is
//! reshuffled before anything else is dealt. The deck never creates or
//! destroys cards: the 15-card multiset is conserved for the whole life
//! of a game.

use crate::game::GameError;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Copies of each role in the court deck
pub const COPIES_PER_ROLE: usize = 3;

/// Total cards in a court deck
pub const DECK_SIZE: usize = COPIES_PER_ROLE * Role::ALL.len();

/// Character roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Collects tax, blocks foreign aid
    Duke,
    /// Pays 3 coins to assassinate
    Assassin,
    /// Steals 2 coins, blocks stealing
    Captain,
    /// Exchanges cards with the deck, blocks stealing
    Ambassador,
    /// Blocks assassination
    Contessa,
}

impl Role {
    /// All roles, in deck order
    pub const ALL: [Role; 5] = [
        Role::Duke,
        Role::Assassin,
        Role::Captain,
        Role::Ambassador,
        Role::Contessa,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Role::Duke => "Duke",
            Role::Assassin => "Assassin",
            Role::Captain => "Captain",
            Role::Ambassador => "Ambassador",
            Role::Contessa => "Contessa",
        }
    }

    /// Indefinite article for the role name
    pub fn article(&self) -> &'static str {
        match self {
            Role::Assassin | Role::Ambassador => "an",
            Role::Duke | Role::Captain | Role::Contessa => "a",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The court deck
#[derive(Clone)]
pub struct Deck {
    cards: Vec<Role>,
    rng: StdRng,
}

impl fmt::Debug for Deck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deck").field("len", &self.cards.len()).finish()
    }
}

impl Deck {
    /// Create the standard 15-card deck, shuffled with the given seed
    pub fn standard(seed: u64) -> Self {
        let mut deck = Self {
            cards: Vec::with_capacity(DECK_SIZE),
            rng: StdRng::seed_from_u64(seed),
        };
        deck.rebuild();
        deck
    }

    /// Throw away the current contents and restore a full shuffled deck.
    ///
    /// Only valid when every dealt card has been taken back from the players.
    pub fn rebuild(&mut self) {
        self.cards.clear();
        for role in Role::ALL {
            self.cards
                .extend(std::iter::repeat(role).take(COPIES_PER_ROLE));
        }
        self.shuffle();
    }

    pub fn shuffle(&mut self) {
        self.cards.shuffle(&mut self.rng);
    }

    /// Remove `n` cards from the top of the deck
    pub fn deal(&mut self, n: usize) -> Result<Vec<Role>, GameError> {
        if n > self.cards.len() {
            return Err(GameError::Invariant(format!(
                "cannot deal {} cards from a deck of {}",
                n,
                self.cards.len()
            )));
        }
        let at = self.cards.len() - n;
        Ok(self.cards.split_off(at))
    }

    /// Remove a single card from the top of the deck
    pub fn deal_one(&mut self) -> Result<Role, GameError> {
        self.cards
            .pop()
            .ok_or_else(|| GameError::Invariant("cannot deal from an empty deck".into()))
    }

    /// Pull one specific card out of the deck
    pub fn take(&mut self, role: Role) -> Result<Role, GameError> {
        let at = self
            .cards
            .iter()
            .position(|&r| r == role)
            .ok_or_else(|| GameError::Invariant(format!("no {} left in the deck", role)))?;
        Ok(self.cards.remove(at))
    }

    /// Put cards back and reshuffle before anything else is dealt
    pub fn return_and_reshuffle<I>(&mut self, cards: I)
    where
        I: IntoIterator<Item = Role>,
    {
        self.cards.extend(cards);
        self.shuffle();
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Number of copies of a role still in the deck
    pub fn count(&self, role: Role) -> usize {
        self.cards.iter().filter(|&&r| r == role).count()
    }

    /// Deck contents, top of the deck last
    pub fn cards(&self) -> &[Role] {
        &self.cards
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_deck_composition() {
        let deck = Deck::standard(7);
        assert_eq!(deck.len(), DECK_SIZE);
        for role in Role::ALL {
            assert_eq!(deck.count(role), COPIES_PER_ROLE);
        }
    }

    #[test]
    fn test_same_seed_same_order() {
        let a = Deck::standard(42);
        let b = Deck::standard(42);
        assert_eq!(a.cards(), b.cards());
    }

    #[test]
    fn test_deal_takes_from_top() {
        let mut deck = Deck::standard(1);
        let top: Vec<Role> = deck.cards()[DECK_SIZE - 2..].to_vec();
        let dealt = deck.deal(2).unwrap();
        assert_eq!(dealt, top);
        assert_eq!(deck.len(), DECK_SIZE - 2);
    }

    #[test]
    fn test_deal_too_many_is_invariant_violation() {
        let mut deck = Deck::standard(1);
        deck.deal(DECK_SIZE).unwrap();
        assert!(matches!(deck.deal(1), Err(GameError::Invariant(_))));
        assert!(matches!(deck.deal_one(), Err(GameError::Invariant(_))));
    }

    #[test]
    fn test_return_conserves_cards() {
        let mut deck = Deck::standard(3);
        let hand = deck.deal(4).unwrap();
        deck.return_and_reshuffle(hand);
        assert_eq!(deck.len(), DECK_SIZE);
        for role in Role::ALL {
            assert_eq!(deck.count(role), COPIES_PER_ROLE);
        }
    }

    #[test]
    fn test_take_specific_card() {
        let mut deck = Deck::standard(5);
        for _ in 0..COPIES_PER_ROLE {
            assert_eq!(deck.take(Role::Duke).unwrap(), Role::Duke);
        }
        assert_eq!(deck.count(Role::Duke), 0);
        assert!(deck.take(Role::Duke).is_err());
    }

    #[test]
    fn test_rebuild_restores_full_deck() {
        let mut deck = Deck::standard(9);
        deck.deal(10).unwrap();
        deck.rebuild();
        assert_eq!(deck.len(), DECK_SIZE);
        assert_eq!(deck.count(Role::Contessa), COPIES_PER_ROLE);
    }
}
