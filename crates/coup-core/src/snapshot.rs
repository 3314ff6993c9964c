//! Serializable views of a game.
//!
//! The public snapshot is safe to send to every client: concealed influence
//! is shown as hidden. A player's own hand (and any cards drawn for their
//! exchange) is only ever sent in that player's [`HandView`].

use crate::actions::ActionKind;
use crate::cards::Role;
use crate::events::Event;
use crate::game::{Game, GameStatus, TurnState};
use crate::player::{Influence, Player, PlayerId};
use serde::{Deserialize, Serialize};

/// An influence slot as everyone sees it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PublicInfluence {
    Hidden,
    Revealed(Role),
}

impl From<Influence> for PublicInfluence {
    fn from(influence: Influence) -> Self {
        match influence {
            Influence::Concealed(_) => PublicInfluence::Hidden,
            Influence::Revealed(role) => PublicInfluence::Revealed(role),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub coins: u32,
    pub influence: Vec<PublicInfluence>,
    pub host: bool,
    pub ready: bool,
    pub connected: bool,
    pub eliminated: bool,
    pub current_turn: bool,
}

impl PlayerView {
    fn of(player: &Player, current: Option<PlayerId>) -> Self {
        Self {
            id: player.id,
            name: player.name.clone(),
            coins: player.coins,
            influence: player.influence.iter().map(|&i| i.into()).collect(),
            host: player.host,
            ready: player.ready,
            connected: player.connected,
            eliminated: player.is_eliminated(),
            current_turn: current == Some(player.id),
        }
    }
}

/// Everything public about a game at one sequence number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub game_id: String,
    pub seq: u64,
    pub status: GameStatus,
    pub players: Vec<PlayerView>,
    pub current_player: Option<PlayerId>,
    pub turn_number: u32,
    pub turn_state: TurnState,
    pub turn_action: Option<ActionKind>,
    pub turn_target: Option<PlayerId>,
    pub turn_challenger: Option<PlayerId>,
    pub turn_blocker: Option<PlayerId>,
    pub turn_block_claim: Option<Role>,
    pub turn_block_challenger: Option<PlayerId>,
    /// Players who accepted in the current turn state
    pub responded: Vec<PlayerId>,
    /// Players the game is waiting on
    pub awaiting: Vec<PlayerId>,
    pub deck_size: usize,
    pub winner: Option<PlayerId>,
    pub last_event_id: u64,
    pub frozen: bool,
}

/// A player's private view of their own cards
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandView {
    pub player: PlayerId,
    pub influence: Vec<Influence>,
    /// Cards drawn for an exchange this player is making
    pub exchange_draw: Vec<Role>,
}

impl Game {
    /// Public snapshot for broadcasting
    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            game_id: self.id.clone(),
            seq: self.seq,
            status: self.status,
            players: self
                .players
                .iter()
                .map(|p| PlayerView::of(p, self.current_player))
                .collect(),
            current_player: self.current_player,
            turn_number: self.turn_number,
            turn_state: self.turn_state,
            turn_action: self.turn_action,
            turn_target: self.turn_target,
            turn_challenger: self.turn_challenger,
            turn_blocker: self.turn_blocker,
            turn_block_claim: self.turn_block_claim,
            turn_block_challenger: self.turn_block_challenger,
            responded: self.responded.iter().copied().collect(),
            awaiting: self.awaiting(),
            deck_size: self.deck().len(),
            winner: self.winner,
            last_event_id: self.events().last_id(),
            frozen: self.is_frozen(),
        }
    }

    /// Private view for one player
    pub fn hand_view(&self, player: PlayerId) -> Option<HandView> {
        let p = self.get_player(player)?;
        let exchanging = self.turn_state == TurnState::Exchanging
            && self.current_player == Some(player);

        Some(HandView {
            player,
            influence: p.influence.to_vec(),
            exchange_draw: if exchanging {
                self.exchange_draw().to_vec()
            } else {
                Vec::new()
            },
        })
    }

    /// Log entries after `after`, for catching up a client
    pub fn events_since(&self, after: u64) -> Vec<Event> {
        self.events().since(after).to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::Intent;

    fn game() -> Game {
        Game::with_hands(
            "snap",
            &["Alice", "Bob"],
            &[[Role::Duke, Role::Captain], [Role::Contessa, Role::Assassin]],
            8,
        )
        .unwrap()
    }

    #[test]
    fn test_snapshot_hides_concealed_cards() {
        let mut game = game();
        game.players[1].reveal(0).unwrap();
        let snapshot = game.snapshot();

        assert_eq!(
            snapshot.players[0].influence,
            vec![PublicInfluence::Hidden, PublicInfluence::Hidden]
        );
        assert_eq!(
            snapshot.players[1].influence,
            vec![
                PublicInfluence::Revealed(Role::Contessa),
                PublicInfluence::Hidden
            ]
        );

        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(!json.contains("Duke"));
        assert!(!json.contains("Assassin"));
    }

    #[test]
    fn test_snapshot_tracks_turn() {
        let mut game = game();
        game.apply_intent(0, Intent::action(ActionKind::Tax))
            .unwrap();
        let snapshot = game.snapshot();

        assert_eq!(snapshot.seq, 1);
        assert_eq!(snapshot.turn_state, TurnState::Attempted);
        assert_eq!(snapshot.turn_action, Some(ActionKind::Tax));
        assert_eq!(snapshot.awaiting, vec![1]);
        assert!(snapshot.players[0].current_turn);
        assert_eq!(snapshot.deck_size, 11);
        assert_eq!(snapshot.last_event_id, 2);
    }

    #[test]
    fn test_hand_view_shows_exchange_draw_to_actor_only() {
        let mut game = game();
        game.apply_intent(0, Intent::action(ActionKind::Exchange))
            .unwrap();
        game.apply_intent(1, Intent::Accept).unwrap();

        let mine = game.hand_view(0).unwrap();
        assert_eq!(mine.exchange_draw.len(), 2);
        assert_eq!(
            mine.influence,
            vec![
                Influence::Concealed(Role::Duke),
                Influence::Concealed(Role::Captain)
            ]
        );

        let theirs = game.hand_view(1).unwrap();
        assert!(theirs.exchange_draw.is_empty());
        assert!(game.hand_view(7).is_none());
    }
}
