//! Legality checks for intents.
//!
//! Nothing in here mutates the game. [`check`] decides whether an intent may
//! be applied in the current state and which role (if any) it claims.
//! [`valid_intents`] lists every move a player could make right now.

use crate::actions::{ActionKind, Intent};
use crate::cards::Role;
use crate::game::{
    Game, GameError, GameStatus, TurnState, MAX_NAME_LEN, MAX_PLAYERS, MIN_PLAYERS,
    MUST_COUP_COINS,
};
use crate::player::{Player, PlayerId};

/// An intent that passed validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Legal {
    /// Role the intent asserts the player holds
    pub claim: Option<Role>,
}

impl Legal {
    fn unclaimed() -> Self {
        Self { claim: None }
    }

    fn claiming(claim: Option<Role>) -> Self {
        Self { claim }
    }
}

/// Trim a display name and check its length
pub fn validate_name(name: &str) -> Result<String, GameError> {
    let name = name.trim();
    let len = name.chars().count();
    if len == 0 || len > MAX_NAME_LEN {
        return Err(GameError::InvalidName);
    }
    Ok(name.to_string())
}

/// Decide whether `player` may submit `intent` right now
pub fn check(game: &Game, player: PlayerId, intent: &Intent) -> Result<Legal, GameError> {
    let actor = game.get_player(player).ok_or(GameError::UnknownPlayer)?;

    match intent {
        Intent::SetName { name } => {
            validate_name(name)?;
            Ok(Legal::unclaimed())
        }

        Intent::StartGame => {
            if game.status != GameStatus::Lobby {
                return Err(GameError::InvalidPhase);
            }
            if !actor.host {
                return Err(GameError::NotHost);
            }
            if game.player_count() < MIN_PLAYERS {
                return Err(GameError::NotEnoughPlayers);
            }
            if game.player_count() > MAX_PLAYERS {
                return Err(GameError::GameFull);
            }
            Ok(Legal::unclaimed())
        }

        Intent::Restart => {
            if !actor.host {
                return Err(GameError::NotHost);
            }
            if game.status != GameStatus::Finished {
                return Err(GameError::InvalidPhase);
            }
            Ok(Legal::unclaimed())
        }

        Intent::Leave => match game.status {
            GameStatus::Finished => Err(GameError::GameOver),
            _ => Ok(Legal::unclaimed()),
        },

        _ => match game.status {
            GameStatus::Lobby => Err(GameError::GameNotRunning),
            GameStatus::Finished => Err(GameError::GameOver),
            GameStatus::Running => check_running(game, actor, intent),
        },
    }
}

fn check_running(game: &Game, actor: &Player, intent: &Intent) -> Result<Legal, GameError> {
    if actor.is_eliminated() {
        return Err(GameError::NotEligible);
    }
    let is_current = game.current_player == Some(actor.id);

    match intent {
        Intent::TakeAction { action, target } => {
            if !is_current {
                return Err(GameError::NotYourTurn);
            }
            if game.turn_state != TurnState::Start {
                return Err(GameError::InvalidPhase);
            }
            if actor.coins >= MUST_COUP_COINS && *action != ActionKind::Coup {
                return Err(GameError::MustCoup);
            }
            if actor.coins < action.cost() {
                return Err(GameError::CannotAfford);
            }
            check_target(game, actor, *action, *target)?;
            Ok(Legal::claiming(action.claim()))
        }

        Intent::Accept => {
            let excluded = match game.turn_state {
                TurnState::Attempted => game.current_player,
                TurnState::Blocked => game.turn_blocker,
                _ => return Err(GameError::InvalidPhase),
            };
            check_responder(game, actor, excluded)?;
            Ok(Legal::unclaimed())
        }

        Intent::Challenge => {
            if game.turn_state != TurnState::Attempted {
                return Err(GameError::InvalidPhase);
            }
            check_responder(game, actor, game.current_player)?;
            let action = pending_action(game)?;
            if !action.is_challengeable() {
                return Err(GameError::NotClaimable);
            }
            Ok(Legal::unclaimed())
        }

        Intent::Block { role } => {
            if game.turn_state != TurnState::Attempted {
                return Err(GameError::InvalidPhase);
            }
            check_responder(game, actor, game.current_player)?;
            let action = pending_action(game)?;
            if !action.blockable_by().contains(role) {
                return Err(GameError::NotBlockable);
            }
            if action.is_targeted() && game.turn_target != Some(actor.id) {
                return Err(GameError::NotEligible);
            }
            Ok(Legal::claiming(Some(*role)))
        }

        Intent::ChallengeBlock => {
            if game.turn_state != TurnState::Blocked {
                return Err(GameError::InvalidPhase);
            }
            check_responder(game, actor, game.turn_blocker)?;
            Ok(Legal::unclaimed())
        }

        Intent::Reveal { slot } => {
            let owed = game.owed_reveal().ok_or(GameError::InvalidPhase)?;
            if owed != actor.id {
                return Err(GameError::NotEligible);
            }
            if actor.concealed_role(*slot).is_none() {
                return Err(GameError::InvalidReveal);
            }
            Ok(Legal::unclaimed())
        }

        Intent::Exchange { keep } => {
            if game.turn_state != TurnState::Exchanging {
                return Err(GameError::InvalidPhase);
            }
            if !is_current {
                return Err(GameError::NotYourTurn);
            }
            check_exchange(game, actor, keep)?;
            Ok(Legal::unclaimed())
        }

        Intent::SetName { .. } | Intent::StartGame | Intent::Restart | Intent::Leave => {
            Ok(Legal::unclaimed())
        }
    }
}

fn pending_action(game: &Game) -> Result<ActionKind, GameError> {
    game.turn_action
        .ok_or_else(|| GameError::Invariant("responding with no pending action".into()))
}

/// Anyone live other than `excluded` who has not accepted yet
fn check_responder(
    game: &Game,
    actor: &Player,
    excluded: Option<PlayerId>,
) -> Result<(), GameError> {
    if excluded == Some(actor.id) {
        return Err(GameError::NotEligible);
    }
    if game.responded.contains(&actor.id) {
        return Err(GameError::AlreadyResponded);
    }
    Ok(())
}

fn check_target(
    game: &Game,
    actor: &Player,
    action: ActionKind,
    target: Option<PlayerId>,
) -> Result<(), GameError> {
    match (action.is_targeted(), target) {
        (false, None) => Ok(()),
        (true, Some(target)) if target != actor.id => {
            let alive = game.get_player(target).map_or(false, |p| p.is_alive());
            if alive {
                Ok(())
            } else {
                Err(GameError::InvalidTarget)
            }
        }
        _ => Err(GameError::InvalidTarget),
    }
}

/// The kept roles must come out of hand plus draw and fill every concealed slot
fn check_exchange(game: &Game, actor: &Player, keep: &[Role]) -> Result<(), GameError> {
    if keep.len() != actor.concealed_count() {
        return Err(GameError::InvalidExchange);
    }

    let mut pool = actor.concealed_roles();
    pool.extend_from_slice(game.exchange_draw());
    for role in keep {
        match pool.iter().position(|r| r == role) {
            Some(at) => {
                pool.swap_remove(at);
            }
            None => return Err(GameError::InvalidExchange),
        }
    }
    Ok(())
}

/// Every intent `player` could legally submit right now.
///
/// Name changes and leaving are always open and are not listed.
pub fn valid_intents(game: &Game, player: PlayerId) -> Vec<Intent> {
    let Some(actor) = game.get_player(player) else {
        return Vec::new();
    };

    let mut candidates = vec![Intent::StartGame, Intent::Restart];

    if game.is_running() {
        for action in ActionKind::ALL {
            if action.is_targeted() {
                for other in &game.players {
                    candidates.push(Intent::targeted(action, other.id));
                }
            } else {
                candidates.push(Intent::action(action));
            }
        }

        candidates.push(Intent::Accept);
        candidates.push(Intent::Challenge);
        candidates.extend(Role::ALL.into_iter().map(|role| Intent::Block { role }));
        candidates.push(Intent::ChallengeBlock);
        candidates.extend(actor.concealed_slots().into_iter().map(|slot| Intent::Reveal { slot }));

        if game.turn_state == TurnState::Exchanging {
            let mut pool = actor.concealed_roles();
            pool.extend_from_slice(game.exchange_draw());
            candidates.extend(
                keep_options(&pool, actor.concealed_count())
                    .into_iter()
                    .map(|keep| Intent::Exchange { keep }),
            );
        }
    }

    candidates
        .into_iter()
        .filter(|intent| check(game, player, intent).is_ok())
        .collect()
}

/// Distinct ways to keep `k` cards out of `pool`, ignoring order
pub fn keep_options(pool: &[Role], k: usize) -> Vec<Vec<Role>> {
    fn pick(pool: &[Role], k: usize, start: usize, current: &mut Vec<Role>, out: &mut Vec<Vec<Role>>) {
        if current.len() == k {
            let mut sorted = current.clone();
            sorted.sort();
            if !out.contains(&sorted) {
                out.push(sorted);
            }
            return;
        }
        for i in start..pool.len() {
            current.push(pool[i]);
            pick(pool, k, i + 1, current, out);
            current.pop();
        }
    }

    let mut out = Vec::new();
    pick(pool, k, 0, &mut Vec::with_capacity(k), &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(hands: &[[Role; 2]]) -> Game {
        let names = ["Alice", "Bob", "Carol", "Dave"];
        Game::with_hands("legal", &names[..hands.len()], hands, 3).unwrap()
    }

    fn three_players() -> Game {
        game(&[
            [Role::Duke, Role::Captain],
            [Role::Contessa, Role::Ambassador],
            [Role::Assassin, Role::Duke],
        ])
    }

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("  Alice ").unwrap(), "Alice");
        assert_eq!(validate_name("   "), Err(GameError::InvalidName));
        assert_eq!(validate_name(&"x".repeat(21)), Err(GameError::InvalidName));
        assert!(validate_name(&"x".repeat(20)).is_ok());
    }

    #[test]
    fn test_claims_reported() {
        let game = three_players();
        let legal = check(&game, 0, &Intent::action(ActionKind::Tax)).unwrap();
        assert_eq!(legal.claim, Some(Role::Duke));
        let legal = check(&game, 0, &Intent::action(ActionKind::Income)).unwrap();
        assert_eq!(legal.claim, None);
    }

    #[test]
    fn test_cannot_afford_assassination() {
        let game = three_players();
        assert_eq!(
            check(&game, 0, &Intent::targeted(ActionKind::Assassinate, 1)),
            Err(GameError::CannotAfford)
        );
    }

    #[test]
    fn test_must_coup_at_ten() {
        let mut game = three_players();
        game.players[0].coins = 10;
        assert_eq!(
            check(&game, 0, &Intent::action(ActionKind::Income)),
            Err(GameError::MustCoup)
        );
        assert!(check(&game, 0, &Intent::targeted(ActionKind::Coup, 1)).is_ok());

        let intents = valid_intents(&game, 0);
        assert!(intents.iter().all(|i| matches!(
            i,
            Intent::TakeAction {
                action: ActionKind::Coup,
                ..
            }
        )));
        assert_eq!(intents.len(), 2);
    }

    #[test]
    fn test_targets_must_be_live_others() {
        let mut game = three_players();
        assert_eq!(
            check(&game, 0, &Intent::targeted(ActionKind::Steal, 0)),
            Err(GameError::InvalidTarget)
        );
        assert_eq!(
            check(&game, 0, &Intent::action(ActionKind::Steal)),
            Err(GameError::InvalidTarget)
        );
        assert_eq!(
            check(&game, 0, &Intent::targeted(ActionKind::Tax, 1)),
            Err(GameError::InvalidTarget)
        );
        game.players[2].reveal_all();
        assert_eq!(
            check(&game, 0, &Intent::targeted(ActionKind::Steal, 2)),
            Err(GameError::InvalidTarget)
        );
    }

    #[test]
    fn test_only_target_blocks_targeted_action() {
        let mut game = three_players();
        game.apply_intent(0, Intent::targeted(ActionKind::Steal, 1))
            .unwrap();

        assert!(check(&game, 1, &Intent::Block { role: Role::Ambassador }).is_ok());
        assert_eq!(
            check(&game, 2, &Intent::Block { role: Role::Captain }),
            Err(GameError::NotEligible)
        );
        assert_eq!(
            check(&game, 1, &Intent::Block { role: Role::Duke }),
            Err(GameError::NotBlockable)
        );
        assert!(check(&game, 2, &Intent::Challenge).is_ok());
        assert_eq!(check(&game, 0, &Intent::Challenge), Err(GameError::NotEligible));
    }

    #[test]
    fn test_anyone_blocks_foreign_aid() {
        let mut game = three_players();
        game.apply_intent(0, Intent::action(ActionKind::ForeignAid))
            .unwrap();

        assert!(check(&game, 1, &Intent::Block { role: Role::Duke }).is_ok());
        assert!(check(&game, 2, &Intent::Block { role: Role::Duke }).is_ok());
        assert_eq!(check(&game, 1, &Intent::Challenge), Err(GameError::NotClaimable));
    }

    #[test]
    fn test_accepted_player_cannot_change_mind() {
        let mut game = three_players();
        game.apply_intent(0, Intent::action(ActionKind::Tax)).unwrap();
        game.apply_intent(1, Intent::Accept).unwrap();
        assert_eq!(check(&game, 1, &Intent::Challenge), Err(GameError::AlreadyResponded));
    }

    #[test]
    fn test_reveal_only_by_owing_player() {
        let mut game = three_players();
        game.apply_intent(0, Intent::action(ActionKind::Tax)).unwrap();
        game.apply_intent(1, Intent::Challenge).unwrap();

        assert_eq!(check(&game, 1, &Intent::Reveal { slot: 0 }), Err(GameError::NotEligible));
        assert_eq!(check(&game, 0, &Intent::Reveal { slot: 2 }), Err(GameError::InvalidReveal));
        assert!(check(&game, 0, &Intent::Reveal { slot: 1 }).is_ok());
        assert_eq!(
            valid_intents(&game, 0),
            vec![Intent::Reveal { slot: 0 }, Intent::Reveal { slot: 1 }]
        );
        assert!(valid_intents(&game, 2).is_empty());
    }

    #[test]
    fn test_lobby_rejects_game_intents() {
        let mut game = Game::with_seed("lobby", 1);
        let host = game.join("Alice").unwrap();
        assert_eq!(
            check(&game, host, &Intent::action(ActionKind::Income)),
            Err(GameError::GameNotRunning)
        );
        assert_eq!(
            check(&game, 99, &Intent::Leave),
            Err(GameError::UnknownPlayer)
        );
    }

    #[test]
    fn test_exchange_selection() {
        let mut game = three_players();
        game.apply_intent(0, Intent::action(ActionKind::Exchange))
            .unwrap();
        game.apply_intent(1, Intent::Accept).unwrap();
        game.apply_intent(2, Intent::Accept).unwrap();
        assert_eq!(game.turn_state, TurnState::Exchanging);

        let mut pool = vec![Role::Duke, Role::Captain];
        pool.extend_from_slice(game.exchange_draw());

        assert!(check(&game, 0, &Intent::Exchange { keep: vec![pool[2], pool[3]] }).is_ok());
        assert_eq!(
            check(&game, 0, &Intent::Exchange { keep: vec![pool[0]] }),
            Err(GameError::InvalidExchange)
        );
        assert_eq!(
            check(&game, 1, &Intent::Exchange { keep: vec![pool[0], pool[1]] }),
            Err(GameError::NotYourTurn)
        );
        assert!(!valid_intents(&game, 0).is_empty());
    }

    #[test]
    fn test_keep_options_are_distinct() {
        let pool = [Role::Duke, Role::Duke, Role::Captain, Role::Contessa];
        let options = keep_options(&pool, 2);
        assert_eq!(options.len(), 4);
        assert!(options.contains(&vec![Role::Duke, Role::Duke]));
        assert_eq!(keep_options(&pool, 1).len(), 3);
    }
}
