//! Turn timeout watchdog.
//!
//! Games never wait on a silent player forever: once a running game has
//! gone `timeout` without accepting an intent, the default decisions from
//! `coup_core::timeout_intents` are applied on the waiting players' behalf.

use crate::server::ServerState;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Scan every room each `interval` and expire stalled turns
pub async fn run_watchdog(state: Arc<ServerState>, timeout: Duration, interval: Duration) {
    info!(?timeout, ?interval, "turn watchdog started");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let applied = state.expire_stalled_turns(Instant::now(), timeout);
        if applied > 0 {
            debug!(applied, "applied timeout defaults");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coup_core::Intent;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_watchdog_moves_a_stalled_game() {
        let state = Arc::new(ServerState::new());
        let host = Uuid::new_v4();
        let (game_id, _) = state.create_game(host, "Host").unwrap();
        state.join_game(Uuid::new_v4(), game_id, "Guest").unwrap();
        state.submit_intent(host, Intent::StartGame.into()).unwrap();

        let watchdog = tokio::spawn(run_watchdog(
            Arc::clone(&state),
            Duration::from_millis(20),
            Duration::from_millis(5),
        ));
        tokio::time::sleep(Duration::from_millis(200)).await;
        watchdog.abort();

        let snapshot = state.snapshot(game_id).unwrap();
        assert!(snapshot.seq > 1, "no default decision was applied");
    }
}
