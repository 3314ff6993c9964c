//! Coup multiplayer game server.

use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod protocol;
mod room;
mod server;
mod timeouts;

use config::ServerConfig;
use server::ServerState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;

    info!("Starting Coup server...");

    let state = Arc::new(ServerState::new());

    match config.turn_timeout {
        Some(timeout) => {
            tokio::spawn(timeouts::run_watchdog(
                Arc::clone(&state),
                timeout,
                config.watchdog_interval,
            ));
        }
        None => info!("turn timeouts disabled"),
    }

    server::run_server(config.addr, state).await
}
