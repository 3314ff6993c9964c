//! Server configuration from the environment.

use anyhow::Context;
use std::net::SocketAddr;
use std::time::Duration;

const DEFAULT_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_TURN_TIMEOUT_SECS: u64 = 10;
const DEFAULT_WATCHDOG_INTERVAL_MS: u64 = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    /// How long a running game may wait on a decision; `None` disables timeouts
    pub turn_timeout: Option<Duration>,
    pub watchdog_interval: Duration,
}

impl ServerConfig {
    /// Read `SERVER_ADDR`, `TURN_TIMEOUT_SECS` and `WATCHDOG_INTERVAL_MS`
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let addr = lookup("SERVER_ADDR")
            .unwrap_or_else(|| DEFAULT_ADDR.into())
            .parse()
            .context("SERVER_ADDR is not a socket address")?;

        let timeout_secs = match lookup("TURN_TIMEOUT_SECS") {
            Some(value) => value
                .parse::<u64>()
                .context("TURN_TIMEOUT_SECS is not a whole number")?,
            None => DEFAULT_TURN_TIMEOUT_SECS,
        };

        let interval_ms = match lookup("WATCHDOG_INTERVAL_MS") {
            Some(value) => value
                .parse::<u64>()
                .context("WATCHDOG_INTERVAL_MS is not a whole number")?,
            None => DEFAULT_WATCHDOG_INTERVAL_MS,
        };
        if interval_ms == 0 {
            anyhow::bail!("WATCHDOG_INTERVAL_MS must be positive");
        }

        Ok(Self {
            addr,
            turn_timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
            watchdog_interval: Duration::from_millis(interval_ms),
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            turn_timeout: Some(Duration::from_secs(DEFAULT_TURN_TIMEOUT_SECS)),
            watchdog_interval: Duration::from_millis(DEFAULT_WATCHDOG_INTERVAL_MS),
        }
    }
}
