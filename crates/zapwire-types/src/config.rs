//! Configuration types for Zapwire.
//!
//! `ZapwireConfig` represents the top-level `config.toml`. The lifecycle
//! tunables are fixed constants in spirit -- the defaults below are the
//! values the system was designed around -- but they are exposed as
//! configuration so deployments with slower automation layers can stretch
//! them.

use serde::{Deserialize, Serialize};

use std::time::Duration;

/// Timing tunables for one session lifecycle attempt.
///
/// All fields have documented defaults: 90s watchdog deadline, 1.5s poll
/// interval, 2s restart delay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Seconds to wait between `authenticated` and `ready` before the
    /// watchdog destroys the stuck client.
    #[serde(default = "default_watchdog_deadline_secs")]
    pub watchdog_deadline_secs: u64,

    /// Milliseconds between state-poll queries while authenticating.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Milliseconds to wait before restarting a disconnected session.
    #[serde(default = "default_restart_delay_ms")]
    pub restart_delay_ms: u64,
}

fn default_watchdog_deadline_secs() -> u64 {
    90
}

fn default_poll_interval_ms() -> u64 {
    1_500
}

fn default_restart_delay_ms() -> u64 {
    2_000
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            watchdog_deadline_secs: default_watchdog_deadline_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            restart_delay_ms: default_restart_delay_ms(),
        }
    }
}

impl LifecycleConfig {
    pub fn watchdog_deadline(&self) -> Duration {
        Duration::from_secs(self.watchdog_deadline_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }
}

/// Top-level configuration, loaded from `{data_dir}/config.toml`.
///
/// All fields have sensible defaults; a missing or malformed file yields
/// `ZapwireConfig::default()`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZapwireConfig {
    #[serde(default)]
    pub lifecycle: LifecycleConfig,

    /// Override for the SQLite database URL. When absent, the URL is derived
    /// from the data directory.
    #[serde(default)]
    pub database_url: Option<String>,
}
