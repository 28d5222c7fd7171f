//! State-polling fallback for unreliable readiness events.
//!
//! Started alongside the watchdog when a session authenticates. The manager
//! queries the client's connection state on every tick; observing the
//! external "CONNECTED" token promotes the session through the same path a
//! `ready` event would have taken. Compensates for the automation layer
//! dropping the event.

use std::time::Duration;

use tokio::time::{Interval, MissedTickBehavior, interval_at};

/// Fixed-interval ticker that is pending while stopped.
///
/// Mirrors [`super::Watchdog`]: safe to select on unconditionally, with
/// start/stop as state entry/exit actions.
pub struct StatePoller {
    interval: Duration,
    ticker: Option<Interval>,
}

impl StatePoller {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            ticker: None,
        }
    }

    /// Start (or restart) polling. The first tick lands one full interval
    /// from now.
    pub fn start(&mut self) {
        let mut ticker = interval_at(tokio::time::Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.ticker = Some(ticker);
    }

    /// Stop polling. Idempotent.
    pub fn stop(&mut self) {
        self.ticker = None;
    }

    pub fn is_active(&self) -> bool {
        self.ticker.is_some()
    }

    /// Resolves on the next tick; pending forever while stopped.
    pub async fn tick(&mut self) {
        match self.ticker.as_mut() {
            Some(ticker) => {
                ticker.tick().await;
            }
            None => std::future::pending().await,
        }
    }
}
