//! Watchdog guarding the gap between authentication and readiness.
//!
//! The automated browser session can become authenticated yet silently fail
//! to finish loading; without a bound the manager would wait indefinitely
//! and leak a live browser process. The watchdog is a single-shot deadline
//! armed on entry to the authenticating state and disarmed on every exit.

use std::pin::Pin;
use std::time::Duration;

use tokio::time::{Sleep, sleep};

/// Single-shot, re-armable deadline.
///
/// While disarmed, [`Watchdog::fired`] never resolves, so it can sit in a
/// `tokio::select!` arm unconditionally. Arming again resets the deadline.
pub struct Watchdog {
    deadline: Duration,
    timer: Option<Pin<Box<Sleep>>>,
}

impl Watchdog {
    pub fn new(deadline: Duration) -> Self {
        Self {
            deadline,
            timer: None,
        }
    }

    /// Arm (or re-arm) the watchdog, resetting the deadline.
    pub fn arm(&mut self) {
        self.timer = Some(Box::pin(sleep(self.deadline)));
    }

    /// Cancel the pending deadline. Idempotent.
    pub fn disarm(&mut self) {
        self.timer = None;
    }

    pub fn is_armed(&self) -> bool {
        self.timer.is_some()
    }

    /// Resolves when the armed deadline elapses; pending forever while
    /// disarmed. Disarms itself on firing.
    pub async fn fired(&mut self) {
        match self.timer.as_mut() {
            Some(timer) => {
                timer.as_mut().await;
                self.timer = None;
            }
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    #[tokio::test(start_paused = true)]
    async fn disarmed_watchdog_never_fires() {
        let mut watchdog = Watchdog::new(Duration::from_secs(90));
        let fired = timeout(Duration::from_secs(600), watchdog.fired()).await;
        assert!(fired.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn armed_watchdog_fires_after_deadline() {
        let mut watchdog = Watchdog::new(Duration::from_secs(90));
        watchdog.arm();
        let fired = timeout(Duration::from_secs(91), watchdog.fired()).await;
        assert!(fired.is_ok());
        assert!(!watchdog.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn disarm_cancels_pending_deadline() {
        let mut watchdog = Watchdog::new(Duration::from_secs(90));
        watchdog.arm();
        watchdog.disarm();
        watchdog.disarm(); // idempotent
        let fired = timeout(Duration::from_secs(600), watchdog.fired()).await;
        assert!(fired.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_resets_the_deadline() {
        let mut watchdog = Watchdog::new(Duration::from_secs(90));
        watchdog.arm();
        tokio::time::sleep(Duration::from_secs(60)).await;
        watchdog.arm(); // new deadline at t=150

        // at t=140 nothing has fired yet
        let early = timeout(Duration::from_secs(80), watchdog.fired()).await;
        assert!(early.is_err());

        let late = timeout(Duration::from_secs(20), watchdog.fired()).await;
        assert!(late.is_ok());
    }
}
