//! Event types for the Zapwire session event bus.
//!
//! `SessionEvent` is the unified event type broadcast on every session state
//! transition. All variants are Clone + Send + Sync for use with tokio
//! broadcast channels. Delivery is fire-and-forget and at-least-once;
//! consumers must tolerate lag and out-of-order observation.

use serde::{Deserialize, Serialize};

use crate::session::SessionRecord;

/// Events published by the lifecycle manager and the monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// The session record changed (status, QR payload, retries, battery...).
    /// Carries the full record after the change.
    SessionUpdate { session: SessionRecord },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{AccountId, SessionRecord};

    #[test]
    fn session_update_serializes_tagged() {
        let event = SessionEvent::SessionUpdate {
            session: SessionRecord::new(AccountId(7), "support"),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "session_update");
        assert_eq!(json["session"]["id"], 7);
        assert_eq!(json["session"]["status"], "opening");
    }
}
