//! Event surface of the external chat client.
//!
//! The browser-automated client emits these lifecycle and telemetry events.
//! They are unreliable by nature: events can arrive out of order, repeat, or
//! never arrive at all, which is why the lifecycle manager backs them with a
//! watchdog and a state-polling fallback.

/// External state token reported by the client when it is fully connected.
///
/// Used both by `StateChange` events and by the poller's `query_state` calls.
pub const CONNECTED_STATE: &str = "CONNECTED";

/// A lifecycle or telemetry event emitted by a chat client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// A pairing QR code was (re)generated; payload is the encoded QR data.
    Qr(String),
    /// Loading progress while the client boots the remote web session.
    Loading { percent: u8, message: String },
    /// Credentials were accepted. A `Ready` event should follow, but the
    /// automation layer is known to drop it.
    Authenticated,
    /// Credentials were rejected.
    AuthFailure(String),
    /// The client finished loading and is usable.
    Ready,
    /// The connection was lost; the payload is the client's reason token.
    Disconnected(String),
    /// Raw connection-state token change (e.g. "OPENING", "PAIRING").
    StateChange(String),
    /// Battery telemetry from the paired device.
    BatteryChange { level: u8, plugged: bool },
}

/// Summary of one chat as reported by the client, used for unread
/// reconciliation at promotion time. Message content is never included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSummary {
    /// Client-side chat identifier.
    pub id: String,
    /// Number of messages not yet marked as read.
    pub unread_count: u32,
}
