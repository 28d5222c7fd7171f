use thiserror::Error;

use crate::session::AccountId;

/// Errors surfaced by the session lifecycle.
///
/// Only two conditions reach a session-creation caller as success/failure of
/// the pending request: promotion (success) and `AuthFailure` /
/// `StuckAfterAuthentication` / `Initialization` / `Terminated` (failure).
/// Every other failure mode is absorbed locally and expressed through logs
/// and broadcast events.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Lookup of a session that was never registered or already removed.
    #[error("session for account {0} is not initialized")]
    NotInitialized(AccountId),

    /// The external endpoint rejected authentication.
    #[error("authentication failed: {0}")]
    AuthFailure(String),

    /// The watchdog destroyed a client that authenticated but never became
    /// ready.
    #[error("session stuck after authentication; client destroyed")]
    StuckAfterAuthentication,

    /// The client could not even start initializing.
    #[error("client initialization failed: {0}")]
    Initialization(String),

    /// The lifecycle attempt ended (disconnect, cancellation, closed event
    /// stream) before the session became usable.
    #[error("session ended before becoming ready")]
    Terminated,
}

/// Errors from imperative operations on the external chat client.
///
/// Transient automation glitches are expected; callers of best-effort
/// operations catch these at the boundary and log them.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("client command failed: {0}")]
    Command(String),

    #[error("client is not connected")]
    NotConnected,

    #[error("client already destroyed")]
    Destroyed,
}

/// Errors from the persistence collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("session record not found")]
    NotFound,
}
