//! Chat client port.
//!
//! `ChatClient` is the imperative surface of one connected browser-automated
//! client; its lifecycle events arrive separately over the `mpsc` stream
//! handed out by the [`ClientFactory`]. Implementations live outside core
//! (the production one wraps the browser automation layer; tests use fakes).
//! Uses native async fn in traits (Rust 2024 edition, no async_trait macro).

use tokio::sync::mpsc;

use zapwire_types::client::{ChatSummary, ClientEvent};
use zapwire_types::error::ClientError;
use zapwire_types::session::SessionRecord;

/// One live connection to the external messaging endpoint.
///
/// All operations are asynchronous requests against the automation layer and
/// may fail transiently; `destroy` and `send_presence` are best-effort from
/// the lifecycle manager's point of view.
pub trait ChatClient: Send + Sync + 'static {
    /// Start the client. Lifecycle events begin flowing on the event stream
    /// once initialization is underway.
    fn initialize(&self)
    -> impl std::future::Future<Output = Result<(), ClientError>> + Send;

    /// Tear the client down, releasing the underlying browser session.
    fn destroy(&self) -> impl std::future::Future<Output = Result<(), ClientError>> + Send;

    /// Query the current connection-state token (e.g. "CONNECTED").
    fn query_state(&self)
    -> impl std::future::Future<Output = Result<String, ClientError>> + Send;

    /// Announce presence to the endpoint. Best-effort.
    fn send_presence(&self)
    -> impl std::future::Future<Output = Result<(), ClientError>> + Send;

    /// List the client's chats with their unread counts.
    fn list_chats(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<ChatSummary>, ClientError>> + Send;

    /// Mark every pending message in the given chat as read.
    fn mark_read(
        &self,
        chat_id: &str,
    ) -> impl std::future::Future<Output = Result<(), ClientError>> + Send;
}

/// Builds a client (and its event stream) for one lifecycle attempt.
///
/// Each attempt gets a fresh client; the returned receiver is the only way
/// lifecycle events for that client are observed, so dropping it is the
/// moral equivalent of removing all listeners.
pub trait ClientFactory: Send + Sync {
    type Client: ChatClient;

    fn build(
        &self,
        record: &SessionRecord,
    ) -> impl std::future::Future<
        Output = Result<
            (
                std::sync::Arc<Self::Client>,
                mpsc::UnboundedReceiver<ClientEvent>,
            ),
            ClientError,
        >,
    > + Send;
}
