//! Session lifecycle components: registry, lifecycle manager, watchdog,
//! state poller, monitor, and the session service.

pub mod lifecycle;
pub mod monitor;
pub mod poller;
pub mod registry;
pub mod service;
pub mod watchdog;

pub use lifecycle::{LifecycleManager, SessionState};
pub use monitor::Monitor;
pub use poller::StatePoller;
pub use registry::SessionRegistry;
pub use service::SessionService;
pub use watchdog::Watchdog;

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::event::EventBus;
use zapwire_types::config::LifecycleConfig;
use zapwire_types::session::{AccountId, SessionRecord};

/// A session that has completed the promotion protocol.
///
/// This is the capability handed to the message listener: it can only be
/// constructed by the promotion path inside the lifecycle manager, which is
/// what guarantees the listener is never attached to a session that is not
/// yet usable.
pub struct PromotedSession<C> {
    account_id: AccountId,
    client: Arc<C>,
}

impl<C> PromotedSession<C> {
    pub(crate) fn new(account_id: AccountId, client: Arc<C>) -> Self {
        Self { account_id, client }
    }

    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }
}

/// Collaborators shared by every lifecycle attempt the service spawns.
pub struct SessionDeps<C, S, L> {
    pub registry: Arc<SessionRegistry<C>>,
    pub store: Arc<S>,
    pub listener: Arc<L>,
    pub bus: EventBus,
    pub config: LifecycleConfig,
    pub restart_tx: mpsc::UnboundedSender<SessionRecord>,
}

impl<C, S, L> Clone for SessionDeps<C, S, L> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            store: Arc::clone(&self.store),
            listener: Arc::clone(&self.listener),
            bus: self.bus.clone(),
            config: self.config.clone(),
            restart_tx: self.restart_tx.clone(),
        }
    }
}

/// Cancel handle for one live session. Cancelling it detaches the session's
/// event loop from the client -- the Rust rendition of "remove all listeners".
pub type SessionCancel = CancellationToken;
