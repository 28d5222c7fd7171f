//! Session service: the entry point callers use to start, look up, and
//! remove sessions.
//!
//! Each `start` call persists the `opening` status, builds a fresh client
//! through the [`ClientFactory`], spawns a lifecycle manager task, and
//! awaits the outcome. The caller's contract is deliberately simple:
//! eventually connected, or explicitly told why not. The service also owns
//! the restart channel the monitor feeds after disconnects; the restart
//! worker turns each request into a brand-new lifecycle attempt.

use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use crate::client::ClientFactory;
use crate::event::EventBus;
use crate::listener::MessageListener;
use crate::session::lifecycle::LifecycleManager;
use crate::session::registry::SessionRegistry;
use crate::session::{SessionCancel, SessionDeps};
use crate::store::SessionStore;
use zapwire_types::config::LifecycleConfig;
use zapwire_types::error::SessionError;
use zapwire_types::event::SessionEvent;
use zapwire_types::session::{AccountId, SessionPatch, SessionRecord, SessionStatus};

/// Capacity of the session-update broadcast channel.
const EVENT_BUS_CAPACITY: usize = 256;

/// Orchestrates session lifecycles for all accounts in the process.
pub struct SessionService<F: ClientFactory, S, L> {
    factory: F,
    deps: SessionDeps<F::Client, S, L>,
    restart_rx: Mutex<Option<mpsc::UnboundedReceiver<SessionRecord>>>,
}

impl<F, S, L> SessionService<F, S, L>
where
    F: ClientFactory + Send + Sync + 'static,
    S: SessionStore + 'static,
    L: MessageListener<F::Client> + 'static,
{
    pub fn new(factory: F, store: Arc<S>, listener: Arc<L>, config: LifecycleConfig) -> Self {
        let (restart_tx, restart_rx) = mpsc::unbounded_channel();
        let deps = SessionDeps {
            registry: Arc::new(SessionRegistry::new()),
            store,
            listener,
            bus: EventBus::new(EVENT_BUS_CAPACITY),
            config,
            restart_tx,
        };
        Self {
            factory,
            deps,
            restart_rx: Mutex::new(Some(restart_rx)),
        }
    }

    /// Start a lifecycle attempt for the account and wait for its outcome.
    ///
    /// Resolves with the live client once the session promotes, or with the
    /// explicit failure (`AuthFailure`, `StuckAfterAuthentication`,
    /// `Initialization`); a lifecycle that ends any other way before
    /// promotion yields [`SessionError::Terminated`].
    pub async fn start(&self, record: SessionRecord) -> Result<Arc<F::Client>, SessionError> {
        let account_id = record.id;
        info!(%account_id, name = %record.name, "starting session");

        let mut record = record;
        let patch = SessionPatch {
            status: Some(SessionStatus::Opening),
            ..Default::default()
        };
        record.apply(&patch);
        if let Err(err) = self.deps.store.update(account_id, patch).await {
            error!(%account_id, %err, "failed to persist opening status");
        }
        self.deps.bus.publish(SessionEvent::SessionUpdate {
            session: record.clone(),
        });

        let (client, events) = self
            .factory
            .build(&record)
            .await
            .map_err(|err| SessionError::Initialization(err.to_string()))?;

        let cancel = SessionCancel::new();
        let (resolve_tx, resolve_rx) = oneshot::channel();
        let manager = LifecycleManager::new(
            record,
            Arc::clone(&client),
            cancel,
            resolve_tx,
            self.deps.clone(),
        );
        tokio::spawn(manager.run(events));

        match resolve_rx.await {
            Ok(result) => result,
            Err(_) => Err(SessionError::Terminated),
        }
    }

    /// Look up the live client for an account.
    pub fn lookup(&self, account_id: AccountId) -> Result<Arc<F::Client>, SessionError> {
        self.deps.registry.lookup(account_id)
    }

    /// Remove an account's session (detach, destroy best-effort, forget).
    pub async fn remove(&self, account_id: AccountId) {
        self.deps.registry.remove(account_id).await;
    }

    pub fn registry(&self) -> &Arc<SessionRegistry<F::Client>> {
        &self.deps.registry
    }

    /// Bus carrying a `SessionUpdate` for every state transition.
    pub fn bus(&self) -> &EventBus {
        &self.deps.bus
    }

    /// Take the stream of restart requests scheduled by session monitors.
    ///
    /// Intended for callers that want to drive restarts themselves instead
    /// of using [`SessionService::spawn_restart_worker`]. Returns `None`
    /// after the first call.
    pub fn take_restart_requests(&self) -> Option<mpsc::UnboundedReceiver<SessionRecord>> {
        self.restart_rx.lock().ok()?.take()
    }

    /// Spawn the worker that turns restart requests into new lifecycle
    /// attempts. Returns `None` if the restart stream was already taken.
    pub fn spawn_restart_worker(service: &Arc<Self>) -> Option<tokio::task::JoinHandle<()>> {
        let mut restart_rx = service.take_restart_requests()?;
        let service = Arc::clone(service);
        Some(tokio::spawn(async move {
            while let Some(record) = restart_rx.recv().await {
                let account_id = record.id;
                info!(%account_id, "restarting session");
                let service = Arc::clone(&service);
                // each attempt may wait on a QR scan; never serialize them
                tokio::spawn(async move {
                    if let Err(err) = service.start(record).await {
                        warn!(%account_id, %err, "session restart attempt failed");
                    }
                });
            }
        }))
    }
}

impl<F: ClientFactory, S, L> std::fmt::Debug for SessionService<F, S, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionService")
            .field("sessions", &self.deps.registry.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::fakes::{CountingListener, FakeClient, FakeFactory, RecordingStore};
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use zapwire_types::client::ClientEvent;

    type FakeService = SessionService<FakeFactory, RecordingStore, CountingListener>;

    struct Harness {
        service: Arc<FakeService>,
        factory: FakeFactory,
        client: Arc<FakeClient>,
        store: Arc<RecordingStore>,
        listener: Arc<CountingListener>,
    }

    fn harness() -> Harness {
        let client = Arc::new(FakeClient::default());
        let factory = FakeFactory::new(Arc::clone(&client));
        let store = Arc::new(RecordingStore::default());
        let listener = Arc::new(CountingListener::default());
        let service = Arc::new(SessionService::new(
            factory.clone(),
            Arc::clone(&store),
            Arc::clone(&listener),
            LifecycleConfig::default(),
        ));
        Harness {
            service,
            factory,
            client,
            store,
            listener,
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    fn record(id: i64) -> SessionRecord {
        SessionRecord::new(AccountId(id), format!("account-{id}"))
    }

    #[tokio::test(start_paused = true)]
    async fn start_resolves_with_client_on_promotion() {
        let h = harness();
        let service = Arc::clone(&h.service);
        let started = tokio::spawn(async move { service.start(record(42)).await });
        settle().await;

        let events = h.factory.events();
        events.send(ClientEvent::Qr("ABC".to_string())).unwrap();
        settle().await;
        events.send(ClientEvent::Authenticated).unwrap();
        settle().await;
        events.send(ClientEvent::Ready).unwrap();

        let client = started.await.unwrap().unwrap();
        assert!(Arc::ptr_eq(&client, &h.client));

        // opening is persisted before anything else happens
        let patches = h.store.patches_for(AccountId(42));
        assert_eq!(patches[0].status, Some(SessionStatus::Opening));
        assert_eq!(h.listener.attached.load(Ordering::SeqCst), 1);
        assert!(h.service.lookup(AccountId(42)).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn start_surfaces_auth_failure() {
        let h = harness();
        let service = Arc::clone(&h.service);
        let started = tokio::spawn(async move { service.start(record(1)).await });
        settle().await;

        h.factory
            .events()
            .send(ClientEvent::AuthFailure("denied".to_string()))
            .unwrap();

        let err = started.await.unwrap().unwrap_err();
        assert!(matches!(err, SessionError::AuthFailure(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn start_maps_unresolved_attempt_to_terminated() {
        let h = harness();
        let service = Arc::clone(&h.service);
        let started = tokio::spawn(async move { service.start(record(2)).await });
        settle().await;

        h.factory
            .events()
            .send(ClientEvent::Disconnected("NAVIGATION".to_string()))
            .unwrap();

        let err = started.await.unwrap().unwrap_err();
        assert!(matches!(err, SessionError::Terminated));
    }

    #[tokio::test(start_paused = true)]
    async fn lookup_before_start_fails() {
        let h = harness();
        assert!(matches!(
            h.service.lookup(AccountId(99)),
            Err(SessionError::NotInitialized(AccountId(99)))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn remove_then_lookup_fails() {
        let h = harness();
        let service = Arc::clone(&h.service);
        let started = tokio::spawn(async move { service.start(record(3)).await });
        settle().await;

        let events = h.factory.events();
        events.send(ClientEvent::Qr("QR".to_string())).unwrap();
        settle().await;
        events.send(ClientEvent::Authenticated).unwrap();
        settle().await;
        events.send(ClientEvent::Ready).unwrap();
        started.await.unwrap().unwrap();

        h.service.remove(AccountId(3)).await;
        assert!(matches!(
            h.service.lookup(AccountId(3)),
            Err(SessionError::NotInitialized(_))
        ));
        assert_eq!(h.client.destroy_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_worker_schedules_new_attempt_after_disconnect() {
        let h = harness();
        let worker = SessionService::spawn_restart_worker(&h.service);
        assert!(worker.is_some());
        // restart stream can only be taken once
        assert!(h.service.take_restart_requests().is_none());

        let service = Arc::clone(&h.service);
        let started = tokio::spawn(async move { service.start(record(7)).await });
        settle().await;

        let events = h.factory.events();
        events.send(ClientEvent::Qr("QR".to_string())).unwrap();
        settle().await;
        events.send(ClientEvent::Authenticated).unwrap();
        settle().await;
        events.send(ClientEvent::Ready).unwrap();
        started.await.unwrap().unwrap();
        assert_eq!(h.factory.attempts(), 1);

        events
            .send(ClientEvent::Disconnected("NAVIGATION".to_string()))
            .unwrap();
        // restart fires after the 2s delay
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(h.factory.attempts(), 2);
        let patches = h.store.patches_for(AccountId(7));
        // the fresh attempt persisted `opening` again as its first step
        assert_eq!(
            patches.last().unwrap().status,
            Some(SessionStatus::Opening)
        );
    }
}
