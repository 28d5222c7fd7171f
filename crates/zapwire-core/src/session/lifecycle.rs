//! Per-session lifecycle manager.
//!
//! One manager instance drives one logical account connection through the
//! state machine below, compensating for the unreliable event surface of the
//! browser-automated client: a watchdog bounds the gap between
//! `authenticated` and `ready`, and a state poller promotes sessions whose
//! `ready` event was dropped.
//!
//! ```text
//! Created -> AwaitingQr -> Authenticating -> Connected
//!                   \            \-> Failed (watchdog / auth failure)
//!                    \-> Disconnected (connection lost early)
//! ```
//!
//! All triggers for a session -- client events, watchdog deadline, poller
//! ticks, initialization outcome, cancellation -- are serialized through a
//! single `tokio::select!` loop, so the manager needs no internal locking.
//! Timer arming and disarming happen as state entry/exit actions. After
//! promotion the event stream is handed to the [`Monitor`].

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::client::ChatClient;
use crate::event::EventBus;
use crate::listener::MessageListener;
use crate::session::monitor::Monitor;
use crate::session::poller::StatePoller;
use crate::session::registry::SessionRegistry;
use crate::session::watchdog::Watchdog;
use crate::session::{PromotedSession, SessionCancel, SessionDeps};
use crate::store::SessionStore;
use zapwire_types::client::{CONNECTED_STATE, ClientEvent};
use zapwire_types::config::LifecycleConfig;
use zapwire_types::error::SessionError;
use zapwire_types::event::SessionEvent;
use zapwire_types::session::{SessionPatch, SessionRecord, SessionStatus};

/// Retry count above which a further auth failure clears the stored
/// credential (forcing a fresh pairing on the next attempt).
const CREDENTIAL_RESET_THRESHOLD: u32 = 1;

/// States of one lifecycle attempt. Terminal states are per-attempt: a new
/// manager instance is constructed for the next attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    AwaitingQr,
    Authenticating,
    Connected,
    Disconnected,
    Failed,
}

/// How the connect loop ended.
enum LoopOutcome {
    /// Promotion protocol ran; the monitor takes over the event stream.
    Promoted,
    /// Auth failure, watchdog destruction, or failed initialization.
    Failed,
    /// The connection dropped before the session became usable.
    Disconnected,
    /// Cancelled or the client closed its event stream.
    Detached,
}

/// Result channel for the pending session-creation request.
pub type PendingResolver<C> = oneshot::Sender<Result<Arc<C>, SessionError>>;

/// Drives a single session from initialization to promotion (or failure),
/// then hands off to the [`Monitor`].
pub struct LifecycleManager<C, S, L> {
    record: SessionRecord,
    client: Arc<C>,
    registry: Arc<SessionRegistry<C>>,
    store: Arc<S>,
    listener: Arc<L>,
    bus: EventBus,
    config: LifecycleConfig,
    cancel: SessionCancel,
    restart_tx: mpsc::UnboundedSender<SessionRecord>,
    state: SessionState,
    pending: Option<PendingResolver<C>>,
    promoted: bool,
}

impl<C, S, L> LifecycleManager<C, S, L>
where
    C: ChatClient,
    S: SessionStore,
    L: MessageListener<C>,
{
    pub fn new(
        record: SessionRecord,
        client: Arc<C>,
        cancel: SessionCancel,
        pending: PendingResolver<C>,
        deps: SessionDeps<C, S, L>,
    ) -> Self {
        Self {
            record,
            client,
            registry: deps.registry,
            store: deps.store,
            listener: deps.listener,
            bus: deps.bus,
            config: deps.config,
            cancel,
            restart_tx: deps.restart_tx,
            state: SessionState::Created,
            pending: Some(pending),
            promoted: false,
        }
    }

    /// Run the lifecycle to completion.
    ///
    /// Consumes the client's event stream. If the session promotes, the
    /// stream is handed to the monitor for the rest of the session's life;
    /// otherwise a still-pending creation request is rejected (explicitly or
    /// by dropping the resolver, which the service surfaces as
    /// [`SessionError::Terminated`]).
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<ClientEvent>) {
        let account_id = self.record.id;
        let cancel = self.cancel.clone();
        let mut watchdog = Watchdog::new(self.config.watchdog_deadline());
        let mut poller = StatePoller::new(self.config.poll_interval());

        // Initialization runs concurrently with the event loop; its outcome
        // only matters when it fails before any event arrives.
        let (init_tx, mut init_rx) = oneshot::channel();
        {
            let client = Arc::clone(&self.client);
            tokio::spawn(async move {
                let _ = init_tx.send(client.initialize().await);
            });
        }
        let mut init_done = false;

        self.state = SessionState::AwaitingQr;
        debug!(%account_id, "lifecycle started");

        let outcome = loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(%account_id, "session cancelled, detaching");
                    break LoopOutcome::Detached;
                }
                maybe_event = events.recv() => match maybe_event {
                    Some(event) => {
                        if let Some(outcome) =
                            self.on_event(event, &mut watchdog, &mut poller).await
                        {
                            break outcome;
                        }
                    }
                    None => {
                        debug!(%account_id, "client event stream closed");
                        break LoopOutcome::Detached;
                    }
                },
                _ = watchdog.fired() => {
                    self.on_watchdog_fired(&mut poller).await;
                    break LoopOutcome::Failed;
                }
                _ = poller.tick() => {
                    if let Some(outcome) = self.on_poll_tick(&mut watchdog, &mut poller).await {
                        break outcome;
                    }
                }
                init = &mut init_rx, if !init_done => {
                    init_done = true;
                    match init {
                        Ok(Ok(())) => debug!(%account_id, "client initialization finished"),
                        Ok(Err(err)) => {
                            error!(%account_id, %err, "client initialization failed");
                            watchdog.disarm();
                            poller.stop();
                            self.state = SessionState::Failed;
                            self.resolve(Err(SessionError::Initialization(err.to_string())));
                            break LoopOutcome::Failed;
                        }
                        // init task dropped without reporting; nothing to act on
                        Err(_) => {}
                    }
                }
            }
        };

        match outcome {
            LoopOutcome::Promoted => {
                Monitor::new(
                    self.record,
                    Arc::clone(&self.registry),
                    Arc::clone(&self.store),
                    self.bus.clone(),
                    self.restart_tx.clone(),
                    self.config.restart_delay(),
                )
                .run(events, cancel)
                .await;
            }
            LoopOutcome::Failed | LoopOutcome::Disconnected | LoopOutcome::Detached => {
                debug!(%account_id, state = ?self.state, "lifecycle ended without promotion");
            }
        }
    }

    /// Dispatch one client event. Returns the loop outcome on terminal
    /// transitions.
    async fn on_event(
        &mut self,
        event: ClientEvent,
        watchdog: &mut Watchdog,
        poller: &mut StatePoller,
    ) -> Option<LoopOutcome> {
        let account_id = self.record.id;
        match event {
            ClientEvent::Qr(payload) => {
                if self.state != SessionState::AwaitingQr {
                    debug!(%account_id, state = ?self.state, "ignoring qr event");
                    return None;
                }
                info!(%account_id, "qr code received");
                self.persist_and_broadcast(SessionPatch {
                    qrcode: Some(payload),
                    status: Some(SessionStatus::Qrcode),
                    retries: Some(0),
                    ..Default::default()
                })
                .await;
                self.registry
                    .register(account_id, Arc::clone(&self.client), self.cancel.clone());
                None
            }
            ClientEvent::Loading { percent, message } => {
                info!(%account_id, percent, %message, "loading screen");
                None
            }
            ClientEvent::Authenticated => {
                match self.state {
                    SessionState::AwaitingQr | SessionState::Authenticating => {
                        info!(%account_id, "authenticated, arming watchdog and state poller");
                        self.state = SessionState::Authenticating;
                        watchdog.arm();
                        poller.start();
                    }
                    _ => debug!(%account_id, state = ?self.state, "ignoring authenticated event"),
                }
                None
            }
            ClientEvent::AuthFailure(reason) => {
                error!(%account_id, %reason, "authentication failure");
                self.on_auth_failure(reason, watchdog, poller).await;
                Some(LoopOutcome::Failed)
            }
            ClientEvent::Ready => match self.state {
                SessionState::AwaitingQr | SessionState::Authenticating => {
                    info!(%account_id, "ready event received");
                    self.promote(watchdog, poller).await;
                    Some(LoopOutcome::Promoted)
                }
                _ => {
                    debug!(%account_id, state = ?self.state, "ignoring ready event");
                    None
                }
            },
            ClientEvent::Disconnected(reason) => {
                warn!(%account_id, %reason, "disconnected before promotion");
                watchdog.disarm();
                poller.stop();
                self.state = SessionState::Disconnected;
                self.persist_and_broadcast(SessionPatch {
                    status: Some(SessionStatus::Disconnected),
                    ..Default::default()
                })
                .await;
                self.registry.unregister(account_id);
                Some(LoopOutcome::Disconnected)
            }
            ClientEvent::StateChange(token) => {
                debug!(%account_id, %token, "state change before promotion");
                None
            }
            ClientEvent::BatteryChange { level, plugged } => {
                debug!(%account_id, level, plugged, "battery change before promotion");
                None
            }
        }
    }

    /// Poll fallback: query the client's state and promote on "CONNECTED".
    /// Query failures are logged and do not stop the loop.
    async fn on_poll_tick(
        &mut self,
        watchdog: &mut Watchdog,
        poller: &mut StatePoller,
    ) -> Option<LoopOutcome> {
        let account_id = self.record.id;
        match self.client.query_state().await {
            Ok(state) => {
                debug!(%account_id, %state, "polled client state");
                if state == CONNECTED_STATE {
                    info!(%account_id, "poller observed connected state");
                    self.promote(watchdog, poller).await;
                    return Some(LoopOutcome::Promoted);
                }
                None
            }
            Err(err) => {
                warn!(%account_id, %err, "state poll failed");
                None
            }
        }
    }

    /// Watchdog deadline elapsed between authentication and readiness:
    /// detach, destroy the stuck client, reject the pending request.
    async fn on_watchdog_fired(&mut self, poller: &mut StatePoller) {
        let account_id = self.record.id;
        poller.stop();
        self.state = SessionState::Failed;
        warn!(%account_id, "watchdog: stuck after authentication, destroying client");
        self.cancel.cancel();
        if let Err(err) = self.client.destroy().await {
            error!(%account_id, %err, "watchdog: error destroying stuck client");
        }
        self.registry.unregister(account_id);
        self.resolve(Err(SessionError::StuckAfterAuthentication));
    }

    /// Credential-reset policy: a failure with more than
    /// `CREDENTIAL_RESET_THRESHOLD` prior retries clears the stored
    /// credential and resets the counter before incrementing.
    async fn on_auth_failure(
        &mut self,
        reason: String,
        watchdog: &mut Watchdog,
        poller: &mut StatePoller,
    ) {
        watchdog.disarm();
        poller.stop();
        self.state = SessionState::Failed;

        if self.record.retries > CREDENTIAL_RESET_THRESHOLD {
            self.persist(SessionPatch {
                credential: Some(String::new()),
                retries: Some(0),
                ..Default::default()
            })
            .await;
        }
        let retries = self.record.retries + 1;
        self.persist_and_broadcast(SessionPatch {
            status: Some(SessionStatus::Disconnected),
            retries: Some(retries),
            ..Default::default()
        })
        .await;

        self.resolve(Err(SessionError::AuthFailure(reason)));
    }

    /// Promotion protocol. Idempotent: guarded by the promoted flag, and the
    /// pending resolver is taken exactly once -- a second trigger in the
    /// same turn is a no-op state confirmation.
    async fn promote(&mut self, watchdog: &mut Watchdog, poller: &mut StatePoller) {
        if self.promoted {
            debug!(account_id = %self.record.id, "already promoted, ignoring trigger");
            return;
        }
        self.promoted = true;
        watchdog.disarm();
        poller.stop();
        self.state = SessionState::Connected;

        let account_id = self.record.id;
        info!(%account_id, "promoting session to connected");

        self.persist_and_broadcast(SessionPatch {
            status: Some(SessionStatus::Connected),
            qrcode: Some(String::new()),
            retries: Some(0),
            ..Default::default()
        })
        .await;

        if let Err(err) = self.client.send_presence().await {
            warn!(%account_id, %err, "presence announce failed (non-critical)");
        }

        self.sync_unread().await;

        self.registry
            .register(account_id, Arc::clone(&self.client), self.cancel.clone());

        let session = PromotedSession::new(account_id, Arc::clone(&self.client));
        self.listener.attach(&session).await;

        self.resolve(Ok(Arc::clone(&self.client)));
    }

    /// Mark every chat with pending unread messages as read. Content is
    /// never read or dispatched here; failures are logged and ignored.
    async fn sync_unread(&self) {
        let account_id = self.record.id;
        let chats = match self.client.list_chats().await {
            Ok(chats) => chats,
            Err(err) => {
                warn!(%account_id, %err, "unread sync: listing chats failed");
                return;
            }
        };
        for chat in chats.iter().filter(|chat| chat.unread_count > 0) {
            if let Err(err) = self.client.mark_read(&chat.id).await {
                warn!(%account_id, chat_id = %chat.id, %err, "unread sync: mark read failed");
            }
        }
        debug!(%account_id, "unread sync complete");
    }

    /// Apply a patch to the working copy and persist it. Store failures are
    /// logged, never propagated into transition decisions.
    async fn persist(&mut self, patch: SessionPatch) {
        self.record.apply(&patch);
        if let Err(err) = self.store.update(self.record.id, patch).await {
            error!(account_id = %self.record.id, %err, "failed to persist session update");
        }
    }

    async fn persist_and_broadcast(&mut self, patch: SessionPatch) {
        self.persist(patch).await;
        self.bus.publish(SessionEvent::SessionUpdate {
            session: self.record.clone(),
        });
    }

    /// Resolve the pending creation request. At most one resolution ever
    /// happens; later calls are no-ops.
    fn resolve(&mut self, result: Result<Arc<C>, SessionError>) {
        if let Some(pending) = self.pending.take() {
            let _ = pending.send(result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::fakes::{CountingListener, FakeClient, RecordingStore};
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tokio::sync::broadcast::error::TryRecvError;
    use zapwire_types::client::ChatSummary;
    use zapwire_types::session::AccountId;

    struct Harness {
        client: Arc<FakeClient>,
        store: Arc<RecordingStore>,
        listener: Arc<CountingListener>,
        registry: Arc<SessionRegistry<FakeClient>>,
        bus: EventBus,
        cancel: SessionCancel,
        events: mpsc::UnboundedSender<ClientEvent>,
        // kept alive so monitor restart requests have somewhere to go
        _restart_rx: mpsc::UnboundedReceiver<SessionRecord>,
        resolved: oneshot::Receiver<Result<Arc<FakeClient>, SessionError>>,
    }

    fn spawn_manager(record: SessionRecord) -> Harness {
        spawn_manager_with(record, Arc::new(FakeClient::default()))
    }

    fn spawn_manager_with(record: SessionRecord, client: Arc<FakeClient>) -> Harness {
        let store = Arc::new(RecordingStore::default());
        let listener = Arc::new(CountingListener::default());
        let registry = Arc::new(SessionRegistry::new());
        let bus = EventBus::new(16);
        let cancel = SessionCancel::new();
        let (restart_tx, restart_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (resolve_tx, resolve_rx) = oneshot::channel();

        let deps = SessionDeps {
            registry: Arc::clone(&registry),
            store: Arc::clone(&store),
            listener: Arc::clone(&listener),
            bus: bus.clone(),
            config: LifecycleConfig::default(),
            restart_tx,
        };
        let manager = LifecycleManager::new(
            record,
            Arc::clone(&client),
            cancel.clone(),
            resolve_tx,
            deps,
        );
        tokio::spawn(manager.run(events_rx));

        Harness {
            client,
            store,
            listener,
            registry,
            bus,
            cancel,
            events: events_tx,
            _restart_rx: restart_rx,
            resolved: resolve_rx,
        }
    }

    async fn settle() {
        // paused clock: a tiny sleep lets spawned tasks drain their queues
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    fn record(id: i64) -> SessionRecord {
        SessionRecord::new(AccountId(id), format!("account-{id}"))
    }

    fn connected_patches(store: &RecordingStore, id: AccountId) -> Vec<SessionPatch> {
        store
            .patches_for(id)
            .into_iter()
            .filter(|p| p.status == Some(SessionStatus::Connected))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn qr_event_persists_registers_and_broadcasts() {
        let h = spawn_manager(record(42));
        let mut updates = h.bus.subscribe();

        h.events.send(ClientEvent::Qr("ABC".to_string())).unwrap();
        settle().await;

        let patches = h.store.patches_for(AccountId(42));
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].status, Some(SessionStatus::Qrcode));
        assert_eq!(patches[0].qrcode.as_deref(), Some("ABC"));
        assert_eq!(patches[0].retries, Some(0));

        assert!(h.registry.contains(AccountId(42)));

        let SessionEvent::SessionUpdate { session } = updates.recv().await.unwrap();
        assert_eq!(session.status, SessionStatus::Qrcode);
        assert_eq!(session.qrcode, "ABC");
    }

    #[tokio::test(start_paused = true)]
    async fn ready_before_watchdog_promotes_session() {
        let h = spawn_manager(record(42));
        h.client.chats.lock().unwrap().extend([
            ChatSummary {
                id: "chat-a".to_string(),
                unread_count: 3,
            },
            ChatSummary {
                id: "chat-b".to_string(),
                unread_count: 0,
            },
        ]);

        h.events.send(ClientEvent::Qr("ABC".to_string())).unwrap();
        settle().await;
        h.events.send(ClientEvent::Authenticated).unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;
        h.events.send(ClientEvent::Ready).unwrap();

        let client = h.resolved.await.unwrap().unwrap();
        assert!(Arc::ptr_eq(&client, &h.client));

        let connected = connected_patches(&h.store, AccountId(42));
        assert_eq!(connected.len(), 1);
        assert_eq!(connected[0].qrcode.as_deref(), Some(""));
        assert_eq!(connected[0].retries, Some(0));

        assert_eq!(h.listener.attached.load(Ordering::SeqCst), 1);
        assert_eq!(h.client.presence_calls.load(Ordering::SeqCst), 1);
        // only the chat with unread messages is marked read
        assert_eq!(*h.client.marked_read.lock().unwrap(), vec!["chat-a"]);
        assert!(h.registry.contains(AccountId(42)));
    }

    #[tokio::test(start_paused = true)]
    async fn poller_promotes_when_ready_event_is_dropped() {
        let client = Arc::new(FakeClient::with_state(CONNECTED_STATE));
        let h = spawn_manager_with(record(1), Arc::clone(&client));

        h.events.send(ClientEvent::Authenticated).unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;

        let resolved = h.resolved.await.unwrap();
        assert!(resolved.is_ok());
        assert_eq!(h.listener.attached.load(Ordering::SeqCst), 1);
        assert!(client.query_calls.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn promotion_runs_once_for_poller_and_ready() {
        let client = Arc::new(FakeClient::with_state(CONNECTED_STATE));
        let h = spawn_manager_with(record(1), Arc::clone(&client));

        h.events.send(ClientEvent::Authenticated).unwrap();
        // poller promotes at 1.5s; the late ready event must be a no-op
        tokio::time::sleep(Duration::from_secs(2)).await;
        h.events.send(ClientEvent::Ready).unwrap();
        settle().await;

        assert_eq!(h.listener.attached.load(Ordering::SeqCst), 1);
        assert_eq!(connected_patches(&h.store, AccountId(1)).len(), 1);
        assert!(h.resolved.await.unwrap().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn poll_failures_do_not_stop_the_loop() {
        let client = Arc::new(FakeClient::with_state("PAIRING"));
        client.fail_query.store(true, Ordering::SeqCst);
        let h = spawn_manager_with(record(1), Arc::clone(&client));

        h.events.send(ClientEvent::Authenticated).unwrap();
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(client.query_calls.load(Ordering::SeqCst) >= 3);

        client.fail_query.store(false, Ordering::SeqCst);
        client.set_state(CONNECTED_STATE);
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert!(h.resolved.await.unwrap().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn watchdog_destroys_stuck_client_without_promotion() {
        let client = Arc::new(FakeClient::with_state("PAIRING"));
        let h = spawn_manager_with(record(7), Arc::clone(&client));

        h.events.send(ClientEvent::Qr("QR".to_string())).unwrap();
        settle().await;
        h.events.send(ClientEvent::Authenticated).unwrap();
        tokio::time::sleep(Duration::from_secs(91)).await;

        let err = h.resolved.await.unwrap().unwrap_err();
        assert!(matches!(err, SessionError::StuckAfterAuthentication));

        assert_eq!(client.destroy_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.listener.attached.load(Ordering::SeqCst), 0);
        assert!(!h.registry.contains(AccountId(7)));
        // the record keeps whatever status it had at authentication time
        assert!(connected_patches(&h.store, AccountId(7)).is_empty());
        let patches = h.store.patches_for(AccountId(7));
        assert_eq!(patches.last().unwrap().status, Some(SessionStatus::Qrcode));
    }

    #[tokio::test(start_paused = true)]
    async fn auth_failure_increments_retry_counter() {
        let h = spawn_manager(record(3));

        h.events
            .send(ClientEvent::AuthFailure("denied".to_string()))
            .unwrap();

        let err = h.resolved.await.unwrap().unwrap_err();
        assert!(matches!(err, SessionError::AuthFailure(reason) if reason == "denied"));

        let patches = h.store.patches_for(AccountId(3));
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].status, Some(SessionStatus::Disconnected));
        assert_eq!(patches[0].retries, Some(1));
        assert_eq!(patches[0].credential, None);
    }

    #[tokio::test(start_paused = true)]
    async fn auth_failure_clears_credential_past_threshold() {
        let mut rec = record(3);
        rec.retries = 2;
        rec.credential = "blob".to_string();
        let h = spawn_manager(rec);

        h.events
            .send(ClientEvent::AuthFailure("denied".to_string()))
            .unwrap();
        assert!(h.resolved.await.unwrap().is_err());

        let patches = h.store.patches_for(AccountId(3));
        assert_eq!(patches.len(), 2);
        assert_eq!(patches[0].credential.as_deref(), Some(""));
        assert_eq!(patches[0].retries, Some(0));
        assert_eq!(patches[1].status, Some(SessionStatus::Disconnected));
        assert_eq!(patches[1].retries, Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn early_disconnect_ends_attempt_without_resolution() {
        let h = spawn_manager(record(4));

        h.events.send(ClientEvent::Qr("QR".to_string())).unwrap();
        settle().await;
        h.events
            .send(ClientEvent::Disconnected("NAVIGATION".to_string()))
            .unwrap();
        settle().await;

        // resolver dropped without a value: the service maps this to Terminated
        assert!(h.resolved.await.is_err());
        assert!(!h.registry.contains(AccountId(4)));
        let patches = h.store.patches_for(AccountId(4));
        assert_eq!(
            patches.last().unwrap().status,
            Some(SessionStatus::Disconnected)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn initialization_failure_rejects_pending_request() {
        let client = Arc::new(FakeClient::default());
        *client.init_error.lock().unwrap() =
            Some(zapwire_types::error::ClientError::Command("no browser".to_string()));
        let h = spawn_manager_with(record(5), client);

        let err = h.resolved.await.unwrap().unwrap_err();
        assert!(matches!(err, SessionError::Initialization(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn store_failures_never_block_promotion() {
        let h = spawn_manager(record(6));
        h.store.fail.store(true, Ordering::SeqCst);

        h.events.send(ClientEvent::Qr("QR".to_string())).unwrap();
        settle().await;
        h.events.send(ClientEvent::Authenticated).unwrap();
        settle().await;
        h.events.send(ClientEvent::Ready).unwrap();

        assert!(h.resolved.await.unwrap().is_ok());
        assert_eq!(h.listener.attached.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_detaches_without_destroying() {
        let h = spawn_manager(record(8));

        h.cancel.cancel();
        settle().await;

        assert!(h.resolved.await.is_err());
        assert_eq!(h.client.destroy_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn loading_event_changes_nothing() {
        let h = spawn_manager(record(9));
        let mut updates = h.bus.subscribe();

        h.events
            .send(ClientEvent::Loading {
                percent: 40,
                message: "loading chats".to_string(),
            })
            .unwrap();
        settle().await;

        assert!(h.store.patches_for(AccountId(9)).is_empty());
        assert!(matches!(updates.try_recv(), Err(TryRecvError::Empty)));
    }
}
