//! Post-promotion telemetry monitor.
//!
//! Once a session is promoted, the monitor owns its event stream for the
//! rest of the session's life: it maps connection-state tokens onto the
//! persisted status, records battery telemetry, and -- on disconnect --
//! demotes the session and schedules a single restart of the whole
//! lifecycle. Persistence and broadcast failures in here are caught and
//! logged; they never propagate to the client or crash the process.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::client::ChatClient;
use crate::event::EventBus;
use crate::session::SessionCancel;
use crate::session::registry::SessionRegistry;
use crate::store::SessionStore;
use zapwire_types::client::ClientEvent;
use zapwire_types::event::SessionEvent;
use zapwire_types::session::{SessionPatch, SessionRecord, SessionStatus};

/// Map an external connection-state token onto a persisted status.
///
/// Only a small allow-list of tokens is forwarded downstream; `READY` is
/// folded into `CONNECTED` to avoid churn on an already-connected session.
/// Unlisted tokens (e.g. "PAIRING", "TIMEOUT", "CONFLICT") yield `None` and
/// are never forwarded.
pub fn map_state_token(token: &str) -> Option<SessionStatus> {
    let normalized = token.trim().to_ascii_uppercase();
    let mapped = if normalized == "READY" {
        "CONNECTED"
    } else {
        normalized.as_str()
    };
    match mapped {
        "OPENING" => Some(SessionStatus::Opening),
        "QRCODE" => Some(SessionStatus::Qrcode),
        "AUTHENTICATED" => Some(SessionStatus::Authenticated),
        "CONNECTED" => Some(SessionStatus::Connected),
        _ => None,
    }
}

/// Telemetry listener for one promoted session.
pub struct Monitor<C, S> {
    record: SessionRecord,
    registry: Arc<SessionRegistry<C>>,
    store: Arc<S>,
    bus: EventBus,
    restart_tx: mpsc::UnboundedSender<SessionRecord>,
    restart_delay: Duration,
}

impl<C, S> Monitor<C, S>
where
    C: ChatClient,
    S: SessionStore,
{
    pub fn new(
        record: SessionRecord,
        registry: Arc<SessionRegistry<C>>,
        store: Arc<S>,
        bus: EventBus,
        restart_tx: mpsc::UnboundedSender<SessionRecord>,
        restart_delay: Duration,
    ) -> Self {
        Self {
            record,
            registry,
            store,
            bus,
            restart_tx,
            restart_delay,
        }
    }

    /// Consume the session's event stream until disconnect or cancellation.
    pub async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<ClientEvent>,
        cancel: SessionCancel,
    ) {
        let account_id = self.record.id;
        debug!(%account_id, "monitor attached");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(%account_id, "monitor detached");
                    break;
                }
                maybe_event = events.recv() => match maybe_event {
                    Some(ClientEvent::StateChange(token)) => {
                        self.on_state_change(&token).await;
                    }
                    Some(ClientEvent::BatteryChange { level, plugged }) => {
                        self.on_battery_change(level, plugged).await;
                    }
                    Some(ClientEvent::Disconnected(reason)) => {
                        self.on_disconnected(&reason).await;
                        break;
                    }
                    Some(other) => {
                        debug!(%account_id, event = ?other, "monitor: event ignored");
                    }
                    None => {
                        debug!(%account_id, "monitor: event stream closed");
                        break;
                    }
                },
            }
        }
    }

    async fn on_state_change(&mut self, token: &str) {
        let account_id = self.record.id;
        info!(%account_id, %token, "client state changed");
        let Some(status) = map_state_token(token) else {
            debug!(%account_id, %token, "state token ignored");
            return;
        };
        self.persist_and_broadcast(SessionPatch {
            status: Some(status),
            ..Default::default()
        })
        .await;
    }

    async fn on_battery_change(&mut self, level: u8, plugged: bool) {
        let account_id = self.record.id;
        info!(%account_id, level, plugged, "battery update");
        self.persist_and_broadcast(SessionPatch {
            battery: Some(level),
            plugged: Some(plugged),
            ..Default::default()
        })
        .await;
    }

    /// Demote the session, then mark it as reopening (credential cleared)
    /// and schedule exactly one restart after the configured delay.
    async fn on_disconnected(&mut self, reason: &str) {
        let account_id = self.record.id;
        warn!(%account_id, %reason, "session disconnected");

        self.registry.unregister(account_id);
        self.persist_and_broadcast(SessionPatch {
            status: Some(SessionStatus::Disconnected),
            ..Default::default()
        })
        .await;

        self.persist_and_broadcast(SessionPatch {
            status: Some(SessionStatus::Opening),
            credential: Some(String::new()),
            ..Default::default()
        })
        .await;

        let restart_tx = self.restart_tx.clone();
        let record = self.record.clone();
        let delay = self.restart_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            info!(account_id = %record.id, "requesting session restart");
            if restart_tx.send(record).is_err() {
                warn!("restart channel closed, restart request dropped");
            }
        });
    }

    async fn persist_and_broadcast(&mut self, patch: SessionPatch) {
        self.record.apply(&patch);
        if let Err(err) = self.store.update(self.record.id, patch).await {
            error!(account_id = %self.record.id, %err, "monitor: failed to persist update");
        }
        self.bus.publish(SessionEvent::SessionUpdate {
            session: self.record.clone(),
        });
    }
}
