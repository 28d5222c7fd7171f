//! Process-wide registry of live sessions.
//!
//! Single source of truth for "is this account currently connected". Each
//! entry pairs the client handle with the session's cancellation token so
//! that removal can detach the owning event loop before tearing the client
//! down. At most one entry exists per account at any time; registration is
//! insert-if-absent, which is what enforces the one-manager-per-account
//! ownership rule.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, error, info};

use crate::client::ChatClient;
use crate::session::SessionCancel;
use zapwire_types::error::SessionError;
use zapwire_types::session::AccountId;

struct RegisteredSession<C> {
    client: Arc<C>,
    cancel: SessionCancel,
}

/// Registry mapping account identifiers to live client handles.
pub struct SessionRegistry<C> {
    sessions: DashMap<AccountId, RegisteredSession<C>>,
}

impl<C: ChatClient> SessionRegistry<C> {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Register a session for the account unless one already exists.
    ///
    /// Returns `true` if the entry was inserted. An existing entry is left
    /// untouched -- the first registration wins.
    pub fn register(&self, account_id: AccountId, client: Arc<C>, cancel: SessionCancel) -> bool {
        match self.sessions.entry(account_id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                vacant.insert(RegisteredSession { client, cancel });
                debug!(%account_id, "session registered");
                true
            }
        }
    }

    /// Look up the live client for an account.
    pub fn lookup(&self, account_id: AccountId) -> Result<Arc<C>, SessionError> {
        self.sessions
            .get(&account_id)
            .map(|entry| Arc::clone(&entry.client))
            .ok_or(SessionError::NotInitialized(account_id))
    }

    pub fn contains(&self, account_id: AccountId) -> bool {
        self.sessions.contains_key(&account_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Remove an account's session: detach its event loop, request client
    /// destruction, and drop the entry. Idempotent; destruction failures are
    /// logged, never propagated -- cleanup is best-effort and must not block
    /// registry consistency.
    pub async fn remove(&self, account_id: AccountId) {
        let Some((_, session)) = self.sessions.remove(&account_id) else {
            return;
        };
        session.cancel.cancel();
        if let Err(err) = session.client.destroy().await {
            error!(%account_id, %err, "error destroying removed session");
        }
        info!(%account_id, "session removed");
    }

    /// Drop the map entry without touching the client. Used by disconnect
    /// transitions where the handle is already dead.
    pub fn unregister(&self, account_id: AccountId) -> bool {
        let removed = self.sessions.remove(&account_id).is_some();
        if removed {
            debug!(%account_id, "session unregistered");
        }
        removed
    }
}

impl<C: ChatClient> Default for SessionRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> std::fmt::Debug for SessionRegistry<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.sessions.len())
            .finish()
    }
}
