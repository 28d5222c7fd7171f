//! Session store port.

use zapwire_types::error::StoreError;
use zapwire_types::session::{AccountId, SessionPatch};

/// Persistence collaborator for session records.
///
/// Implementations live in zapwire-infra (e.g. `SqliteSessionStore`).
/// `update` must be safe to call with any subset of fields set in the patch.
/// Callers treat failures as transient telemetry failures: logged, never
/// retried synchronously, never allowed to alter a transition decision.
pub trait SessionStore: Send + Sync {
    fn update(
        &self,
        account_id: AccountId,
        patch: SessionPatch,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;
}
