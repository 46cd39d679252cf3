use crate::error::Result;
use async_trait::async_trait;
use devtrust_models::{NewSession, Session};
use uuid::Uuid;

/// Authoritative store of session rows, one per (user, device).
///
/// The row identified by (`user_id`, `device_stable_id`) is the unit of
/// contention: every mutating operation must be one atomic write, never a
/// read-modify-write cycle, so concurrent heartbeats and revocations cannot
/// lose updates.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert a session, or update the mutable fields of the existing active
    /// row for the same (user, device) in place. `is_trusted` survives the
    /// update; it only ever transitions via [`trust`](Self::trust).
    async fn upsert(&self, new_session: &NewSession) -> Result<Session>;

    /// All active sessions for a user, most recently active first.
    async fn list_active(&self, user_id: Uuid) -> Result<Vec<Session>>;

    /// Latest session row for a (user, device) pair, active or not.
    async fn find(&self, user_id: Uuid, device_stable_id: &str) -> Result<Option<Session>>;

    /// Update `last_activity` to now. Silently a no-op when no active row
    /// matches; duplicate heartbeats must not surface errors.
    async fn touch(&self, user_id: Uuid, device_stable_id: &str) -> Result<()>;

    /// Deactivate the active row for (user, device). Returns whether a row
    /// was affected.
    async fn deactivate(&self, user_id: Uuid, device_stable_id: &str) -> Result<bool>;

    /// Mark the device as trusted. Fails with `NotFound` when no row exists
    /// for the pair.
    async fn trust(&self, user_id: Uuid, device_stable_id: &str) -> Result<Session>;

    /// Deactivate every active row whose expiry has passed, in one atomic
    /// predicate update. Idempotent: a second immediate run affects zero
    /// rows.
    async fn sweep_expired(&self) -> Result<u64>;

    /// Repair previously malformed descriptor fields (empty strings) to the
    /// canonical "Unknown" value. Returns the number of rows fixed.
    async fn normalize(&self) -> Result<u64>;
}
