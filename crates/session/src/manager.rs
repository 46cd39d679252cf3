use crate::error::{Result, SessionError};
use crate::geo::GeoLocator;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use devtrust_channel::{HardwareLookup, RevocationBus};
use devtrust_database::SessionStore;
use devtrust_models::{
    DeviceSignals, HardwareProfile, NewSession, RevocationSignal, Role, Session, TokenPolicy,
};
use devtrust_policy::compute_policy;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Heartbeats for one (user, device) reach the store at most once per this
/// window; anything more frequent is dropped in-process.
const HEARTBEAT_THROTTLE: std::time::Duration = std::time::Duration::from_secs(60);

/// The authenticated principal performing an operation, as asserted by the
/// identity provider.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

impl Actor {
    /// Owners may revoke their own devices; admin roles may revoke anyone's.
    fn may_revoke(&self, target_user: Uuid) -> bool {
        self.user_id == target_user || self.role.is_admin()
    }
}

#[derive(Debug, Clone)]
pub struct RegisterOutcome {
    pub session: Session,
    pub is_new_device: bool,
    pub policy: TokenPolicy,
}

/// Orchestrates register / heartbeat / revoke / trust against the session
/// store. The only writer of session rows.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    bus: Arc<dyn RevocationBus>,
    geo: Option<GeoLocator>,
    ip_salt: String,
    last_touch: Mutex<HashMap<(Uuid, String), Instant>>,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn SessionStore>,
        bus: Arc<dyn RevocationBus>,
        geo: Option<GeoLocator>,
        ip_salt: impl Into<String>,
    ) -> Self {
        Self {
            store,
            bus,
            geo,
            ip_salt: ip_salt.into(),
            last_touch: Mutex::new(HashMap::new()),
        }
    }

    /// Register (or re-register) the calling device.
    ///
    /// Device identity is resolved first; a row is only written once the
    /// full identity is known. Geolocation is best-effort and never blocks
    /// registration. The upsert is idempotent, so a superseded concurrent
    /// register for the same device is harmless — the later write wins by
    /// `last_activity` ordering.
    pub async fn register(
        &self,
        user_id: Uuid,
        role: Role,
        signals: &DeviceSignals,
        client_ip: Option<&str>,
        mfa_satisfied: bool,
    ) -> Result<RegisterOutcome> {
        let identity = devtrust_device::resolve(signals)?;

        let prior = self.store.find(user_id, &identity.stable_id).await?;
        let is_new_device = prior.is_none();
        let is_device_trusted = prior
            .as_ref()
            .map(|s| s.is_trusted && s.is_active)
            .unwrap_or(false);

        let policy = compute_policy(role, is_new_device, is_device_trusted);
        let expires_at = Utc::now() + Duration::minutes(policy.lifetime_minutes);

        let geo = match (client_ip, &self.geo) {
            (Some(ip), Some(locator)) => locator.lookup(ip).await,
            _ => None,
        };

        let new_session = NewSession {
            user_id,
            device_stable_id: identity.stable_id.clone(),
            device_fingerprint: identity.fingerprint.clone(),
            operating_system: identity.operating_system.clone(),
            screen_resolution: identity.screen_resolution.clone(),
            platform: identity.platform.clone(),
            device_type: identity.device_type.clone(),
            browser_name: identity.browser_name.clone(),
            ip_hash: client_ip.map(|ip| hash_ip(&self.ip_salt, ip)),
            city: geo.as_ref().and_then(|g| g.city.clone()),
            country: geo.as_ref().and_then(|g| g.country.clone()),
            mfa_enabled: mfa_satisfied,
            expires_at,
        };

        let session = self.store.upsert(&new_session).await?;

        tracing::info!(
            %user_id,
            device = %identity.stable_id,
            is_new_device,
            lifetime_minutes = policy.lifetime_minutes,
            "session registered"
        );

        Ok(RegisterOutcome {
            session,
            is_new_device,
            policy,
        })
    }

    /// Record activity for a live session.
    ///
    /// Throttled per (user, device); duplicate heartbeats inside the window
    /// never reach the store. Store failures are logged and swallowed — the
    /// client retries on its next interval and the user never sees them.
    pub async fn heartbeat(&self, user_id: Uuid, device_stable_id: &str) {
        {
            let mut last_touch = self.last_touch.lock().await;
            // Stale entries are evicted first, so the map never holds more
            // than the devices active within one throttle window.
            last_touch.retain(|_, last| last.elapsed() < HEARTBEAT_THROTTLE);

            let key = (user_id, device_stable_id.to_string());
            if last_touch.contains_key(&key) {
                return;
            }
            last_touch.insert(key, Instant::now());
        }

        if let Err(e) = self.store.touch(user_id, device_stable_id).await {
            tracing::warn!(%user_id, device = %device_stable_id, error = %e,
                "heartbeat touch failed; will retry on next interval");
        }
    }

    /// Revoke the session on one of a user's devices.
    ///
    /// Authorization is checked before any mutation. On success the row is
    /// deactivated and a revocation signal is broadcast to every live client
    /// of the user.
    pub async fn revoke(
        &self,
        user_id: Uuid,
        device_stable_id: &str,
        actor: Actor,
    ) -> Result<()> {
        if !actor.may_revoke(user_id) {
            return Err(SessionError::Unauthorized(format!(
                "actor {} may not revoke sessions of user {}",
                actor.user_id, user_id
            )));
        }

        let deactivated = self.store.deactivate(user_id, device_stable_id).await?;
        if !deactivated {
            return Err(SessionError::NotFound(format!(
                "no active session for device {}",
                device_stable_id
            )));
        }

        let signal = RevocationSignal::new(user_id, device_stable_id);
        if let Err(e) = self.bus.publish(&signal).await {
            // The row is already deactivated; clients fall back to expiry.
            tracing::error!(%user_id, device = %device_stable_id, error = %e,
                "failed to broadcast revocation signal");
        }

        tracing::info!(%user_id, device = %device_stable_id, actor = %actor.user_id,
            "session revoked");

        Ok(())
    }

    /// Elevate a device to trusted. `NotFound` when the row does not exist.
    pub async fn trust_device(&self, user_id: Uuid, device_stable_id: &str) -> Result<Session> {
        let session = self.store.trust(user_id, device_stable_id).await?;

        tracing::info!(%user_id, device = %device_stable_id, "device trusted");

        Ok(session)
    }

    /// All active sessions for a user, most recently active first.
    pub async fn list_sessions(&self, user_id: Uuid) -> Result<Vec<Session>> {
        Ok(self.store.list_active(user_id).await?)
    }

    /// Best-effort repair of malformed descriptor fields. Never fails the
    /// caller; only reports the number of rows fixed.
    pub async fn normalize(&self) -> u64 {
        match self.store.normalize().await {
            Ok(fixed) => {
                if fixed > 0 {
                    tracing::info!(fixed, "normalized malformed session rows");
                }
                fixed
            }
            Err(e) => {
                tracing::warn!(error = %e, "session normalize pass failed");
                0
            }
        }
    }
}

/// Salted hash of a client IP. The raw address never reaches the store.
pub fn hash_ip(salt: &str, ip: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b"|");
    hasher.update(ip.trim().as_bytes());
    hex::encode(hasher.finalize())
}

/// [`HardwareLookup`] over the session store, used by the revocation
/// fallback matcher.
pub struct StoreHardwareLookup {
    store: Arc<dyn SessionStore>,
}

impl StoreHardwareLookup {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl HardwareLookup for StoreHardwareLookup {
    async fn hardware_profile(
        &self,
        user_id: Uuid,
        device_stable_id: &str,
    ) -> devtrust_channel::Result<Option<HardwareProfile>> {
        let session = self
            .store
            .find(user_id, device_stable_id)
            .await
            .map_err(|e| devtrust_channel::ChannelError::Internal(e.to_string()))?;

        Ok(session.map(|s| s.hardware_profile()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devtrust_channel::LocalRevocationBus;
    use devtrust_database::MemorySessionStore;

    const CHROME_WIN: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                              (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

    fn signals() -> DeviceSignals {
        DeviceSignals {
            user_agent: CHROME_WIN.to_string(),
            screen_width: 1920,
            screen_height: 1080,
            platform: "Win32".to_string(),
            timezone: Some("UTC".to_string()),
            cookies_enabled: true,
        }
    }

    fn other_signals() -> DeviceSignals {
        DeviceSignals {
            screen_width: 2560,
            screen_height: 1440,
            ..signals()
        }
    }

    fn manager() -> (SessionManager, Arc<LocalRevocationBus>) {
        let store = Arc::new(MemorySessionStore::new());
        let bus = Arc::new(LocalRevocationBus::default());
        let manager = SessionManager::new(store, bus.clone(), None, "test-salt");
        (manager, bus)
    }

    #[tokio::test]
    async fn first_registration_is_new_device() {
        let (manager, _bus) = manager();
        let user = Uuid::new_v4();

        let outcome = manager
            .register(user, Role::User, &signals(), Some("203.0.113.9"), false)
            .await
            .unwrap();

        assert!(outcome.is_new_device);
        assert_eq!(outcome.policy.lifetime_minutes, 20);
        assert!(outcome.session.is_active);
        // Raw IP never stored, only the salted hash.
        let ip_hash = outcome.session.ip_hash.unwrap();
        assert_ne!(ip_hash, "203.0.113.9");
        assert_eq!(ip_hash, hash_ip("test-salt", "203.0.113.9"));
    }

    #[tokio::test]
    async fn repeated_registration_converges_and_loses_novelty() {
        let (manager, _bus) = manager();
        let user = Uuid::new_v4();

        let first = manager
            .register(user, Role::User, &signals(), None, false)
            .await
            .unwrap();
        let second = manager
            .register(user, Role::User, &signals(), None, false)
            .await
            .unwrap();

        assert!(first.is_new_device);
        assert!(!second.is_new_device);
        assert_eq!(first.session.id, second.session.id);
        assert_eq!(manager.list_sessions(user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn registering_one_device_never_touches_another() {
        let (manager, _bus) = manager();
        let user = Uuid::new_v4();

        let a = manager
            .register(user, Role::User, &signals(), None, false)
            .await
            .unwrap();
        manager
            .register(user, Role::User, &other_signals(), None, false)
            .await
            .unwrap();

        let sessions = manager.list_sessions(user).await.unwrap();
        assert_eq!(sessions.len(), 2);
        let a_after = sessions
            .iter()
            .find(|s| s.id == a.session.id)
            .expect("device A row still present");
        assert!(a_after.is_active);
    }

    #[tokio::test]
    async fn trusted_device_earns_longer_lifetime_on_reregistration() {
        let (manager, _bus) = manager();
        let user = Uuid::new_v4();

        let first = manager
            .register(user, Role::User, &signals(), None, false)
            .await
            .unwrap();
        manager
            .trust_device(user, &first.session.device_stable_id)
            .await
            .unwrap();

        let second = manager
            .register(user, Role::User, &signals(), None, false)
            .await
            .unwrap();

        assert!(second.policy.is_device_trusted);
        assert_eq!(second.policy.lifetime_minutes, 30);
        // Trust survived the upsert.
        assert!(second.session.is_trusted);
    }

    #[tokio::test]
    async fn invalid_signals_store_nothing() {
        let (manager, _bus) = manager();
        let user = Uuid::new_v4();

        let mut bad = signals();
        bad.user_agent = " ".to_string();

        let err = manager
            .register(user, Role::User, &bad, None, false)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidSignals(_)));
        assert!(manager.list_sessions(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn admin_revocation_deactivates_emits_signal_and_kills_heartbeat() {
        let (manager, bus) = manager();
        let user = Uuid::new_v4();
        let admin = Actor {
            user_id: Uuid::new_v4(),
            role: Role::Admin,
        };

        let outcome = manager
            .register(user, Role::User, &signals(), None, false)
            .await
            .unwrap();
        let device = outcome.session.device_stable_id.clone();

        manager.heartbeat(user, &device).await;
        manager.heartbeat(user, &device).await;

        let mut sub = bus.subscribe(user).await.unwrap();
        manager.revoke(user, &device, admin).await.unwrap();

        let signal = sub.recv().await.unwrap();
        assert_eq!(signal.device_stable_id, device);

        // Row is gone from the active set and a late heartbeat does not
        // resurrect it.
        assert!(manager.list_sessions(user).await.unwrap().is_empty());
        manager.heartbeat(user, &device).await;
        assert!(manager.list_sessions(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn owner_may_revoke_their_other_device() {
        let (manager, _bus) = manager();
        let user = Uuid::new_v4();

        let outcome = manager
            .register(user, Role::User, &signals(), None, false)
            .await
            .unwrap();
        let owner = Actor {
            user_id: user,
            role: Role::User,
        };

        manager
            .revoke(user, &outcome.session.device_stable_id, owner)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unauthorized_revocation_mutates_nothing() {
        let (manager, _bus) = manager();
        let user = Uuid::new_v4();
        let stranger = Actor {
            user_id: Uuid::new_v4(),
            role: Role::User,
        };

        let outcome = manager
            .register(user, Role::User, &signals(), None, false)
            .await
            .unwrap();

        let err = manager
            .revoke(user, &outcome.session.device_stable_id, stranger)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Unauthorized(_)));

        // Authorization is checked before the store is touched.
        assert_eq!(manager.list_sessions(user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn revoking_missing_device_is_not_found() {
        let (manager, _bus) = manager();
        let user = Uuid::new_v4();
        let owner = Actor {
            user_id: user,
            role: Role::User,
        };

        let err = manager.revoke(user, "ghost-device", owner).await.unwrap_err();
        assert!(matches!(err, SessionError::NotFound(_)));
    }

    #[tokio::test]
    async fn trusting_missing_device_is_not_found_and_changes_nothing() {
        let (manager, _bus) = manager();
        let user = Uuid::new_v4();

        manager
            .register(user, Role::User, &signals(), None, false)
            .await
            .unwrap();

        let err = manager.trust_device(user, "ghost-device").await.unwrap_err();
        assert!(matches!(err, SessionError::NotFound(_)));

        let sessions = manager.list_sessions(user).await.unwrap();
        assert!(!sessions[0].is_trusted);
    }

    #[tokio::test]
    async fn heartbeat_is_throttled_within_the_window() {
        let (manager, _bus) = manager();
        let user = Uuid::new_v4();

        let outcome = manager
            .register(user, Role::User, &signals(), None, false)
            .await
            .unwrap();
        let device = outcome.session.device_stable_id.clone();

        manager.heartbeat(user, &device).await;
        let after_first = manager.list_sessions(user).await.unwrap()[0].last_activity;

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        manager.heartbeat(user, &device).await;
        let after_second = manager.list_sessions(user).await.unwrap()[0].last_activity;

        // The second heartbeat fell inside the throttle window and never
        // reached the store.
        assert_eq!(after_first, after_second);
    }

    #[tokio::test]
    async fn heartbeat_map_drops_entries_outside_the_window() {
        let (manager, _bus) = manager();
        let user = Uuid::new_v4();

        let stale = Instant::now() - (HEARTBEAT_THROTTLE + std::time::Duration::from_secs(1));
        manager
            .last_touch
            .lock()
            .await
            .insert((user, "long-gone-device".to_string()), stale);

        let outcome = manager
            .register(user, Role::User, &signals(), None, false)
            .await
            .unwrap();
        manager
            .heartbeat(user, &outcome.session.device_stable_id)
            .await;

        let map = manager.last_touch.lock().await;
        assert!(!map.contains_key(&(user, "long-gone-device".to_string())));
        assert_eq!(map.len(), 1);
    }

    #[tokio::test]
    async fn trust_must_be_re_earned_after_deactivation() {
        let store = Arc::new(MemorySessionStore::new());
        let bus = Arc::new(LocalRevocationBus::default());
        let manager = SessionManager::new(store.clone(), bus, None, "salt");
        let user = Uuid::new_v4();

        let first = manager
            .register(user, Role::User, &signals(), None, false)
            .await
            .unwrap();
        let device = first.session.device_stable_id.clone();
        manager.trust_device(user, &device).await.unwrap();

        // Expiry sweep or revocation deactivates the row.
        store.deactivate(user, &device).await.unwrap();

        let again = manager
            .register(user, Role::User, &signals(), None, false)
            .await
            .unwrap();

        // The device is still known, but its trust ended with the old row.
        assert!(!again.is_new_device);
        assert!(!again.session.is_trusted);
        assert!(!again.policy.is_device_trusted);
        assert_eq!(again.policy.lifetime_minutes, 20);
    }

    #[tokio::test]
    async fn hardware_lookup_reads_stored_descriptors() {
        let store = Arc::new(MemorySessionStore::new());
        let bus = Arc::new(LocalRevocationBus::default());
        let manager = SessionManager::new(store.clone(), bus, None, "salt");
        let user = Uuid::new_v4();

        let outcome = manager
            .register(user, Role::User, &signals(), None, false)
            .await
            .unwrap();

        let lookup = StoreHardwareLookup::new(store);
        let profile = lookup
            .hardware_profile(user, &outcome.session.device_stable_id)
            .await
            .unwrap()
            .expect("profile present");

        assert_eq!(profile.screen_resolution, "1920x1080");
        assert!(lookup
            .hardware_profile(user, "ghost-device")
            .await
            .unwrap()
            .is_none());
    }
}
