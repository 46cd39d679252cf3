//! In-memory session store.
//!
//! Mirrors the Postgres backend's semantics without external infrastructure,
//! for tests and single-node deployments. Each operation takes the write
//! lock once, so per-row updates stay atomic with respect to each other.

use crate::error::{DatabaseError, Result};
use crate::store::SessionStore;
use async_trait::async_trait;
use chrono::Utc;
use devtrust_models::{NewSession, Session};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct MemorySessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, Session>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_poisoned() -> DatabaseError {
        DatabaseError::Internal("session store lock poisoned".to_string())
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn upsert(&self, new_session: &NewSession) -> Result<Session> {
        let mut sessions = self.sessions.write().map_err(|_| Self::lock_poisoned())?;
        let now = Utc::now();

        let existing = sessions.values_mut().find(|s| {
            s.is_active
                && s.user_id == new_session.user_id
                && s.device_stable_id == new_session.device_stable_id
        });

        if let Some(session) = existing {
            session.device_fingerprint = new_session.device_fingerprint.clone();
            session.operating_system = new_session.operating_system.clone();
            session.screen_resolution = new_session.screen_resolution.clone();
            session.platform = new_session.platform.clone();
            session.device_type = new_session.device_type.clone();
            session.browser_name = new_session.browser_name.clone();
            session.ip_hash = new_session.ip_hash.clone();
            if new_session.city.is_some() {
                session.city = new_session.city.clone();
            }
            if new_session.country.is_some() {
                session.country = new_session.country.clone();
            }
            session.mfa_enabled = new_session.mfa_enabled;
            session.last_activity = now;
            session.expires_at = new_session.expires_at;
            // is_trusted is deliberately left alone.
            return Ok(session.clone());
        }

        let session = Session {
            id: Uuid::new_v4(),
            user_id: new_session.user_id,
            device_stable_id: new_session.device_stable_id.clone(),
            device_fingerprint: new_session.device_fingerprint.clone(),
            operating_system: new_session.operating_system.clone(),
            screen_resolution: new_session.screen_resolution.clone(),
            platform: new_session.platform.clone(),
            device_type: new_session.device_type.clone(),
            browser_name: new_session.browser_name.clone(),
            ip_hash: new_session.ip_hash.clone(),
            city: new_session.city.clone(),
            country: new_session.country.clone(),
            is_trusted: false,
            is_active: true,
            mfa_enabled: new_session.mfa_enabled,
            created_at: now,
            last_activity: now,
            expires_at: new_session.expires_at,
        };

        sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn list_active(&self, user_id: Uuid) -> Result<Vec<Session>> {
        let sessions = self.sessions.read().map_err(|_| Self::lock_poisoned())?;

        let mut active: Vec<Session> = sessions
            .values()
            .filter(|s| s.is_active && s.user_id == user_id)
            .cloned()
            .collect();
        active.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));

        Ok(active)
    }

    async fn find(&self, user_id: Uuid, device_stable_id: &str) -> Result<Option<Session>> {
        let sessions = self.sessions.read().map_err(|_| Self::lock_poisoned())?;

        let mut candidates: Vec<&Session> = sessions
            .values()
            .filter(|s| s.user_id == user_id && s.device_stable_id == device_stable_id)
            .collect();
        candidates.sort_by_key(|s| (s.is_active, s.last_activity));

        Ok(candidates.last().map(|s| (*s).clone()))
    }

    async fn touch(&self, user_id: Uuid, device_stable_id: &str) -> Result<()> {
        let mut sessions = self.sessions.write().map_err(|_| Self::lock_poisoned())?;

        if let Some(session) = sessions.values_mut().find(|s| {
            s.is_active && s.user_id == user_id && s.device_stable_id == device_stable_id
        }) {
            session.last_activity = Utc::now();
        }

        Ok(())
    }

    async fn deactivate(&self, user_id: Uuid, device_stable_id: &str) -> Result<bool> {
        let mut sessions = self.sessions.write().map_err(|_| Self::lock_poisoned())?;

        if let Some(session) = sessions.values_mut().find(|s| {
            s.is_active && s.user_id == user_id && s.device_stable_id == device_stable_id
        }) {
            session.is_active = false;
            session.last_activity = Utc::now();
            return Ok(true);
        }

        Ok(false)
    }

    async fn trust(&self, user_id: Uuid, device_stable_id: &str) -> Result<Session> {
        let mut sessions = self.sessions.write().map_err(|_| Self::lock_poisoned())?;

        let session = sessions
            .values_mut()
            .find(|s| {
                s.is_active && s.user_id == user_id && s.device_stable_id == device_stable_id
            })
            .ok_or_else(|| DatabaseError::not_found("session", device_stable_id))?;

        session.is_trusted = true;
        session.last_activity = Utc::now();
        Ok(session.clone())
    }

    async fn sweep_expired(&self) -> Result<u64> {
        let mut sessions = self.sessions.write().map_err(|_| Self::lock_poisoned())?;
        let now = Utc::now();

        let mut swept = 0;
        for session in sessions.values_mut() {
            if session.is_active && session.expires_at < now {
                session.is_active = false;
                swept += 1;
            }
        }

        Ok(swept)
    }

    async fn normalize(&self) -> Result<u64> {
        let mut sessions = self.sessions.write().map_err(|_| Self::lock_poisoned())?;

        let mut fixed = 0;
        for session in sessions.values_mut() {
            let mut touched = false;

            if session.operating_system.trim().is_empty() {
                session.operating_system = "Unknown".to_string();
                touched = true;
            }
            if session.browser_name.trim().is_empty() {
                session.browser_name = "Unknown".to_string();
                touched = true;
            }
            if session.device_type.trim().is_empty() {
                session.device_type = "desktop".to_string();
                touched = true;
            }
            if session.city.as_deref().is_some_and(|c| c.trim().is_empty()) {
                session.city = None;
                touched = true;
            }
            if session
                .country
                .as_deref()
                .is_some_and(|c| c.trim().is_empty())
            {
                session.country = None;
                touched = true;
            }

            if touched {
                fixed += 1;
            }
        }

        Ok(fixed)
    }
}
