use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::device::HardwareProfile;

/// One row per (user, device). At most one active row exists for a given
/// (`user_id`, `device_stable_id`) pair; re-registration updates in place.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,

    /// Stable across browsers and reinstalls on the same physical device.
    pub device_stable_id: String,
    /// Finer-grained hash including browser-level detail.
    pub device_fingerprint: String,

    // Hardware descriptors
    pub operating_system: String,
    pub screen_resolution: String,
    pub platform: String,
    pub device_type: String,
    pub browser_name: String,

    /// Salted hash of the client IP. The raw address is never stored.
    pub ip_hash: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,

    pub is_trusted: bool,
    pub is_active: bool,
    pub mfa_enabled: bool,

    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn hardware_profile(&self) -> HardwareProfile {
        HardwareProfile {
            operating_system: self.operating_system.clone(),
            screen_resolution: self.screen_resolution.clone(),
            platform: self.platform.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSession {
    pub user_id: Uuid,
    pub device_stable_id: String,
    pub device_fingerprint: String,
    pub operating_system: String,
    pub screen_resolution: String,
    pub platform: String,
    pub device_type: String,
    pub browser_name: String,
    pub ip_hash: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub mfa_enabled: bool,
    pub expires_at: DateTime<Utc>,
}
