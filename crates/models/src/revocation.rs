use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ephemeral broadcast event instructing clients of a user to terminate the
/// session on the targeted device. Never persisted; its lifecycle ends once
/// broadcast. Delivery is at-least-once, so receipt must be idempotent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevocationSignal {
    pub user_id: Uuid,
    pub device_stable_id: String,
    pub issued_at: DateTime<Utc>,
}

impl RevocationSignal {
    pub fn new(user_id: Uuid, device_stable_id: impl Into<String>) -> Self {
        Self {
            user_id,
            device_stable_id: device_stable_id.into(),
            issued_at: Utc::now(),
        }
    }
}
