use serde::{Deserialize, Serialize};

use crate::role::Role;

/// Token lifetime decision, derived per issuance and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPolicy {
    pub role: Role,
    pub lifetime_minutes: i64,
    pub requires_mfa: bool,
    pub is_new_device: bool,
    pub is_device_trusted: bool,
}
