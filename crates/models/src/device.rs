use serde::{Deserialize, Serialize};
use validator::Validate;

/// Client-observable signals supplied at registration time.
///
/// All "browser state" is passed in explicitly; the resolver never reads
/// ambient globals or performs network calls.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DeviceSignals {
    #[validate(length(min = 1))]
    pub user_agent: String,

    pub screen_width: u32,
    pub screen_height: u32,

    /// Platform string as reported by the client (e.g. "Win32", "MacIntel").
    pub platform: String,

    pub timezone: Option<String>,

    #[serde(default)]
    pub cookies_enabled: bool,
}

impl DeviceSignals {
    pub fn screen_resolution(&self) -> String {
        format!("{}x{}", self.screen_width, self.screen_height)
    }
}

/// Identifiers and descriptors derived from [`DeviceSignals`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// Hardware-level hash, identical across browsers on the same device.
    pub stable_id: String,
    /// Browser-level hash, used for fast equality checks only.
    pub fingerprint: String,

    pub operating_system: String,
    pub screen_resolution: String,
    pub platform: String,
    pub device_type: String,
    pub browser_name: String,
}

/// The three hardware descriptors used by the revocation fallback matcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareProfile {
    pub operating_system: String,
    pub screen_resolution: String,
    pub platform: String,
}

impl HardwareProfile {
    /// Case-insensitive, whitespace-trimmed comparison of all three
    /// descriptors.
    pub fn matches(&self, other: &HardwareProfile) -> bool {
        fn eq(a: &str, b: &str) -> bool {
            a.trim().eq_ignore_ascii_case(b.trim())
        }

        eq(&self.operating_system, &other.operating_system)
            && eq(&self.screen_resolution, &other.screen_resolution)
            && eq(&self.platform, &other.platform)
    }
}
