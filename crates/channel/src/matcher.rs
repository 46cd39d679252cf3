//! Client-side matching of revocation signals against the local device.
//!
//! The stable id is computed without the browser name, so one signal is
//! meant to take down every browser on the targeted machine. When the direct
//! id comparison misses, the matcher falls back to comparing the revoked
//! session's *stored* hardware descriptors against the local ones — the
//! stored row is always consulted before destructive action, never the
//! signal's id alone.

use crate::error::Result;
use async_trait::async_trait;
use devtrust_models::{HardwareProfile, RevocationSignal};
use uuid::Uuid;

/// Identity of the device this client is running on.
#[derive(Debug, Clone)]
pub struct LocalDevice {
    pub stable_id: String,
    pub hardware: HardwareProfile,
}

/// Lookup of the stored hardware descriptors for a revoked session.
///
/// Backed by the session store on the server; clients reach it through the
/// session-listing API.
#[async_trait]
pub trait HardwareLookup: Send + Sync {
    async fn hardware_profile(
        &self,
        user_id: Uuid,
        device_stable_id: &str,
    ) -> Result<Option<HardwareProfile>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchDecision {
    /// Signal's stable id equals the local device's.
    DirectMatch,
    /// Stable ids differ but all three stored hardware descriptors match:
    /// same physical device, different browser.
    HardwareMatch,
    /// Signal targets some other device; no action.
    NoMatch,
}

impl MatchDecision {
    pub fn should_terminate(&self) -> bool {
        !matches!(self, MatchDecision::NoMatch)
    }
}

/// Decide whether `signal` targets `local`.
///
/// Step 1: direct stable-id comparison (case-insensitive, trimmed).
/// Step 2: only on a miss, fetch the revoked session's hardware descriptors
/// and require all three to match. Lookup failures resolve to `NoMatch`;
/// terminating a session on unverifiable evidence is worse than delivering
/// the signal again later (delivery is at-least-once).
pub async fn evaluate(
    signal: &RevocationSignal,
    local: &LocalDevice,
    lookup: &dyn HardwareLookup,
) -> MatchDecision {
    let signal_id = signal.device_stable_id.trim();
    let local_id = local.stable_id.trim();

    if signal_id.eq_ignore_ascii_case(local_id) {
        return MatchDecision::DirectMatch;
    }

    let stored = match lookup
        .hardware_profile(signal.user_id, &signal.device_stable_id)
        .await
    {
        Ok(profile) => profile,
        Err(e) => {
            tracing::warn!(error = %e, "hardware lookup failed; ignoring signal");
            return MatchDecision::NoMatch;
        }
    };

    match stored {
        Some(profile) if profile.matches(&local.hardware) => MatchDecision::HardwareMatch,
        _ => MatchDecision::NoMatch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChannelError;
    use std::collections::HashMap;

    struct FixedLookup {
        profiles: HashMap<String, HardwareProfile>,
        fail: bool,
    }

    #[async_trait]
    impl HardwareLookup for FixedLookup {
        async fn hardware_profile(
            &self,
            _user_id: Uuid,
            device_stable_id: &str,
        ) -> Result<Option<HardwareProfile>> {
            if self.fail {
                return Err(ChannelError::Internal("lookup down".to_string()));
            }
            Ok(self.profiles.get(device_stable_id).cloned())
        }
    }

    fn windows_profile() -> HardwareProfile {
        HardwareProfile {
            operating_system: "Windows".to_string(),
            screen_resolution: "1920x1080".to_string(),
            platform: "Win32".to_string(),
        }
    }

    fn local(stable_id: &str) -> LocalDevice {
        LocalDevice {
            stable_id: stable_id.to_string(),
            hardware: windows_profile(),
        }
    }

    fn lookup_with(device: &str, profile: HardwareProfile) -> FixedLookup {
        FixedLookup {
            profiles: HashMap::from([(device.to_string(), profile)]),
            fail: false,
        }
    }

    #[tokio::test]
    async fn direct_match_is_case_insensitive_and_trimmed() {
        let signal = RevocationSignal::new(Uuid::new_v4(), "  ABCDEF123  ");
        let lookup = FixedLookup {
            profiles: HashMap::new(),
            fail: false,
        };

        let decision = evaluate(&signal, &local("abcdef123"), &lookup).await;
        assert_eq!(decision, MatchDecision::DirectMatch);
        assert!(decision.should_terminate());
    }

    #[tokio::test]
    async fn hardware_fallback_matches_identical_descriptors() {
        let signal = RevocationSignal::new(Uuid::new_v4(), "other-browser-id");
        let lookup = lookup_with("other-browser-id", windows_profile());

        let decision = evaluate(&signal, &local("my-id"), &lookup).await;
        assert_eq!(decision, MatchDecision::HardwareMatch);
    }

    #[tokio::test]
    async fn hardware_fallback_rejects_when_any_descriptor_differs() {
        let signal = RevocationSignal::new(Uuid::new_v4(), "other-id");

        for (field, value) in [
            ("os", "macOS"),
            ("screen", "2560x1440"),
            ("platform", "MacIntel"),
        ] {
            let mut profile = windows_profile();
            match field {
                "os" => profile.operating_system = value.to_string(),
                "screen" => profile.screen_resolution = value.to_string(),
                _ => profile.platform = value.to_string(),
            }
            let lookup = lookup_with("other-id", profile);

            let decision = evaluate(&signal, &local("my-id"), &lookup).await;
            assert_eq!(decision, MatchDecision::NoMatch, "field: {}", field);
        }
    }

    #[tokio::test]
    async fn missing_stored_session_means_no_match() {
        let signal = RevocationSignal::new(Uuid::new_v4(), "gone-id");
        let lookup = FixedLookup {
            profiles: HashMap::new(),
            fail: false,
        };

        let decision = evaluate(&signal, &local("my-id"), &lookup).await;
        assert_eq!(decision, MatchDecision::NoMatch);
    }

    #[tokio::test]
    async fn lookup_failure_never_terminates() {
        let signal = RevocationSignal::new(Uuid::new_v4(), "other-id");
        let lookup = FixedLookup {
            profiles: HashMap::new(),
            fail: true,
        };

        let decision = evaluate(&signal, &local("my-id"), &lookup).await;
        assert_eq!(decision, MatchDecision::NoMatch);
    }
}
