//! Ordered local teardown after a revocation signal matches.
//!
//! The sequence is strict: user notification, local credential invalidation,
//! closing every other open client context, and only then the remote
//! sign-out call. A remote failure must never leave the client half-revoked
//! with working credentials, so all local state is gone before the network
//! is touched.

use crate::bus::Subscription;
use crate::error::Result;
use crate::matcher::{evaluate, HardwareLookup, LocalDevice, MatchDecision};
use async_trait::async_trait;
use devtrust_models::RevocationSignal;

/// Client-side hooks invoked, in order, when this device's session has been
/// revoked. Implementations must be idempotent: delivery is at-least-once
/// and the same signal may be handled twice.
#[async_trait]
pub trait SessionTerminator: Send + Sync {
    /// Tell the user their session was revoked from another device.
    async fn notify_user(&self, signal: &RevocationSignal);

    /// Drop every locally held credential (tokens, cached identity).
    async fn clear_credentials(&self);

    /// Close all other open client contexts for this device, not just the
    /// currently focused one.
    async fn close_contexts(&self);

    /// Remote sign-out call. Runs last; a failure here is logged and
    /// swallowed because local teardown has already completed.
    async fn remote_sign_out(&self) -> Result<()>;
}

/// Run the full teardown sequence for one matched signal.
async fn terminate(signal: &RevocationSignal, terminator: &dyn SessionTerminator) {
    terminator.notify_user(signal).await;
    terminator.clear_credentials().await;
    terminator.close_contexts().await;

    if let Err(e) = terminator.remote_sign_out().await {
        tracing::warn!(error = %e, "remote sign-out failed after local teardown");
    }
}

/// Evaluate one signal against the local device and tear down on a match.
///
/// Returns the match decision so callers can stop consuming the
/// subscription once the session is gone.
pub async fn handle_signal(
    signal: &RevocationSignal,
    local: &LocalDevice,
    lookup: &dyn HardwareLookup,
    terminator: &dyn SessionTerminator,
) -> MatchDecision {
    let decision = evaluate(signal, local, lookup).await;

    if decision.should_terminate() {
        tracing::info!(
            device = %signal.device_stable_id,
            ?decision,
            "revocation signal matched local device"
        );
        terminate(signal, terminator).await;
    }

    decision
}

/// Consume a subscription until a signal matches the local device.
///
/// Teardown for one signal completes before the next is examined; the
/// subscription handle is this process's only consumer.
pub async fn run_listener(
    mut subscription: Subscription,
    local: LocalDevice,
    lookup: &dyn HardwareLookup,
    terminator: &dyn SessionTerminator,
) {
    while let Some(signal) = subscription.recv().await {
        let decision = handle_signal(&signal, &local, lookup, terminator).await;
        if decision.should_terminate() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChannelError;
    use devtrust_models::HardwareProfile;
    use std::sync::Mutex;
    use uuid::Uuid;

    #[derive(Default)]
    struct RecordingTerminator {
        steps: Mutex<Vec<&'static str>>,
        fail_remote: bool,
    }

    #[async_trait]
    impl SessionTerminator for RecordingTerminator {
        async fn notify_user(&self, _signal: &RevocationSignal) {
            self.steps.lock().unwrap().push("notify");
        }

        async fn clear_credentials(&self) {
            self.steps.lock().unwrap().push("clear");
        }

        async fn close_contexts(&self) {
            self.steps.lock().unwrap().push("close");
        }

        async fn remote_sign_out(&self) -> Result<()> {
            self.steps.lock().unwrap().push("remote");
            if self.fail_remote {
                return Err(ChannelError::Internal("network down".to_string()));
            }
            Ok(())
        }
    }

    struct NoLookup;

    #[async_trait]
    impl HardwareLookup for NoLookup {
        async fn hardware_profile(
            &self,
            _user_id: Uuid,
            _device_stable_id: &str,
        ) -> Result<Option<HardwareProfile>> {
            Ok(None)
        }
    }

    fn local_device(stable_id: &str) -> LocalDevice {
        LocalDevice {
            stable_id: stable_id.to_string(),
            hardware: HardwareProfile {
                operating_system: "Linux".to_string(),
                screen_resolution: "1920x1080".to_string(),
                platform: "Linux x86_64".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn teardown_runs_in_strict_order() {
        let terminator = RecordingTerminator::default();
        let signal = RevocationSignal::new(Uuid::new_v4(), "device-a");

        let decision =
            handle_signal(&signal, &local_device("device-a"), &NoLookup, &terminator).await;

        assert_eq!(decision, MatchDecision::DirectMatch);
        assert_eq!(
            *terminator.steps.lock().unwrap(),
            vec!["notify", "clear", "close", "remote"]
        );
    }

    #[tokio::test]
    async fn remote_failure_still_completes_local_teardown() {
        let terminator = RecordingTerminator {
            fail_remote: true,
            ..Default::default()
        };
        let signal = RevocationSignal::new(Uuid::new_v4(), "device-a");

        handle_signal(&signal, &local_device("device-a"), &NoLookup, &terminator).await;

        // Local steps all happened before the failing remote call.
        assert_eq!(
            *terminator.steps.lock().unwrap(),
            vec!["notify", "clear", "close", "remote"]
        );
    }

    #[tokio::test]
    async fn unmatched_signal_triggers_nothing() {
        let terminator = RecordingTerminator::default();
        let signal = RevocationSignal::new(Uuid::new_v4(), "someone-else");

        let decision =
            handle_signal(&signal, &local_device("device-a"), &NoLookup, &terminator).await;

        assert_eq!(decision, MatchDecision::NoMatch);
        assert!(terminator.steps.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_delivery_is_safe() {
        let terminator = RecordingTerminator::default();
        let signal = RevocationSignal::new(Uuid::new_v4(), "device-a");

        handle_signal(&signal, &local_device("device-a"), &NoLookup, &terminator).await;
        handle_signal(&signal, &local_device("device-a"), &NoLookup, &terminator).await;

        // Two full idempotent runs, no interleaving surprises.
        assert_eq!(terminator.steps.lock().unwrap().len(), 8);
    }
}
