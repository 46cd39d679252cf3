//! Background expiry sweep.
//!
//! The sweep itself is one atomic predicate update in the store, so any
//! number of scheduler instances may run concurrently without
//! double-counting; this task is just the timer around it.

use devtrust_database::SessionStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Spawn the periodic expiry sweep. Dropping the handle does not stop the
/// task; abort it for a clean shutdown.
pub fn spawn_sweeper(store: Arc<dyn SessionStore>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; skip it so startup stays quiet.
        ticker.tick().await;

        loop {
            ticker.tick().await;

            match store.sweep_expired().await {
                Ok(0) => {}
                Ok(swept) => tracing::info!(swept, "deactivated expired sessions"),
                Err(e) => tracing::warn!(error = %e, "expiry sweep failed"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use devtrust_database::MemorySessionStore;
    use devtrust_models::NewSession;
    use uuid::Uuid;

    #[tokio::test]
    async fn sweeper_deactivates_expired_sessions() {
        let store = Arc::new(MemorySessionStore::new());
        let user = Uuid::new_v4();

        let expired = NewSession {
            user_id: user,
            device_stable_id: "stale-device".to_string(),
            device_fingerprint: "stale-fp".to_string(),
            operating_system: "Linux".to_string(),
            screen_resolution: "1920x1080".to_string(),
            platform: "Linux x86_64".to_string(),
            device_type: "desktop".to_string(),
            browser_name: "Firefox".to_string(),
            ip_hash: None,
            city: None,
            country: None,
            mfa_enabled: false,
            expires_at: Utc::now() - ChronoDuration::minutes(1),
        };
        store.upsert(&expired).await.unwrap();

        let handle = spawn_sweeper(store.clone(), Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(80)).await;
        handle.abort();

        assert!(store.list_active(user).await.unwrap().is_empty());
    }
}
