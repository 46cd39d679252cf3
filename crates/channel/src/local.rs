//! In-process revocation bus backed by a `tokio::sync::broadcast` channel.
//!
//! Used by tests and single-node deployments where Redis adds nothing; the
//! semantics (at-least-once, unordered across events) match the Redis
//! transport.

use crate::bus::{RevocationBus, Subscription};
use crate::error::Result;
use async_trait::async_trait;
use devtrust_models::RevocationSignal;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

const DEFAULT_CAPACITY: usize = 256;

pub struct LocalRevocationBus {
    sender: broadcast::Sender<RevocationSignal>,
}

impl LocalRevocationBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }
}

impl Default for LocalRevocationBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl RevocationBus for LocalRevocationBus {
    async fn publish(&self, signal: &RevocationSignal) -> Result<()> {
        // A send error only means there are currently zero subscribers.
        let _ = self.sender.send(signal.clone());
        Ok(())
    }

    async fn subscribe(&self, user_id: Uuid) -> Result<Subscription> {
        let mut upstream = self.sender.subscribe();
        let (tx, rx) = mpsc::channel(DEFAULT_CAPACITY);

        tokio::spawn(async move {
            loop {
                match upstream.recv().await {
                    Ok(signal) if signal.user_id == user_id => {
                        if tx.send(signal).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "revocation subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(Subscription::new(rx))
    }
}
