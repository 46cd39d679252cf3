use crate::error::Result;
use async_trait::async_trait;
use devtrust_models::RevocationSignal;
use tokio::sync::mpsc;
use uuid::Uuid;

/// A live feed of revocation signals for one user.
///
/// The backing transport task owns its upstream connection exclusively, so a
/// process holds exactly one subscriber per subscription handle; dropping
/// the subscription tears the task down.
pub struct Subscription {
    receiver: mpsc::Receiver<RevocationSignal>,
}

impl Subscription {
    pub(crate) fn new(receiver: mpsc::Receiver<RevocationSignal>) -> Self {
        Self { receiver }
    }

    /// Next signal, or `None` once the transport has shut down.
    pub async fn recv(&mut self) -> Option<RevocationSignal> {
        self.receiver.recv().await
    }
}

/// Publish/subscribe transport for [`RevocationSignal`]s.
///
/// Delivery is at-least-once: a signal may arrive more than once and
/// receivers must treat duplicates as idempotent. Ordering across distinct
/// revocation events is not guaranteed.
#[async_trait]
pub trait RevocationBus: Send + Sync {
    /// Broadcast a signal to every live subscriber of `signal.user_id`.
    async fn publish(&self, signal: &RevocationSignal) -> Result<()>;

    /// Subscribe to all signals targeting devices of `user_id`.
    async fn subscribe(&self, user_id: Uuid) -> Result<Subscription>;
}
