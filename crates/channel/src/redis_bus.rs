use crate::bus::{RevocationBus, Subscription};
use crate::error::Result;
use async_trait::async_trait;
use devtrust_models::RevocationSignal;
use futures::StreamExt;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub url: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
        }
    }
}

impl ChannelConfig {
    pub fn from_env() -> Self {
        Self {
            url: std::env::var("REDIS_URL").unwrap_or_else(|_| Self::default().url),
        }
    }
}

/// Redis pub/sub transport for revocation signals.
///
/// One channel per user (`revocations:{user_id}`), JSON payloads. Publishing
/// goes through a shared multiplexed connection; each subscription owns a
/// dedicated pub/sub connection inside its forwarding task, which is the only
/// consumer for that subscriber.
#[derive(Clone)]
pub struct RedisRevocationBus {
    client: Client,
    manager: ConnectionManager,
}

impl RedisRevocationBus {
    pub async fn new(config: ChannelConfig) -> Result<Self> {
        let client = Client::open(config.url)?;
        let manager = ConnectionManager::new(client.clone()).await?;

        Ok(Self { client, manager })
    }

    /// Ping Redis to check the connection.
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.manager.clone();
        redis::cmd("PING").query_async::<()>(&mut conn).await?;
        Ok(())
    }
}

pub fn revocation_channel_key(user_id: Uuid) -> String {
    format!("revocations:{}", user_id)
}

#[async_trait]
impl RevocationBus for RedisRevocationBus {
    async fn publish(&self, signal: &RevocationSignal) -> Result<()> {
        let payload = serde_json::to_string(signal)?;
        let mut conn = self.manager.clone();

        conn.publish::<_, _, ()>(revocation_channel_key(signal.user_id), payload)
            .await?;

        Ok(())
    }

    async fn subscribe(&self, user_id: Uuid) -> Result<Subscription> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(revocation_channel_key(user_id)).await?;

        let (tx, rx) = mpsc::channel(256);

        tokio::spawn(async move {
            let mut messages = pubsub.on_message();
            while let Some(msg) = messages.next().await {
                let payload: String = match msg.get_payload() {
                    Ok(payload) => payload,
                    Err(e) => {
                        tracing::warn!(error = %e, "unreadable revocation payload");
                        continue;
                    }
                };

                match serde_json::from_str::<RevocationSignal>(&payload) {
                    Ok(signal) => {
                        if tx.send(signal).await.is_err() {
                            // Subscriber dropped; tear the task down.
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "malformed revocation signal");
                    }
                }
            }
        });

        Ok(Subscription::new(rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::RevocationBus;

    #[tokio::test]
    #[ignore] // Only run with Redis available
    async fn test_redis_connection() {
        let bus = RedisRevocationBus::new(ChannelConfig::from_env())
            .await
            .expect("Failed to connect to Redis");
        bus.ping().await.expect("Failed to ping Redis");
    }

    #[tokio::test]
    #[ignore]
    async fn publish_reaches_subscriber() {
        let bus = RedisRevocationBus::new(ChannelConfig::from_env())
            .await
            .unwrap();

        let user = Uuid::new_v4();
        let mut sub = bus.subscribe(user).await.unwrap();

        // Give the pub/sub connection a moment to register.
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        bus.publish(&RevocationSignal::new(user, "redis-device"))
            .await
            .unwrap();

        let signal = tokio::time::timeout(std::time::Duration::from_secs(2), sub.recv())
            .await
            .expect("timed out waiting for signal")
            .expect("subscription closed");
        assert_eq!(signal.device_stable_id, "redis-device");
    }
}
