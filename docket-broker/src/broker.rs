//! Broker trait and the in-process implementation

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use crate::error::{BrokerError, BrokerResult};
use crate::message::{BrokerMessage, BrokerPayload};

/// Per-topic channel depth
pub const CHANNEL_CAPACITY: usize = 1024;

/// Topic publish/subscribe
#[async_trait]
pub trait Broker: Send + Sync {
    async fn publish(&self, topic: &str, payload: BrokerPayload) -> BrokerResult<()>;

    async fn subscribe(&self, topic: &str) -> BrokerResult<Subscription>;
}

/// Stream of messages for one topic
pub struct Subscription {
    rx: broadcast::Receiver<BrokerMessage>,
}

impl Subscription {
    pub fn new(rx: broadcast::Receiver<BrokerMessage>) -> Self {
        Self { rx }
    }

    /// Next message, or `None` once the broker side is gone.
    /// Messages dropped because this subscriber lagged are skipped.
    pub async fn recv(&mut self) -> Option<BrokerMessage> {
        loop {
            match self.rx.recv().await {
                Ok(message) => return Some(message),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Subscriber lagged, messages dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next message if one is already queued
    pub fn try_recv(&mut self) -> Option<BrokerMessage> {
        loop {
            match self.rx.try_recv() {
                Ok(message) => return Some(message),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}

/// In-process broker backed by one broadcast channel per topic
#[derive(Debug, Clone, Default)]
pub struct MemoryBroker {
    topics: Arc<RwLock<HashMap<String, broadcast::Sender<BrokerMessage>>>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    async fn sender(&self, topic: &str) -> broadcast::Sender<BrokerMessage> {
        if let Some(tx) = self.topics.read().await.get(topic) {
            return tx.clone();
        }
        self.topics
            .write()
            .await
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    /// Forward an already-built message, keeping its id and timestamp
    pub async fn deliver(&self, message: BrokerMessage) -> usize {
        let tx = self.sender(&message.topic).await;
        // No subscribers is not an error
        tx.send(message).unwrap_or(0)
    }

    pub async fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .read()
            .await
            .get(topic)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn publish(&self, topic: &str, payload: BrokerPayload) -> BrokerResult<()> {
        let receivers = self.deliver(BrokerMessage::new(topic, payload)).await;
        tracing::trace!(topic, receivers, "Published");
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> BrokerResult<Subscription> {
        Ok(Subscription::new(self.sender(topic).await.subscribe()))
    }
}

/// Broker that rejects every operation. Used where no broker is configured.
#[derive(Debug, Clone, Default)]
pub struct DisconnectedBroker;

#[async_trait]
impl Broker for DisconnectedBroker {
    async fn publish(&self, _topic: &str, _payload: BrokerPayload) -> BrokerResult<()> {
        Err(BrokerError::Closed)
    }

    async fn subscribe(&self, _topic: &str) -> BrokerResult<Subscription> {
        Err(BrokerError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{topics, SchemaChanged};
    use docket_core::TenantId;

    fn schema_changed(tenant: &str) -> BrokerPayload {
        BrokerPayload::SchemaChanged(SchemaChanged {
            tenant_id: TenantId::from(tenant),
        })
    }

    #[tokio::test]
    async fn test_fan_out_to_every_subscriber() {
        let broker = MemoryBroker::new();
        let mut a = broker.subscribe(topics::SCHEMA_CHANGED).await.unwrap();
        let mut b = broker.subscribe(topics::SCHEMA_CHANGED).await.unwrap();
        let mut other = broker.subscribe(topics::ACTIVITY).await.unwrap();

        broker
            .publish(topics::SCHEMA_CHANGED, schema_changed("acme"))
            .await
            .unwrap();

        assert_eq!(a.recv().await.unwrap().payload, schema_changed("acme"));
        assert_eq!(b.recv().await.unwrap().payload, schema_changed("acme"));
        assert!(other.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let broker = MemoryBroker::new();
        assert!(broker.publish("nobody", schema_changed("x")).await.is_ok());
        assert_eq!(broker.subscriber_count("nobody").await, 0);
    }

    #[tokio::test]
    async fn test_disconnected_broker_fails() {
        assert!(DisconnectedBroker
            .publish(topics::ACTIVITY, schema_changed("x"))
            .await
            .is_err());
    }
}
