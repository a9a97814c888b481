//! TCP broker client

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;

use crate::broker::{Broker, Subscription, CHANNEL_CAPACITY};
use crate::error::{BrokerError, BrokerResult};
use crate::message::{BrokerMessage, BrokerPayload};
use crate::transport::{connect_with_retry, read_frame, write_frame, Frame, TransportConfig};

type TopicSenders = Arc<RwLock<HashMap<String, broadcast::Sender<BrokerMessage>>>>;

/// Broker client over one framed TCP connection.
///
/// Local subscribers to the same topic share a single server subscription.
pub struct TcpBroker {
    outbound: mpsc::Sender<Frame>,
    topics: TopicSenders,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl TcpBroker {
    pub async fn connect(address: &str, config: TransportConfig) -> BrokerResult<Self> {
        let stream = connect_with_retry(address, &config).await?;
        let (mut read_half, mut write_half) = stream.into_split();
        tracing::info!(address, "Connected to broker");

        let (outbound, mut out_rx) = mpsc::channel::<Frame>(CHANNEL_CAPACITY);
        let writer_config = config.clone();
        let writer = tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                if let Err(e) = write_frame(&mut write_half, &frame, &writer_config).await {
                    tracing::error!(error = %e, "Broker connection lost");
                    break;
                }
            }
        });

        let topics: TopicSenders = Arc::default();
        let reader_topics = topics.clone();
        let reader = tokio::spawn(async move {
            loop {
                match read_frame(&mut read_half, &config).await {
                    Ok(Some(Frame::Deliver { message })) => {
                        if let Some(tx) = reader_topics.read().await.get(&message.topic) {
                            let _ = tx.send(message);
                        }
                    }
                    Ok(Some(other)) => {
                        tracing::warn!(frame = ?other, "Unexpected frame from broker");
                    }
                    Ok(None) => {
                        tracing::warn!("Broker closed the connection");
                        break;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Broker read failed");
                        break;
                    }
                }
            }
            // Dropping the senders ends every local subscription
            reader_topics.write().await.clear();
        });

        Ok(Self {
            outbound,
            topics,
            reader,
            writer,
        })
    }

    async fn send(&self, frame: Frame) -> BrokerResult<()> {
        self.outbound.send(frame).await.map_err(|_| BrokerError::Closed)
    }
}

#[async_trait]
impl Broker for TcpBroker {
    async fn publish(&self, topic: &str, payload: BrokerPayload) -> BrokerResult<()> {
        self.send(Frame::Publish {
            message: BrokerMessage::new(topic, payload),
        })
        .await
    }

    async fn subscribe(&self, topic: &str) -> BrokerResult<Subscription> {
        if self.reader.is_finished() {
            return Err(BrokerError::Closed);
        }
        let (rx, first) = {
            let mut topics = self.topics.write().await;
            match topics.get(topic) {
                Some(tx) => (tx.subscribe(), false),
                None => {
                    let (tx, rx) = broadcast::channel(CHANNEL_CAPACITY);
                    topics.insert(topic.to_string(), tx);
                    (rx, true)
                }
            }
        };
        if first {
            self.send(Frame::Subscribe {
                topic: topic.to_string(),
            })
            .await?;
        }
        Ok(Subscription::new(rx))
    }
}

impl Drop for TcpBroker {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{topics, SchemaChanged};
    use crate::server::start_background_broker;
    use docket_core::TenantId;
    use std::time::Duration;

    fn schema_changed(tenant: &str) -> BrokerPayload {
        BrokerPayload::SchemaChanged(SchemaChanged {
            tenant_id: TenantId::from(tenant),
        })
    }

    /// Publish until the subscriber sees a message; server-side subscription
    /// registration is asynchronous.
    async fn publish_until_received(
        publisher: &TcpBroker,
        subscription: &mut Subscription,
        payload: BrokerPayload,
    ) -> BrokerMessage {
        for _ in 0..50 {
            publisher
                .publish(topics::SCHEMA_CHANGED, payload.clone())
                .await
                .unwrap();
            if let Ok(Some(message)) =
                tokio::time::timeout(Duration::from_millis(100), subscription.recv()).await
            {
                return message;
            }
        }
        panic!("message never delivered");
    }

    #[tokio::test]
    async fn test_publish_crosses_connections() {
        let (addr, _server) = start_background_broker("127.0.0.1:0", TransportConfig::default())
            .await
            .unwrap();
        let address = addr.to_string();

        let publisher = TcpBroker::connect(&address, TransportConfig::default()).await.unwrap();
        let subscriber = TcpBroker::connect(&address, TransportConfig::default()).await.unwrap();
        let mut first = subscriber.subscribe(topics::SCHEMA_CHANGED).await.unwrap();
        let mut second = subscriber.subscribe(topics::SCHEMA_CHANGED).await.unwrap();

        let message = publish_until_received(&publisher, &mut first, schema_changed("acme")).await;
        assert_eq!(message.topic, topics::SCHEMA_CHANGED);
        assert_eq!(message.payload, schema_changed("acme"));

        let shared = tokio::time::timeout(Duration::from_secs(2), second.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(shared.payload, schema_changed("acme"));
    }

    #[tokio::test]
    async fn test_connect_fails_without_server() {
        let config = TransportConfig {
            max_connect_attempts: 2,
            reconnect_delay_ms: 10,
            ..TransportConfig::default()
        };
        // Port 1 on loopback refuses connections
        assert!(TcpBroker::connect("127.0.0.1:1", config).await.is_err());
    }
}
