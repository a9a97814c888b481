//! Broker relays run by the supervisor
//!
//! - schema relay: `schema-changed` topic -> `SchemaInvalidate` to own workers
//! - activity relay: activity topic -> realtime adapter channel (primary only)

use docket_broker::{topics, Broker, BrokerPayload, Subscription};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::ClusterResult;
use crate::worker::PoolSender;

/// A running relay loop
pub struct Relay {
    name: &'static str,
    stop: mpsc::Sender<()>,
    task: JoinHandle<usize>,
}

impl Relay {
    fn spawn<F, Fut>(name: &'static str, mut subscription: Subscription, mut forward: F) -> Self
    where
        F: FnMut(BrokerPayload) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = bool> + Send,
    {
        let (stop, mut stop_rx) = mpsc::channel::<()>(1);
        let task = tokio::spawn(async move {
            let mut relayed = 0;
            loop {
                tokio::select! {
                    _ = stop_rx.recv() => break,
                    message = subscription.recv() => match message {
                        Some(message) => {
                            if forward(message.payload).await {
                                relayed += 1;
                            }
                        }
                        None => {
                            tracing::warn!(relay = name, "Broker subscription closed");
                            break;
                        }
                    }
                }
            }
            relayed
        });
        Self { name, stop, task }
    }

    /// Stop the relay. Returns how many messages it forwarded.
    pub async fn stop(self) -> usize {
        let _ = self.stop.send(()).await;
        match self.task.await {
            Ok(relayed) => relayed,
            Err(e) => {
                tracing::error!(relay = self.name, error = %e, "Relay task failed");
                0
            }
        }
    }
}

/// Relay schema-changed signals to this instance's workers
pub async fn start_schema_relay(broker: &Arc<dyn Broker>, workers: PoolSender) -> ClusterResult<Relay> {
    let subscription = broker.subscribe(topics::SCHEMA_CHANGED).await?;
    Ok(Relay::spawn("schema", subscription, move |payload| {
        let workers = workers.clone();
        async move {
            match payload {
                BrokerPayload::SchemaChanged(changed) => {
                    let reached = workers.invalidate_schema(&changed.tenant_id).await;
                    tracing::debug!(tenant_id = %changed.tenant_id, workers = reached, "Schema change relayed");
                    true
                }
                other => {
                    tracing::warn!(message_type = other.message_type(), "Unexpected message on schema topic");
                    false
                }
            }
        }
    }))
}

/// Republish activity events on the realtime adapter channel
pub async fn start_activity_relay(broker: Arc<dyn Broker>) -> ClusterResult<Relay> {
    let subscription = broker.subscribe(topics::ACTIVITY).await?;
    Ok(Relay::spawn("activity", subscription, move |payload| {
        let broker = broker.clone();
        async move {
            match &payload {
                BrokerPayload::Activity(_) => match broker.publish(topics::REALTIME, payload).await {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::error!(topic = topics::REALTIME, error = %e, "Failed to relay activity");
                        false
                    }
                },
                other => {
                    tracing::warn!(message_type = other.message_type(), "Unexpected message on activity topic");
                    false
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::WorkerMessage;
    use chrono::Utc;
    use docket_broker::{MemoryBroker, SchemaChanged};
    use docket_core::{ActivityBroadcast, TenantId, Visibility};
    use serde_json::json;
    use std::time::Duration;

    fn broadcast() -> ActivityBroadcast {
        ActivityBroadcast {
            visibility: Visibility::Tenant,
            path: "company/c1".to_string(),
            path_spec: "company/:id".to_string(),
            verb: "delete".to_string(),
            permissions: vec!["delete".to_string()],
            title: "Document deleted".to_string(),
            description: "delete company/c1".to_string(),
            timestamp: Utc::now(),
            activity_id: "a1".to_string(),
            response: json!({"deleted": true}),
            user: None,
            tenant: TenantId::from("acme"),
        }
    }

    #[tokio::test]
    async fn test_schema_relay_reaches_each_worker() {
        let memory = MemoryBroker::new();
        let broker: Arc<dyn Broker> = Arc::new(memory.clone());
        let (tx_a, mut rx_a) = mpsc::channel(4);
        let (tx_b, mut rx_b) = mpsc::channel(4);
        let relay = start_schema_relay(&broker, PoolSender::new(vec![tx_a, tx_b]))
            .await
            .unwrap();

        broker
            .publish(
                topics::SCHEMA_CHANGED,
                BrokerPayload::SchemaChanged(SchemaChanged {
                    tenant_id: TenantId::from("acme"),
                }),
            )
            .await
            .unwrap();

        for rx in [&mut rx_a, &mut rx_b] {
            let message = tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .unwrap()
                .unwrap();
            assert!(matches!(
                message,
                WorkerMessage::SchemaInvalidate { tenant_id } if tenant_id.as_str() == "acme"
            ));
        }
        assert_eq!(relay.stop().await, 1);
    }

    #[tokio::test]
    async fn test_activity_relay_republishes_on_realtime() {
        let broker: Arc<dyn Broker> = Arc::new(MemoryBroker::new());
        let mut realtime = broker.subscribe(topics::REALTIME).await.unwrap();
        let relay = start_activity_relay(broker.clone()).await.unwrap();

        let event = broadcast();
        broker
            .publish(topics::ACTIVITY, BrokerPayload::Activity(event.clone()))
            .await
            .unwrap();

        let message = tokio::time::timeout(Duration::from_secs(2), realtime.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(message.topic, topics::REALTIME);
        assert_eq!(message.payload, BrokerPayload::Activity(event));
        assert_eq!(relay.stop().await, 1);
    }
}
