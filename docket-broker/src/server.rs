//! Broker server
//!
//! Accepts framed TCP connections and relays messages between them through
//! an in-process [`MemoryBroker`] hub. Every connection may subscribe to any
//! number of topics and publish to any topic.

use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::broker::{Broker, MemoryBroker};
use crate::error::{BrokerError, BrokerResult};
use crate::transport::{read_frame, write_frame, Frame, TransportConfig};

/// Outbound frames queued per connection
const OUTBOUND_QUEUE: usize = 256;

pub struct BrokerServer {
    listener: TcpListener,
    hub: MemoryBroker,
    config: TransportConfig,
}

impl BrokerServer {
    /// Bind the broker to an address
    pub async fn bind(addr: &str, config: TransportConfig) -> BrokerResult<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| BrokerError::Connection(format!("Failed to bind {}: {}", addr, e)))?;
        Ok(Self {
            listener,
            hub: MemoryBroker::new(),
            config,
        })
    }

    pub fn local_addr(&self) -> BrokerResult<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| BrokerError::Connection(e.to_string()))
    }

    /// Accept connections until the listener fails
    pub async fn run(self) -> BrokerResult<()> {
        tracing::info!(address = ?self.listener.local_addr().ok(), "Broker listening");
        loop {
            let (stream, peer) = self
                .listener
                .accept()
                .await
                .map_err(|e| BrokerError::Connection(format!("Accept failed: {}", e)))?;
            let hub = self.hub.clone();
            let config = self.config.clone();
            tokio::spawn(async move {
                handle_connection(stream, peer, hub, config).await;
            });
        }
    }
}

/// Start a broker in a background task, returning its bound address
pub async fn start_background_broker(
    addr: &str,
    config: TransportConfig,
) -> BrokerResult<(SocketAddr, JoinHandle<BrokerResult<()>>)> {
    let server = BrokerServer::bind(addr, config).await?;
    let local = server.local_addr()?;
    let handle = tokio::spawn(server.run());
    Ok((local, handle))
}

async fn handle_connection(stream: TcpStream, peer: SocketAddr, hub: MemoryBroker, config: TransportConfig) {
    tracing::debug!(peer = %peer, "Broker client connected");
    let (mut reader, mut writer) = stream.into_split();
    let (out_tx, mut out_rx) = mpsc::channel::<Frame>(OUTBOUND_QUEUE);

    let writer_config = config.clone();
    let writer_task = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            if let Err(e) = write_frame(&mut writer, &frame, &writer_config).await {
                tracing::debug!(peer = %peer, error = %e, "Broker write failed");
                break;
            }
        }
    });

    let mut forwarders: Vec<JoinHandle<()>> = Vec::new();
    loop {
        match read_frame(&mut reader, &config).await {
            Ok(Some(Frame::Subscribe { topic })) => {
                let mut subscription = match hub.subscribe(&topic).await {
                    Ok(subscription) => subscription,
                    Err(e) => {
                        tracing::warn!(peer = %peer, topic = %topic, error = %e, "Subscribe failed");
                        continue;
                    }
                };
                tracing::debug!(peer = %peer, topic = %topic, "Broker client subscribed");
                let tx = out_tx.clone();
                forwarders.push(tokio::spawn(async move {
                    while let Some(message) = subscription.recv().await {
                        if tx.send(Frame::Deliver { message }).await.is_err() {
                            break;
                        }
                    }
                }));
            }
            Ok(Some(Frame::Publish { message })) => {
                let receivers = hub.deliver(message).await;
                tracing::trace!(peer = %peer, receivers, "Relayed publish");
            }
            Ok(Some(Frame::Deliver { .. })) => {
                tracing::warn!(peer = %peer, "Ignoring deliver frame from client");
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(peer = %peer, error = %e, "Broker connection error");
                break;
            }
        }
    }

    for forwarder in forwarders {
        forwarder.abort();
    }
    drop(out_tx);
    let _ = writer_task.await;
    tracing::debug!(peer = %peer, "Broker client disconnected");
}
