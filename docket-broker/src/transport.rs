//! Framed TCP transport
//!
//! Frames are serde_json documents prefixed with a 4-byte big-endian length.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::{BrokerError, BrokerResult};
use crate::message::BrokerMessage;

/// Configuration for the broker transport
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Timeout for reading a frame body once its length has arrived
    pub read_timeout_ms: u64,
    /// Write timeout in milliseconds
    pub write_timeout_ms: u64,
    /// Maximum connection attempts
    pub max_connect_attempts: u32,
    /// Base reconnection delay in milliseconds
    pub reconnect_delay_ms: u64,
    /// Maximum frame size in bytes
    pub max_message_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 5000,
            read_timeout_ms: 30000,
            write_timeout_ms: 10000,
            max_connect_attempts: 5,
            reconnect_delay_ms: 200,
            max_message_size: 4 * 1024 * 1024, // 4MB
        }
    }
}

/// Wire frames between broker clients and the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Frame {
    Subscribe { topic: String },
    Publish { message: BrokerMessage },
    Deliver { message: BrokerMessage },
}

/// Read one frame. Returns `None` on a clean end of stream.
pub async fn read_frame<R>(reader: &mut R, config: &TransportConfig) -> BrokerResult<Option<Frame>>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(BrokerError::Connection(format!("Read error: {}", e))),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > config.max_message_size {
        return Err(BrokerError::InvalidMessage(format!(
            "Message too large: {} > {}",
            len, config.max_message_size
        )));
    }

    let mut buf = vec![0u8; len];
    timeout(
        Duration::from_millis(config.read_timeout_ms),
        reader.read_exact(&mut buf),
    )
    .await
    .map_err(|_| BrokerError::Timeout("Read timeout".to_string()))?
    .map_err(|e| BrokerError::Connection(format!("Read error: {}", e)))?;

    serde_json::from_slice(&buf)
        .map(Some)
        .map_err(|e| BrokerError::InvalidMessage(format!("Deserialize error: {}", e)))
}

/// Write one frame
pub async fn write_frame<W>(writer: &mut W, frame: &Frame, config: &TransportConfig) -> BrokerResult<()>
where
    W: AsyncWrite + Unpin,
{
    let data = serde_json::to_vec(frame)
        .map_err(|e| BrokerError::InvalidMessage(format!("Serialize error: {}", e)))?;

    if data.len() > config.max_message_size {
        return Err(BrokerError::InvalidMessage(format!(
            "Message too large: {} > {}",
            data.len(),
            config.max_message_size
        )));
    }

    let mut out = Vec::with_capacity(4 + data.len());
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(&data);

    timeout(
        Duration::from_millis(config.write_timeout_ms),
        async {
            writer.write_all(&out).await?;
            writer.flush().await
        },
    )
    .await
    .map_err(|_| BrokerError::Timeout("Write timeout".to_string()))?
    .map_err(|e| BrokerError::Connection(format!("Write error: {}", e)))
}

/// Connect with exponential backoff
pub async fn connect_with_retry(address: &str, config: &TransportConfig) -> BrokerResult<TcpStream> {
    let mut attempts = 0;
    let mut delay = config.reconnect_delay_ms;

    loop {
        match timeout(
            Duration::from_millis(config.connect_timeout_ms),
            TcpStream::connect(address),
        )
        .await
        {
            Ok(Ok(stream)) => return Ok(stream),
            Ok(Err(e)) => {
                attempts += 1;
                if attempts >= config.max_connect_attempts {
                    return Err(BrokerError::Connection(format!(
                        "Failed to connect to {} after {} attempts: {}",
                        address, attempts, e
                    )));
                }
            }
            Err(_) => {
                attempts += 1;
                if attempts >= config.max_connect_attempts {
                    return Err(BrokerError::Timeout(format!(
                        "Connection timeout after {} attempts",
                        attempts
                    )));
                }
            }
        }

        tracing::debug!(address, attempts, delay_ms = delay, "Broker connect retry");
        tokio::time::sleep(Duration::from_millis(delay)).await;
        delay = (delay * 2).min(30000);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{BrokerPayload, SchemaChanged};
    use docket_core::TenantId;

    #[tokio::test]
    async fn test_frames_over_duplex() {
        let config = TransportConfig::default();
        let (mut client, mut server) = tokio::io::duplex(1024);

        let message = BrokerMessage::new(
            "t",
            BrokerPayload::SchemaChanged(SchemaChanged {
                tenant_id: TenantId::from("acme"),
            }),
        );
        write_frame(&mut client, &Frame::Subscribe { topic: "t".into() }, &config)
            .await
            .unwrap();
        write_frame(&mut client, &Frame::Publish { message: message.clone() }, &config)
            .await
            .unwrap();
        drop(client);

        assert_eq!(
            read_frame(&mut server, &config).await.unwrap(),
            Some(Frame::Subscribe { topic: "t".into() })
        );
        assert_eq!(
            read_frame(&mut server, &config).await.unwrap(),
            Some(Frame::Publish { message })
        );
        assert_eq!(read_frame(&mut server, &config).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let config = TransportConfig {
            max_message_size: 8,
            ..TransportConfig::default()
        };
        let (mut client, mut server) = tokio::io::duplex(64);
        use tokio::io::AsyncWriteExt;
        client.write_all(&100u32.to_be_bytes()).await.unwrap();
        assert!(matches!(
            read_frame(&mut server, &config).await,
            Err(BrokerError::InvalidMessage(_))
        ));
    }
}
