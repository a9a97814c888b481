//! Docket broker
//!
//! Topic publish/subscribe shared by REST and realtime workers:
//! - [`MemoryBroker`]: in-process broadcast channels for single-instance runs
//! - [`BrokerServer`] / [`TcpBroker`]: framed TCP relay for multi-instance runs

pub mod broker;
pub mod error;
pub mod message;
pub mod server;
pub mod tcp;
pub mod transport;

pub use broker::{Broker, DisconnectedBroker, MemoryBroker, Subscription};
pub use error::{BrokerError, BrokerResult};
pub use message::{topics, BrokerMessage, BrokerPayload, SchemaChanged};
pub use server::{start_background_broker, BrokerServer};
pub use tcp::TcpBroker;
pub use transport::{Frame, TransportConfig};

use std::sync::Arc;

/// Broker selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerConfig {
    /// In-process channels
    Memory,
    /// Remote broker server
    Tcp { address: String },
}

impl BrokerConfig {
    /// Parse `mem`, `memory` or `tcp://host:port`
    pub fn parse(value: &str) -> BrokerResult<Self> {
        match value {
            "mem" | "memory" => Ok(Self::Memory),
            other => match other.strip_prefix("tcp://") {
                Some(address) if !address.is_empty() => Ok(Self::Tcp {
                    address: address.to_string(),
                }),
                _ => Err(BrokerError::UnknownBroker(other.to_string())),
            },
        }
    }

    pub async fn connect(&self) -> BrokerResult<Arc<dyn Broker>> {
        match self {
            Self::Memory => Ok(Arc::new(MemoryBroker::new()) as Arc<dyn Broker>),
            Self::Tcp { address } => Ok(Arc::new(TcpBroker::connect(address, TransportConfig::default()).await?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_broker_config() {
        assert_eq!(BrokerConfig::parse("mem").unwrap(), BrokerConfig::Memory);
        assert_eq!(
            BrokerConfig::parse("tcp://127.0.0.1:7400").unwrap(),
            BrokerConfig::Tcp {
                address: "127.0.0.1:7400".to_string()
            }
        );
        assert!(BrokerConfig::parse("redis://x").is_err());
        assert!(BrokerConfig::parse("tcp://").is_err());
    }
}
