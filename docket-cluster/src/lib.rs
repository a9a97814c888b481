//! Docket Cluster
//!
//! Process model for the Docket service. Workers are tokio tasks that own
//! their state and share only store and broker handles.
//!
//! - REST tier: the primary bootstraps the store, then one REST worker per
//!   core serves the shared listener. Schema-changed signals from the broker
//!   are relayed to each worker as `SchemaInvalidate`.
//! - Realtime tier: a gateway hands accepted sockets to workers by client
//!   address; workers serve `/realtime` WebSockets and deliver activity
//!   broadcasts relayed from the broker.

pub mod bootstrap;
pub mod config;
pub mod connections;
pub mod error;
pub mod realtime;
pub mod relay;
pub mod rest;
pub mod supervisor;
pub mod worker;

pub use bootstrap::{bootstrap_primary, BootstrapReport};
pub use config::{ClusterConfig, InstanceRole};
pub use connections::{ClientIdentity, ConnectionSet};
pub use error::{ClusterError, ClusterResult};
pub use realtime::{sticky_worker_index, RealtimeGateway};
pub use relay::Relay;
pub use supervisor::{ClusterSupervisor, RealtimeTier, RestTier};
pub use worker::{PoolSender, WorkerMessage, WorkerPool};
