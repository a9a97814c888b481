//! Cluster supervisor
//!
//! Starts the REST tier (bootstrap on the primary, one worker per core on a
//! shared listener, schema relay) and the realtime tier (gateway, one worker
//! per core, activity relay on the primary).

use docket_api::ApiConfig;
use docket_broker::Broker;
use docket_db::{Datastore, DocketDatabase};
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::bootstrap::{bootstrap_primary, BootstrapReport};
use crate::config::ClusterConfig;
use crate::error::{ClusterError, ClusterResult};
use crate::realtime::{run_realtime_worker, RealtimeGateway, RealtimeWorkerContext};
use crate::relay::{start_activity_relay, start_schema_relay, Relay};
use crate::rest::{run_rest_worker, RestWorkerContext};
use crate::worker::WorkerPool;

/// Running REST tier
pub struct RestTier {
    pub addr: SocketAddr,
    pub bootstrap: Option<BootstrapReport>,
    pool: WorkerPool,
    relay: Relay,
}

impl RestTier {
    pub fn workers(&self) -> usize {
        self.pool.len()
    }

    pub async fn shutdown(self) -> ClusterResult<()> {
        self.relay.stop().await;
        self.pool.shutdown().await
    }
}

/// Running realtime tier
pub struct RealtimeTier {
    pub addr: SocketAddr,
    /// Per-worker listener addresses, by worker index
    pub worker_addrs: Vec<SocketAddr>,
    pool: WorkerPool,
    gateway_stop: oneshot::Sender<()>,
    gateway: JoinHandle<()>,
    relay: Option<Relay>,
}

impl RealtimeTier {
    pub async fn shutdown(self) -> ClusterResult<()> {
        let _ = self.gateway_stop.send(());
        let _ = self.gateway.await;
        if let Some(relay) = self.relay {
            relay.stop().await;
        }
        self.pool.shutdown().await
    }
}

pub struct ClusterSupervisor {
    config: ClusterConfig,
    datastore: Datastore,
    broker: Arc<dyn Broker>,
}

impl ClusterSupervisor {
    pub fn new(config: ClusterConfig, datastore: Datastore, broker: Arc<dyn Broker>) -> Self {
        Self {
            config,
            datastore,
            broker,
        }
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Bootstrap if primary, then start the REST workers
    pub async fn start_rest(&self) -> ClusterResult<RestTier> {
        let bootstrap = if self.config.role.is_primary() {
            let database = Arc::new(DocketDatabase::new(self.datastore.connect()));
            Some(bootstrap_primary(database, &self.config.credential_path).await?)
        } else {
            None
        };

        let listener = Arc::new(TcpListener::bind(&self.config.rest_addr)?);
        let addr = listener.local_addr()?;
        let context = RestWorkerContext {
            datastore: self.datastore.clone(),
            broker: self.broker.clone(),
            listener,
            api: ApiConfig {
                host: addr.ip().to_string(),
                port: addr.port(),
                enable_cors: self.config.enable_cors,
            },
        };

        let count = self.config.worker_count();
        let pool = WorkerPool::spawn(count, |index, inbox| {
            tokio::spawn(run_rest_worker(index, context.clone(), inbox))
        });
        let relay = start_schema_relay(&self.broker, pool.sender()).await?;

        tracing::info!(
            role = %self.config.role,
            workers = count,
            addr = %addr,
            "REST tier listening"
        );
        Ok(RestTier {
            addr,
            bootstrap,
            pool,
            relay,
        })
    }

    /// Start the realtime workers and the gateway in front of them
    pub async fn start_realtime(&self) -> ClusterResult<RealtimeTier> {
        let count = self.config.worker_count();
        let (ready, mut ready_rx) = mpsc::unbounded_channel();
        let context = RealtimeWorkerContext {
            datastore: self.datastore.clone(),
            broker: self.broker.clone(),
            host: self.config.worker_host.clone(),
            ready,
        };
        let pool = WorkerPool::spawn(count, |index, inbox| {
            tokio::spawn(run_realtime_worker(index, context.clone(), inbox))
        });
        drop(context);

        let mut worker_addrs = vec![None; count];
        for _ in 0..count {
            match ready_rx.recv().await {
                Some((index, addr)) => worker_addrs[index] = Some(addr),
                None => {
                    // A worker exited before listening; collect its error
                    pool.shutdown().await?;
                    return Err(ClusterError::Server("realtime worker failed to start".to_string()));
                }
            }
        }
        let worker_addrs: Vec<SocketAddr> = worker_addrs.into_iter().flatten().collect();

        let gateway = RealtimeGateway::bind(&self.config.realtime_addr, pool.sender()).await?;
        let addr = gateway.local_addr()?;
        let (gateway_stop, stop_rx) = oneshot::channel();
        let gateway = tokio::spawn(gateway.run(stop_rx));

        let relay = if self.config.role.is_primary() {
            Some(start_activity_relay(self.broker.clone()).await?)
        } else {
            None
        };

        tracing::info!(
            role = %self.config.role,
            workers = count,
            addr = %addr,
            "Realtime gateway listening"
        );
        Ok(RealtimeTier {
            addr,
            worker_addrs,
            pool,
            gateway_stop,
            gateway,
            relay,
        })
    }

    /// Run both tiers until `shutdown` resolves
    pub async fn run(self, shutdown: impl std::future::Future<Output = ()>) -> ClusterResult<()> {
        let rest = self.start_rest().await?;
        let realtime = self.start_realtime().await?;

        shutdown.await;
        tracing::info!("Shutting down");

        let rest_outcome = rest.shutdown().await;
        let realtime_outcome = realtime.shutdown().await;
        rest_outcome.and(realtime_outcome)
    }
}
