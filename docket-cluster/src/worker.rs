//! Worker pool plumbing
//!
//! Workers are tokio tasks. The supervisor talks to them only through typed
//! [`WorkerMessage`]s on per-worker channels.

use docket_core::TenantId;
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{ClusterError, ClusterResult};

/// Messages queued per worker
pub const WORKER_QUEUE: usize = 256;

/// Supervisor to worker messages
#[derive(Debug)]
pub enum WorkerMessage {
    /// Drop cached schema descriptors for a tenant
    SchemaInvalidate { tenant_id: TenantId },
    /// An accepted socket nothing has read from yet
    ConnectionHandoff { stream: TcpStream, peer: SocketAddr },
    Shutdown,
}

/// Cloneable sending side of a pool
#[derive(Debug, Clone, Default)]
pub struct PoolSender {
    senders: Vec<mpsc::Sender<WorkerMessage>>,
}

impl PoolSender {
    pub fn new(senders: Vec<mpsc::Sender<WorkerMessage>>) -> Self {
        Self { senders }
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }

    pub async fn send_to(&self, index: usize, message: WorkerMessage) -> ClusterResult<()> {
        let sender = self.senders.get(index).ok_or(ClusterError::WorkerGone(index))?;
        sender
            .send(message)
            .await
            .map_err(|_| ClusterError::WorkerGone(index))
    }

    /// Queue a message without waiting for room in the worker's inbox
    pub fn try_send_to(&self, index: usize, message: WorkerMessage) -> ClusterResult<()> {
        let sender = self.senders.get(index).ok_or(ClusterError::WorkerGone(index))?;
        sender.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ClusterError::WorkerBusy(index),
            mpsc::error::TrySendError::Closed(_) => ClusterError::WorkerGone(index),
        })
    }

    /// Tell every worker to drop a tenant's schema. Returns how many were reached.
    pub async fn invalidate_schema(&self, tenant_id: &TenantId) -> usize {
        let mut reached = 0;
        for (index, sender) in self.senders.iter().enumerate() {
            let message = WorkerMessage::SchemaInvalidate {
                tenant_id: tenant_id.clone(),
            };
            match sender.send(message).await {
                Ok(()) => reached += 1,
                Err(_) => tracing::warn!(worker = index, "Worker gone, schema invalidation dropped"),
            }
        }
        reached
    }
}

/// A running pool of worker tasks
pub struct WorkerPool {
    sender: PoolSender,
    tasks: Vec<JoinHandle<ClusterResult<()>>>,
}

impl WorkerPool {
    /// Spawn `count` workers. `spawn` receives the worker index and its inbox.
    pub fn spawn<F>(count: usize, mut spawn: F) -> Self
    where
        F: FnMut(usize, mpsc::Receiver<WorkerMessage>) -> JoinHandle<ClusterResult<()>>,
    {
        let mut senders = Vec::with_capacity(count);
        let mut tasks = Vec::with_capacity(count);
        for index in 0..count {
            let (tx, rx) = mpsc::channel(WORKER_QUEUE);
            senders.push(tx);
            tasks.push(spawn(index, rx));
        }
        Self {
            sender: PoolSender::new(senders),
            tasks,
        }
    }

    pub fn sender(&self) -> PoolSender {
        self.sender.clone()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Ask every worker to stop and wait for them
    pub async fn shutdown(self) -> ClusterResult<()> {
        for index in 0..self.sender.len() {
            let _ = self.sender.send_to(index, WorkerMessage::Shutdown).await;
        }
        let mut first_error = None;
        for (index, task) in self.tasks.into_iter().enumerate() {
            let outcome = task
                .await
                .map_err(|e| ClusterError::Server(format!("worker {} panicked: {}", index, e)))
                .and_then(|result| result);
            if let Err(e) = outcome {
                tracing::error!(worker = index, error = %e, "Worker failed");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pool_delivers_and_shuts_down() {
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        let pool = WorkerPool::spawn(3, |index, mut rx| {
            let seen = seen_tx.clone();
            tokio::spawn(async move {
                while let Some(message) = rx.recv().await {
                    match message {
                        WorkerMessage::SchemaInvalidate { tenant_id } => {
                            let _ = seen.send((index, tenant_id));
                        }
                        WorkerMessage::Shutdown => break,
                        WorkerMessage::ConnectionHandoff { .. } => {}
                    }
                }
                Ok(())
            })
        });
        assert_eq!(pool.len(), 3);

        let reached = pool.sender().invalidate_schema(&TenantId::from("acme")).await;
        assert_eq!(reached, 3);
        pool.shutdown().await.unwrap();

        let mut workers = Vec::new();
        while let Ok((index, tenant)) = seen_rx.try_recv() {
            assert_eq!(tenant.as_str(), "acme");
            workers.push(index);
        }
        workers.sort_unstable();
        assert_eq!(workers, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_send_to_unknown_worker() {
        let sender = PoolSender::default();
        assert!(matches!(
            sender.send_to(4, WorkerMessage::Shutdown).await,
            Err(ClusterError::WorkerGone(4))
        ));
    }

    #[tokio::test]
    async fn test_try_send_to_full_or_closed_inbox() {
        let (tx, rx) = mpsc::channel(1);
        let sender = PoolSender::new(vec![tx]);

        sender.try_send_to(0, WorkerMessage::Shutdown).unwrap();
        assert!(matches!(
            sender.try_send_to(0, WorkerMessage::Shutdown),
            Err(ClusterError::WorkerBusy(0))
        ));

        drop(rx);
        assert!(matches!(
            sender.try_send_to(0, WorkerMessage::Shutdown),
            Err(ClusterError::WorkerGone(0))
        ));
    }
}
