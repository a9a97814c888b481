//! REST worker
//!
//! Each worker opens its own store connection and owns its schema registry
//! and token cache. All workers accept on the same listener.

use docket_api::{build_app, serve_shared, ApiConfig, AppState};
use docket_broker::Broker;
use docket_db::{Datastore, DocketDatabase};
use std::net::TcpListener;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use crate::error::{ClusterError, ClusterResult};
use crate::worker::WorkerMessage;

/// Everything a REST worker needs to start
#[derive(Clone)]
pub struct RestWorkerContext {
    pub datastore: Datastore,
    pub broker: Arc<dyn Broker>,
    pub listener: Arc<TcpListener>,
    pub api: ApiConfig,
}

/// Run one REST worker until it receives `Shutdown` or its inbox closes
pub async fn run_rest_worker(
    index: usize,
    context: RestWorkerContext,
    mut inbox: mpsc::Receiver<WorkerMessage>,
) -> ClusterResult<()> {
    let database = Arc::new(DocketDatabase::new(context.datastore.connect()));
    let state = AppState::new(database, context.broker.clone()).with_worker(index);
    let preloaded = state.schemas.preload_all().await?;

    let app = build_app(&context.api, state.clone());
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let listener = context.listener.clone();
    let server = tokio::spawn(async move {
        let shutdown = async move {
            let _ = stop_rx.await;
        };
        serve_shared(&listener, app, shutdown)
            .await
            .map_err(|e| ClusterError::Server(e.to_string()))
    });
    tracing::info!(worker = index, schemas = preloaded, "REST worker started");

    while let Some(message) = inbox.recv().await {
        match message {
            WorkerMessage::SchemaInvalidate { tenant_id } => {
                state.schemas.invalidate(&tenant_id).await;
            }
            WorkerMessage::ConnectionHandoff { peer, .. } => {
                tracing::warn!(worker = index, peer = %peer, "REST worker does not take handoffs");
            }
            WorkerMessage::Shutdown => break,
        }
    }

    let _ = stop_tx.send(());
    let outcome = server
        .await
        .map_err(|e| ClusterError::Server(format!("REST worker {} server task: {}", index, e)))?;
    tracing::info!(worker = index, "REST worker stopped");
    outcome
}
