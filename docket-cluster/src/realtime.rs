//! Realtime tier
//!
//! The gateway accepts sockets without reading from them and hands each one
//! to a worker picked from the client address. Workers resume the connection
//! as HTTP, upgrade `/realtime` to a WebSocket and push activity broadcasts
//! from the adapter channel to the clients allowed to see them.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::{header::ORIGIN, HeaderMap},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use docket_api::{gate::token_value, ApiError};
use docket_broker::{topics, Broker, BrokerPayload};
use docket_core::{check_origin, AuthError};
use docket_db::{Datastore, DocketDatabase, TokenCache};
use futures_util::{SinkExt, StreamExt};
use hyper::server::conn::http1;
use hyper_util::{rt::TokioIo, service::TowerToHyperService};
use serde_json::json;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};

use crate::connections::{ClientIdentity, ConnectionSet};
use crate::error::{ClusterError, ClusterResult};
use crate::worker::{PoolSender, WorkerMessage};

/// Worker for a client address: the sum of its decimal digits modulo the
/// worker count. Non-digit characters are ignored.
pub fn sticky_worker_index(address: &str, workers: usize) -> usize {
    if workers == 0 {
        return 0;
    }
    let sum: usize = address
        .chars()
        .filter_map(|c| c.to_digit(10))
        .map(|d| d as usize)
        .sum();
    sum % workers
}

// ==================== Worker ====================

/// Everything a realtime worker needs to start
#[derive(Clone)]
pub struct RealtimeWorkerContext {
    pub datastore: Datastore,
    pub broker: Arc<dyn Broker>,
    /// Host the worker binds its own port on
    pub host: String,
    /// Reports `(index, local address)` once the worker is listening
    pub ready: mpsc::UnboundedSender<(usize, SocketAddr)>,
}

#[derive(Clone)]
struct WorkerState {
    index: usize,
    tokens: Arc<TokenCache>,
    connections: Arc<ConnectionSet>,
}

fn worker_router(state: WorkerState) -> Router {
    Router::new()
        .route("/realtime", get(upgrade))
        .route("/health", get(health))
        .with_state(state)
}

async fn health(State(state): State<WorkerState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "worker": state.index,
        "connections": state.connections.len().await,
    }))
}

async fn upgrade(
    State(state): State<WorkerState>,
    Query(query): Query<BTreeMap<String, String>>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let value = token_value(&query, &headers).ok_or(AuthError::InvalidToken)?;
    let token = state
        .tokens
        .resolve(&value)
        .await?
        .ok_or(AuthError::InvalidToken)?;
    let origin = headers.get(ORIGIN).and_then(|v| v.to_str().ok());
    check_origin(&token, origin)?;

    let identity = ClientIdentity {
        tenant: token.tenant,
        user: token.user,
    };
    Ok(ws
        .on_upgrade(move |socket| serve_client(state, identity, socket))
        .into_response())
}

async fn serve_client(state: WorkerState, identity: ClientIdentity, socket: WebSocket) {
    let tenant = identity.tenant.clone();
    let (id, mut outbound) = state.connections.register(identity).await;
    tracing::debug!(worker = state.index, client = id, tenant_id = %tenant, "Realtime client connected");

    let (mut sink, mut stream) = socket.split();
    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            if sink.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
    });
    // Inbound frames carry nothing; read only to notice the close
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = stream.next().await {
            if matches!(message, Message::Close(_)) {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.connections.remove(id).await;
    tracing::debug!(worker = state.index, client = id, "Realtime client disconnected");
}

fn resume_connection(router: Router, stream: TcpStream, peer: SocketAddr, index: usize) {
    let service = TowerToHyperService::new(router);
    tokio::spawn(async move {
        let connection = http1::Builder::new()
            .serve_connection(TokioIo::new(stream), service)
            .with_upgrades();
        if let Err(e) = connection.await {
            tracing::debug!(worker = index, peer = %peer, error = %e, "Handed-off connection ended");
        }
    });
}

/// Run one realtime worker until it receives `Shutdown` or its inbox closes
pub async fn run_realtime_worker(
    index: usize,
    context: RealtimeWorkerContext,
    mut inbox: mpsc::Receiver<WorkerMessage>,
) -> ClusterResult<()> {
    let database = Arc::new(DocketDatabase::new(context.datastore.connect()));
    let state = WorkerState {
        index,
        tokens: Arc::new(TokenCache::new(database)),
        connections: Arc::new(ConnectionSet::new()),
    };
    let connections = state.connections.clone();
    let router = worker_router(state);

    let mut adapter = context.broker.subscribe(topics::REALTIME).await?;
    let listener = TcpListener::bind((context.host.as_str(), 0)).await?;
    let local_addr = listener.local_addr()?;

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let own_router = router.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, own_router)
            .with_graceful_shutdown(async move {
                let _ = stop_rx.await;
            })
            .await
    });
    let _ = context.ready.send((index, local_addr));
    tracing::info!(worker = index, addr = %local_addr, "Realtime worker started");

    let mut adapter_open = true;
    loop {
        tokio::select! {
            message = inbox.recv() => match message {
                Some(WorkerMessage::ConnectionHandoff { stream, peer }) => {
                    tracing::debug!(worker = index, peer = %peer, "Connection handed off");
                    resume_connection(router.clone(), stream, peer, index);
                }
                Some(WorkerMessage::SchemaInvalidate { .. }) => {}
                Some(WorkerMessage::Shutdown) | None => break,
            },
            event = adapter.recv(), if adapter_open => match event {
                Some(message) => {
                    if let BrokerPayload::Activity(event) = message.payload {
                        let delivered = connections.deliver(&event).await;
                        tracing::trace!(worker = index, delivered, "Broadcast delivered");
                    }
                }
                None => {
                    tracing::warn!(worker = index, topic = topics::REALTIME, "Adapter channel closed");
                    adapter_open = false;
                }
            },
        }
    }

    let _ = stop_tx.send(());
    server
        .await
        .map_err(|e| ClusterError::Server(format!("realtime worker {} server task: {}", index, e)))?
        .map_err(ClusterError::Io)?;
    tracing::info!(worker = index, "Realtime worker stopped");
    Ok(())
}

// ==================== Gateway ====================

/// Listener that routes accepted sockets to realtime workers
pub struct RealtimeGateway {
    listener: TcpListener,
    workers: PoolSender,
}

impl RealtimeGateway {
    pub async fn bind(addr: &str, workers: PoolSender) -> ClusterResult<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, workers })
    }

    pub fn local_addr(&self) -> ClusterResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept until `stop` fires
    pub async fn run(self, mut stop: oneshot::Receiver<()>) {
        loop {
            tokio::select! {
                _ = &mut stop => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => self.hand_off(stream, peer),
                    Err(e) => tracing::warn!(error = %e, "Accept failed"),
                },
            }
        }
        tracing::info!("Realtime gateway stopped");
    }

    /// Never waits on a worker's inbox; a full or gone worker drops the socket
    fn hand_off(&self, stream: TcpStream, peer: SocketAddr) {
        let index = sticky_worker_index(&peer.ip().to_string(), self.workers.len());
        if let Err(e) = self
            .workers
            .try_send_to(index, WorkerMessage::ConnectionHandoff { stream, peer })
        {
            tracing::warn!(worker = index, peer = %peer, error = %e, "Handoff failed, connection dropped");
        }
    }
}
