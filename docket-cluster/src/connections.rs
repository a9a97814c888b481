//! Realtime clients held by one worker

use docket_core::{ActivityBroadcast, TenantId, Visibility};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, RwLock};

/// Outbound frames queued per client
pub const CLIENT_QUEUE: usize = 64;

/// Identity a client authenticated with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub tenant: TenantId,
    pub user: Option<String>,
}

impl ClientIdentity {
    /// Whether a broadcast with this visibility reaches the client
    pub fn receives(&self, event: &ActivityBroadcast) -> bool {
        match event.visibility {
            Visibility::Public => true,
            Visibility::Tenant => self.tenant == event.tenant,
            Visibility::Private => {
                self.tenant == event.tenant
                    && matches!((&self.user, &event.user), (Some(mine), Some(theirs)) if mine == theirs)
            }
        }
    }
}

struct Client {
    identity: ClientIdentity,
    outbound: mpsc::Sender<String>,
}

/// Connected clients of one realtime worker
#[derive(Default)]
pub struct ConnectionSet {
    next_id: AtomicU64,
    clients: RwLock<HashMap<u64, Client>>,
}

impl ConnectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client. Returns its id and the receiving end of its queue.
    pub async fn register(&self, identity: ClientIdentity) -> (u64, mpsc::Receiver<String>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (outbound, rx) = mpsc::channel(CLIENT_QUEUE);
        self.clients.write().await.insert(id, Client { identity, outbound });
        (id, rx)
    }

    pub async fn remove(&self, id: u64) {
        self.clients.write().await.remove(&id);
    }

    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.read().await.is_empty()
    }

    /// Queue an event for every client allowed to see it.
    ///
    /// Clients whose queue is full miss the event. Returns how many clients
    /// it was queued for.
    pub async fn deliver(&self, event: &ActivityBroadcast) -> usize {
        let frame = match serde_json::to_string(event) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode broadcast");
                return 0;
            }
        };

        let clients = self.clients.read().await;
        let mut delivered = 0;
        for (id, client) in clients.iter() {
            if !client.identity.receives(event) {
                continue;
            }
            match client.outbound.try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(client = id, tenant_id = %client.identity.tenant, "Client queue full, event dropped");
                }
                // Socket task already gone; removal follows
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::{json, Value};

    fn event(visibility: Visibility, tenant: &str, user: Option<&str>) -> ActivityBroadcast {
        ActivityBroadcast {
            visibility,
            path: "company/c1".to_string(),
            path_spec: "company/:id".to_string(),
            verb: "put".to_string(),
            permissions: vec!["update".to_string()],
            title: "Document replaced".to_string(),
            description: "put company/c1".to_string(),
            timestamp: Utc::now(),
            activity_id: "a1".to_string(),
            response: json!({}),
            user: user.map(str::to_string),
            tenant: TenantId::from(tenant),
        }
    }

    fn identity(tenant: &str, user: Option<&str>) -> ClientIdentity {
        ClientIdentity {
            tenant: TenantId::from(tenant),
            user: user.map(str::to_string),
        }
    }

    #[test]
    fn test_visibility_filter() {
        let alice = identity("acme", Some("alice"));
        let anonymous = identity("acme", None);
        let other = identity("globex", Some("alice"));

        let public = event(Visibility::Public, "acme", None);
        assert!(alice.receives(&public) && other.receives(&public));

        let tenant = event(Visibility::Tenant, "acme", Some("bob"));
        assert!(alice.receives(&tenant));
        assert!(anonymous.receives(&tenant));
        assert!(!other.receives(&tenant));

        let private = event(Visibility::Private, "acme", Some("alice"));
        assert!(alice.receives(&private));
        assert!(!anonymous.receives(&private));
        assert!(!other.receives(&private));
        assert!(!anonymous.receives(&event(Visibility::Private, "acme", None)));
    }

    #[tokio::test]
    async fn test_deliver_to_matching_clients() {
        let set = ConnectionSet::new();
        let (_, mut acme_rx) = set.register(identity("acme", Some("alice"))).await;
        let (globex_id, mut globex_rx) = set.register(identity("globex", None)).await;
        assert_eq!(set.len().await, 2);

        let delivered = set.deliver(&event(Visibility::Tenant, "acme", None)).await;
        assert_eq!(delivered, 1);
        let frame: Value = serde_json::from_str(&acme_rx.recv().await.unwrap()).unwrap();
        assert_eq!(frame["pathSpec"], "company/:id");
        assert_eq!(frame["tenant"], "acme");
        assert!(globex_rx.try_recv().is_err());

        set.remove(globex_id).await;
        assert_eq!(set.deliver(&event(Visibility::Public, "acme", None)).await, 1);
    }
}
