//! Application state for the API server

use docket_broker::Broker;
use docket_core::SchemaRegistry;
use docket_db::{DocketDatabase, DocumentService, SchemaService, TenantService, TokenCache};
use std::sync::Arc;

use crate::activity::ActivityRecorder;

/// Per-worker API state.
///
/// Every REST worker builds its own state: its own schema registry and token
/// cache over a shared store and broker.
#[derive(Clone)]
pub struct AppState {
    pub database: Arc<DocketDatabase>,
    pub schemas: Arc<SchemaService>,
    pub documents: Arc<DocumentService>,
    pub tenants: Arc<TenantService>,
    pub token_cache: Arc<TokenCache>,
    pub broker: Arc<dyn Broker>,
    pub recorder: Arc<ActivityRecorder>,
    /// Worker index when running inside a pool
    pub worker: Option<usize>,
    /// API version
    pub version: String,
}

impl AppState {
    pub fn new(database: Arc<DocketDatabase>, broker: Arc<dyn Broker>) -> Self {
        let schemas = Arc::new(SchemaService::new(
            database.clone(),
            Arc::new(SchemaRegistry::new()),
        ));
        let documents = Arc::new(DocumentService::new(database.clone(), schemas.clone()));
        let tenants = Arc::new(TenantService::new(database.clone()));
        let token_cache = Arc::new(TokenCache::new(database.clone()));
        let recorder = Arc::new(ActivityRecorder::new(database.clone(), broker.clone()));

        Self {
            database,
            schemas,
            documents,
            tenants,
            token_cache,
            broker,
            recorder,
            worker: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn with_worker(mut self, worker: usize) -> Self {
        self.worker = Some(worker);
        self
    }
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub enable_cors: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            enable_cors: true,
        }
    }
}
