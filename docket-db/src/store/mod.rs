//! Document store abstraction
//!
//! Tables hold JSON documents keyed by id. Two backends:
//! - `MemoryStore`: in-process maps, for tests and single-node development
//! - `SledStore`: embedded persistent store, one sled tree per table

mod memory;
mod sled_store;

pub use self::memory::MemoryStore;
pub use self::sled_store::SledStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{DbError, DbResult};

/// Equality filter on top-level or dot-path fields
pub type Filter = BTreeMap<String, Value>;

/// List query options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub filter: Filter,
    #[serde(default)]
    pub skip: usize,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl ListQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, field: &str, value: Value) -> Self {
        self.filter.insert(field.to_string(), value);
        self
    }

    pub fn page(mut self, skip: usize, limit: usize) -> Self {
        self.skip = skip;
        self.limit = Some(limit);
        self
    }
}

/// One write of a bulk batch
#[derive(Debug, Clone, PartialEq)]
pub enum BulkOp {
    /// Fails the batch if the id exists
    Insert { id: String, doc: Value },
    Upsert { id: String, doc: Value },
    Delete { id: String },
}

/// Bulk write counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkResult {
    pub inserted: usize,
    pub upserted: usize,
    pub deleted: usize,
}

/// Storage operations used by every repository
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a new document. Fails with `AlreadyExists` on a duplicate id.
    async fn insert(&self, table: &str, id: &str, doc: Value) -> DbResult<Value>;

    async fn get(&self, table: &str, id: &str) -> DbResult<Option<Value>>;

    /// Overwrite an existing document. Fails with `NotFound` if absent.
    async fn replace(&self, table: &str, id: &str, doc: Value) -> DbResult<Value>;

    /// Remove a document, returning it if it existed
    async fn delete(&self, table: &str, id: &str) -> DbResult<Option<Value>>;

    /// Documents in id order after filtering, skipping and limiting
    async fn list(&self, table: &str, query: &ListQuery) -> DbResult<Vec<Value>>;

    async fn count(&self, table: &str, filter: &Filter) -> DbResult<usize>;

    /// Apply a batch of writes. Inserts are checked before anything is written.
    async fn bulk_write(&self, table: &str, ops: Vec<BulkOp>) -> DbResult<BulkResult>;

    /// Delete every document matching `filter`, returning the count
    async fn purge(&self, table: &str, filter: &Filter) -> DbResult<usize>;

    async fn ping(&self) -> DbResult<()>;
}

/// Whether `doc` satisfies every equality in `filter`
pub fn matches_filter(doc: &Value, filter: &Filter) -> bool {
    filter.iter().all(|(field, expected)| {
        let mut current = Some(doc);
        for segment in field.split('.') {
            current = current.and_then(|v| v.get(segment));
        }
        current == Some(expected)
    })
}

/// Store selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    Memory,
    Sled { path: PathBuf },
}

impl StorageConfig {
    /// Parse `mem` or `sled:<path>`
    pub fn parse(spec: &str) -> DbResult<Self> {
        match spec {
            "mem" | "memory" => Ok(StorageConfig::Memory),
            other => match other.strip_prefix("sled:") {
                Some(path) if !path.is_empty() => Ok(StorageConfig::Sled {
                    path: PathBuf::from(path),
                }),
                _ => Err(DbError::Storage(format!("Unknown store: {}", spec))),
            },
        }
    }

    pub fn test() -> Self {
        StorageConfig::Memory
    }
}

/// Opened backend from which each worker takes its own connection
#[derive(Clone)]
pub enum Datastore {
    Memory(Arc<MemoryStore>),
    Sled(SledStore),
}

impl Datastore {
    pub fn open(config: &StorageConfig) -> DbResult<Self> {
        match config {
            StorageConfig::Memory => Ok(Datastore::Memory(Arc::new(MemoryStore::new()))),
            StorageConfig::Sled { path } => Ok(Datastore::Sled(SledStore::open(path)?)),
        }
    }

    pub fn memory() -> Self {
        Datastore::Memory(Arc::new(MemoryStore::new()))
    }

    /// A connection handle for one worker
    pub fn connect(&self) -> Arc<dyn DocumentStore> {
        match self {
            Datastore::Memory(store) => store.clone() as Arc<dyn DocumentStore>,
            Datastore::Sled(store) => Arc::new(store.clone()),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Datastore::Memory(_) => "memory",
            Datastore::Sled(_) => "sled",
        }
    }
}
