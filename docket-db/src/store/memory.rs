//! In-memory document store

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{matches_filter, BulkOp, BulkResult, DocumentStore, Filter, ListQuery};
use crate::error::{DbError, DbResult};

type Table = BTreeMap<String, Value>;

/// Thread-safe in-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<HashMap<String, Table>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every table
    pub async fn clear(&self) {
        self.tables.write().await.clear();
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(&self, table: &str, id: &str, doc: Value) -> DbResult<Value> {
        let mut tables = self.tables.write().await;
        let rows = tables.entry(table.to_string()).or_default();
        if rows.contains_key(id) {
            return Err(DbError::AlreadyExists(format!("{}/{}", table, id)));
        }
        rows.insert(id.to_string(), doc.clone());
        Ok(doc)
    }

    async fn get(&self, table: &str, id: &str) -> DbResult<Option<Value>> {
        let tables = self.tables.read().await;
        Ok(tables.get(table).and_then(|rows| rows.get(id)).cloned())
    }

    async fn replace(&self, table: &str, id: &str, doc: Value) -> DbResult<Value> {
        let mut tables = self.tables.write().await;
        let slot = tables
            .get_mut(table)
            .and_then(|rows| rows.get_mut(id))
            .ok_or_else(|| DbError::NotFound(format!("{}/{}", table, id)))?;
        *slot = doc.clone();
        Ok(doc)
    }

    async fn delete(&self, table: &str, id: &str) -> DbResult<Option<Value>> {
        let mut tables = self.tables.write().await;
        Ok(tables.get_mut(table).and_then(|rows| rows.remove(id)))
    }

    async fn list(&self, table: &str, query: &ListQuery) -> DbResult<Vec<Value>> {
        let tables = self.tables.read().await;
        let Some(rows) = tables.get(table) else {
            return Ok(Vec::new());
        };
        Ok(rows
            .values()
            .filter(|doc| matches_filter(doc, &query.filter))
            .skip(query.skip)
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn count(&self, table: &str, filter: &Filter) -> DbResult<usize> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(table)
            .map(|rows| rows.values().filter(|doc| matches_filter(doc, filter)).count())
            .unwrap_or(0))
    }

    async fn bulk_write(&self, table: &str, ops: Vec<BulkOp>) -> DbResult<BulkResult> {
        let mut tables = self.tables.write().await;
        let rows = tables.entry(table.to_string()).or_default();

        for op in &ops {
            if let BulkOp::Insert { id, .. } = op {
                if rows.contains_key(id) {
                    return Err(DbError::AlreadyExists(format!("{}/{}", table, id)));
                }
            }
        }

        let mut result = BulkResult::default();
        for op in ops {
            match op {
                BulkOp::Insert { id, doc } => {
                    rows.insert(id, doc);
                    result.inserted += 1;
                }
                BulkOp::Upsert { id, doc } => {
                    rows.insert(id, doc);
                    result.upserted += 1;
                }
                BulkOp::Delete { id } => {
                    if rows.remove(&id).is_some() {
                        result.deleted += 1;
                    }
                }
            }
        }
        Ok(result)
    }

    async fn purge(&self, table: &str, filter: &Filter) -> DbResult<usize> {
        let mut tables = self.tables.write().await;
        let Some(rows) = tables.get_mut(table) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|_, doc| !matches_filter(doc, filter));
        Ok(before - rows.len())
    }

    async fn ping(&self) -> DbResult<()> {
        Ok(())
    }
}
