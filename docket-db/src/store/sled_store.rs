//! Sled-backed persistent document store
//!
//! Each table is a sled tree; values are JSON bytes keyed by document id.

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;

use super::{matches_filter, BulkOp, BulkResult, DocumentStore, Filter, ListQuery};
use crate::error::{DbError, DbResult};

#[derive(Debug, Clone)]
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    /// Open or create a sled database
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let db = sled::open(path)
            .map_err(|e| DbError::Storage(format!("Failed to open sled db: {}", e)))?;
        Ok(Self { db })
    }

    /// Flush to disk
    pub fn flush(&self) -> DbResult<()> {
        self.db
            .flush()
            .map_err(|e| DbError::Storage(format!("Failed to flush db: {}", e)))?;
        Ok(())
    }

    fn tree(&self, table: &str) -> DbResult<sled::Tree> {
        self.db
            .open_tree(table)
            .map_err(|e| DbError::Storage(format!("Failed to open tree {}: {}", table, e)))
    }

    fn serialize(value: &Value) -> DbResult<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    fn deserialize(bytes: &[u8]) -> DbResult<Value> {
        Ok(serde_json::from_slice(bytes)?)
    }

    fn scan(tree: &sled::Tree) -> impl Iterator<Item = DbResult<(sled::IVec, Value)>> + '_ {
        tree.iter().map(|entry| {
            let (key, bytes) = entry?;
            Ok((key, Self::deserialize(&bytes)?))
        })
    }
}

#[async_trait]
impl DocumentStore for SledStore {
    async fn insert(&self, table: &str, id: &str, doc: Value) -> DbResult<Value> {
        let tree = self.tree(table)?;
        let bytes = Self::serialize(&doc)?;
        tree.compare_and_swap(id.as_bytes(), None as Option<&[u8]>, Some(bytes))?
            .map_err(|_| DbError::AlreadyExists(format!("{}/{}", table, id)))?;
        Ok(doc)
    }

    async fn get(&self, table: &str, id: &str) -> DbResult<Option<Value>> {
        let tree = self.tree(table)?;
        match tree.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(Self::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn replace(&self, table: &str, id: &str, doc: Value) -> DbResult<Value> {
        let tree = self.tree(table)?;
        if !tree.contains_key(id.as_bytes())? {
            return Err(DbError::NotFound(format!("{}/{}", table, id)));
        }
        tree.insert(id.as_bytes(), Self::serialize(&doc)?)?;
        Ok(doc)
    }

    async fn delete(&self, table: &str, id: &str) -> DbResult<Option<Value>> {
        let tree = self.tree(table)?;
        match tree.remove(id.as_bytes())? {
            Some(bytes) => Ok(Some(Self::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn list(&self, table: &str, query: &ListQuery) -> DbResult<Vec<Value>> {
        let tree = self.tree(table)?;
        let mut docs = Vec::new();
        let mut skipped = 0;
        let limit = query.limit.unwrap_or(usize::MAX);
        for entry in Self::scan(&tree) {
            if docs.len() >= limit {
                break;
            }
            let (_, doc) = entry?;
            if !matches_filter(&doc, &query.filter) {
                continue;
            }
            if skipped < query.skip {
                skipped += 1;
                continue;
            }
            docs.push(doc);
        }
        Ok(docs)
    }

    async fn count(&self, table: &str, filter: &Filter) -> DbResult<usize> {
        let tree = self.tree(table)?;
        let mut count = 0;
        for entry in Self::scan(&tree) {
            let (_, doc) = entry?;
            if matches_filter(&doc, filter) {
                count += 1;
            }
        }
        Ok(count)
    }

    async fn bulk_write(&self, table: &str, ops: Vec<BulkOp>) -> DbResult<BulkResult> {
        let tree = self.tree(table)?;
        for op in &ops {
            if let BulkOp::Insert { id, .. } = op {
                if tree.contains_key(id.as_bytes())? {
                    return Err(DbError::AlreadyExists(format!("{}/{}", table, id)));
                }
            }
        }

        let mut batch = sled::Batch::default();
        let mut result = BulkResult::default();
        for op in ops {
            match op {
                BulkOp::Insert { id, doc } => {
                    batch.insert(id.as_bytes(), Self::serialize(&doc)?);
                    result.inserted += 1;
                }
                BulkOp::Upsert { id, doc } => {
                    batch.insert(id.as_bytes(), Self::serialize(&doc)?);
                    result.upserted += 1;
                }
                BulkOp::Delete { id } => {
                    if tree.contains_key(id.as_bytes())? {
                        result.deleted += 1;
                    }
                    batch.remove(id.as_bytes());
                }
            }
        }
        tree.apply_batch(batch)?;
        Ok(result)
    }

    async fn purge(&self, table: &str, filter: &Filter) -> DbResult<usize> {
        let tree = self.tree(table)?;
        let mut batch = sled::Batch::default();
        let mut removed = 0;
        for entry in Self::scan(&tree) {
            let (key, doc) = entry?;
            if matches_filter(&doc, filter) {
                batch.remove(key);
                removed += 1;
            }
        }
        tree.apply_batch(batch)?;
        Ok(removed)
    }

    async fn ping(&self) -> DbResult<()> {
        self.db.size_on_disk()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_sled_roundtrip_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = SledStore::open(dir.path()).unwrap();
            store.insert("acme:company", "c1", json!({"name": "Acme"})).await.unwrap();
            assert!(matches!(
                store.insert("acme:company", "c1", json!({})).await,
                Err(DbError::AlreadyExists(_))
            ));
            store.flush().unwrap();
        }

        let store = SledStore::open(dir.path()).unwrap();
        assert_eq!(
            store.get("acme:company", "c1").await.unwrap(),
            Some(json!({"name": "Acme"}))
        );
        assert_eq!(store.get("other:company", "c1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_sled_list_purge_bulk() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::open(dir.path()).unwrap();

        let ops = (0..4)
            .map(|i| BulkOp::Insert {
                id: format!("d{}", i),
                doc: json!({"n": i, "even": i % 2 == 0}),
            })
            .collect();
        let result = store.bulk_write("t", ops).await.unwrap();
        assert_eq!(result.inserted, 4);

        let page = store.list("t", &ListQuery::all().page(1, 2)).await.unwrap();
        assert_eq!(page, vec![json!({"n": 1, "even": false}), json!({"n": 2, "even": true})]);

        let mut filter = Filter::new();
        filter.insert("even".to_string(), json!(true));
        assert_eq!(store.purge("t", &filter).await.unwrap(), 2);
        assert_eq!(store.count("t", &Filter::new()).await.unwrap(), 2);
    }
}
