//! Tenant document repository
//!
//! Documents carry `_id`, `createdAt` and `updatedAt`. Metadata lives in a
//! `_metadata` map of key -> JSON-encoded string inside the stored document;
//! it is stripped from documents handed out and only decoded here.

use chrono::Utc;
use docket_core::{MetadataValue, TenantId};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::tenant_table;
use crate::error::{DbError, DbResult};
use crate::store::{BulkOp, BulkResult, DocumentStore, ListQuery};

pub const ID_FIELD: &str = "_id";
pub const METADATA_FIELD: &str = "_metadata";
pub const CREATED_AT_FIELD: &str = "createdAt";
pub const UPDATED_AT_FIELD: &str = "updatedAt";

/// Fields owned by the store, never taken from client input
pub const SYSTEM_FIELDS: [&str; 4] = [ID_FIELD, METADATA_FIELD, CREATED_AT_FIELD, UPDATED_AT_FIELD];

pub struct DocumentRepo {
    store: Arc<dyn DocumentStore>,
}

impl DocumentRepo {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Insert a new document with system fields stamped
    pub async fn insert(
        &self,
        tenant: &TenantId,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> DbResult<Value> {
        let doc = Self::stamp_new(id, fields);
        let stored = self
            .store
            .insert(&tenant_table(tenant, collection), id, doc)
            .await?;
        Ok(Self::public_view(stored))
    }

    pub async fn get(&self, tenant: &TenantId, collection: &str, id: &str) -> DbResult<Option<Value>> {
        Ok(self
            .store
            .get(&tenant_table(tenant, collection), id)
            .await?
            .map(Self::public_view))
    }

    pub async fn list(&self, tenant: &TenantId, collection: &str, query: &ListQuery) -> DbResult<Vec<Value>> {
        let docs = self.store.list(&tenant_table(tenant, collection), query).await?;
        Ok(docs.into_iter().map(Self::public_view).collect())
    }

    /// Overwrite the app fields of a document, keeping its system fields
    pub async fn replace(
        &self,
        tenant: &TenantId,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> DbResult<Value> {
        let table = tenant_table(tenant, collection);
        let existing = self
            .store
            .get(&table, id)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("{}/{}", collection, id)))?;

        let mut doc = Self::stamp_new(id, fields);
        if let Value::Object(map) = &mut doc {
            for key in [CREATED_AT_FIELD, METADATA_FIELD] {
                if let Some(value) = existing.get(key) {
                    map.insert(key.to_string(), value.clone());
                }
            }
        }
        let stored = self.store.replace(&table, id, doc).await?;
        Ok(Self::public_view(stored))
    }

    /// Write back a document produced by path updates
    pub async fn save(&self, tenant: &TenantId, collection: &str, id: &str, mut doc: Value) -> DbResult<Value> {
        let table = tenant_table(tenant, collection);
        let existing = self
            .store
            .get(&table, id)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("{}/{}", collection, id)))?;
        if let Value::Object(map) = &mut doc {
            map.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
            map.insert(UPDATED_AT_FIELD.to_string(), Value::String(Utc::now().to_rfc3339()));
            match existing.get(METADATA_FIELD) {
                Some(meta) => map.insert(METADATA_FIELD.to_string(), meta.clone()),
                None => map.remove(METADATA_FIELD),
            };
        }
        let stored = self.store.replace(&table, id, doc).await?;
        Ok(Self::public_view(stored))
    }

    pub async fn delete(&self, tenant: &TenantId, collection: &str, id: &str) -> DbResult<Option<Value>> {
        Ok(self
            .store
            .delete(&tenant_table(tenant, collection), id)
            .await?
            .map(Self::public_view))
    }

    /// Batch insert or upsert prepared `(id, fields)` pairs
    pub async fn bulk_put(
        &self,
        tenant: &TenantId,
        collection: &str,
        docs: Vec<(String, Map<String, Value>)>,
        upsert: bool,
    ) -> DbResult<BulkResult> {
        let ops = docs
            .into_iter()
            .map(|(id, fields)| {
                let doc = Self::stamp_new(&id, fields);
                if upsert {
                    BulkOp::Upsert { id, doc }
                } else {
                    BulkOp::Insert { id, doc }
                }
            })
            .collect();
        self.store.bulk_write(&tenant_table(tenant, collection), ops).await
    }

    pub async fn bulk_delete(&self, tenant: &TenantId, collection: &str, ids: Vec<String>) -> DbResult<BulkResult> {
        let ops = ids.into_iter().map(|id| BulkOp::Delete { id }).collect();
        self.store.bulk_write(&tenant_table(tenant, collection), ops).await
    }

    // ==================== Metadata ====================

    pub async fn metadata(
        &self,
        tenant: &TenantId,
        collection: &str,
        id: &str,
    ) -> DbResult<BTreeMap<String, MetadataValue>> {
        let doc = self.raw(tenant, collection, id).await?;
        let entries = doc
            .get(METADATA_FIELD)
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter_map(|(key, raw)| raw.as_str().map(|s| (key.clone(), MetadataValue::decode(s))))
                    .collect()
            })
            .unwrap_or_default();
        Ok(entries)
    }

    pub async fn set_metadata(
        &self,
        tenant: &TenantId,
        collection: &str,
        id: &str,
        key: &str,
        value: &MetadataValue,
    ) -> DbResult<()> {
        let mut doc = self.raw(tenant, collection, id).await?;
        if let Value::Object(map) = &mut doc {
            let meta = map
                .entry(METADATA_FIELD.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !meta.is_object() {
                *meta = Value::Object(Map::new());
            }
            if let Value::Object(entries) = meta {
                entries.insert(key.to_string(), Value::String(value.encode()));
            }
        }
        self.store.replace(&tenant_table(tenant, collection), id, doc).await?;
        Ok(())
    }

    /// Remove a metadata key. Returns whether it existed.
    pub async fn remove_metadata(&self, tenant: &TenantId, collection: &str, id: &str, key: &str) -> DbResult<bool> {
        let mut doc = self.raw(tenant, collection, id).await?;
        let removed = doc
            .get_mut(METADATA_FIELD)
            .and_then(Value::as_object_mut)
            .and_then(|entries| entries.remove(key))
            .is_some();
        if removed {
            self.store.replace(&tenant_table(tenant, collection), id, doc).await?;
        }
        Ok(removed)
    }

    // ==================== Helpers ====================

    async fn raw(&self, tenant: &TenantId, collection: &str, id: &str) -> DbResult<Value> {
        self.store
            .get(&tenant_table(tenant, collection), id)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("{}/{}", collection, id)))
    }

    fn stamp_new(id: &str, mut fields: Map<String, Value>) -> Value {
        for key in SYSTEM_FIELDS {
            fields.remove(key);
        }
        let now = Value::String(Utc::now().to_rfc3339());
        fields.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
        fields.insert(CREATED_AT_FIELD.to_string(), now.clone());
        fields.insert(UPDATED_AT_FIELD.to_string(), now);
        Value::Object(fields)
    }

    fn public_view(mut doc: Value) -> Value {
        if let Value::Object(map) = &mut doc {
            map.remove(METADATA_FIELD);
        }
        doc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn repo() -> DocumentRepo {
        DocumentRepo::new(Arc::new(MemoryStore::new()))
    }

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_system_fields_are_stamped() {
        let repo = repo();
        let tenant = TenantId::from("acme");
        let doc = repo
            .insert(&tenant, "company", "c1", fields(json!({"name": "Acme", "_id": "spoof"})))
            .await
            .unwrap();
        assert_eq!(doc["_id"], json!("c1"));
        assert!(doc["createdAt"].is_string());
        assert!(doc.get("_metadata").is_none());
    }

    #[tokio::test]
    async fn test_metadata_survives_replace() {
        let repo = repo();
        let tenant = TenantId::from("acme");
        repo.insert(&tenant, "company", "c1", fields(json!({"name": "Acme"})))
            .await
            .unwrap();
        repo.set_metadata(&tenant, "company", "c1", "color", &MetadataValue::Text("red".into()))
            .await
            .unwrap();
        repo.set_metadata(&tenant, "company", "c1", "score", &MetadataValue::Number(4.5))
            .await
            .unwrap();

        repo.replace(&tenant, "company", "c1", fields(json!({"name": "Acme 2"})))
            .await
            .unwrap();

        let meta = repo.metadata(&tenant, "company", "c1").await.unwrap();
        assert_eq!(meta.get("color"), Some(&MetadataValue::Text("red".into())));
        assert_eq!(meta.get("score"), Some(&MetadataValue::Number(4.5)));

        assert!(repo.remove_metadata(&tenant, "company", "c1", "color").await.unwrap());
        assert!(!repo.remove_metadata(&tenant, "company", "c1", "color").await.unwrap());
    }

    #[tokio::test]
    async fn test_tenants_are_isolated() {
        let repo = repo();
        repo.insert(&TenantId::from("a"), "company", "c1", Map::new())
            .await
            .unwrap();
        assert!(repo
            .get(&TenantId::from("b"), "company", "c1")
            .await
            .unwrap()
            .is_none());
    }
}
