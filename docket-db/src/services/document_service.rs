//! Document service
//!
//! Schema-validated CRUD, path updates, bulk operations and metadata for
//! tenant collections.

use docket_core::{
    apply, validate, AppliedResult, MetadataValue, PathUpdate, TenantId, ValidationError,
    ValidationReport,
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{DbError, DbResult};
use crate::repos::{new_record_id, DocketDatabase, ID_FIELD};
use crate::services::SchemaService;
use crate::store::{BulkResult, ListQuery};

/// Result of a bulk add
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkAddResult {
    pub ids: Vec<String>,
    #[serde(flatten)]
    pub counts: BulkResult,
}

pub struct DocumentService {
    database: Arc<DocketDatabase>,
    schemas: Arc<SchemaService>,
}

impl DocumentService {
    pub fn new(database: Arc<DocketDatabase>, schemas: Arc<SchemaService>) -> Self {
        Self { database, schemas }
    }

    /// Validate app properties, injecting defaults.
    ///
    /// Collections without a schema are always valid.
    pub async fn check(&self, tenant: &TenantId, collection: &str, fields: &mut Map<String, Value>) -> DbResult<ValidationReport> {
        self.schemas.descriptors(tenant).await?;
        Ok(self
            .schemas
            .registry()
            .validate_document(tenant, collection, fields)
            .await)
    }

    pub async fn create(&self, tenant: &TenantId, collection: &str, body: Value) -> DbResult<Value> {
        let mut fields = Self::object(body)?;
        self.check(tenant, collection, &mut fields).await?.into_result()?;
        let id = new_record_id();
        let doc = self
            .database
            .documents
            .insert(tenant, collection, &id, fields)
            .await?;
        tracing::debug!(tenant_id = %tenant, collection, entity_id = %id, "Document created");
        Ok(doc)
    }

    pub async fn get(&self, tenant: &TenantId, collection: &str, id: &str) -> DbResult<Value> {
        self.database
            .documents
            .get(tenant, collection, id)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("{}/{}", collection, id)))
    }

    pub async fn list(&self, tenant: &TenantId, collection: &str, query: &ListQuery) -> DbResult<Vec<Value>> {
        self.database.documents.list(tenant, collection, query).await
    }

    pub async fn replace(&self, tenant: &TenantId, collection: &str, id: &str, body: Value) -> DbResult<Value> {
        let mut fields = Self::object(body)?;
        self.check(tenant, collection, &mut fields).await?.into_result()?;
        self.database
            .documents
            .replace(tenant, collection, id, fields)
            .await
    }

    /// Apply path updates in order.
    ///
    /// Each update is validated, applied and persisted before the next one.
    /// The first failure stops the batch and is returned; updates already
    /// persisted stay committed.
    pub async fn patch(
        &self,
        tenant: &TenantId,
        collection: &str,
        id: &str,
        updates: Vec<PathUpdate>,
    ) -> DbResult<Vec<AppliedResult>> {
        let descriptor = self.schemas.collection(tenant, collection).await?;
        let mut results = Vec::with_capacity(updates.len());

        for update in &updates {
            let mut entity = self.get(tenant, collection, id).await?;
            let validated = match &descriptor {
                Some(d) => validate(update, &d.context, &d.flattened)?,
                None => {
                    let path = update.path.clone().unwrap_or_default();
                    return Err(ValidationError::NoMatchingPath(path).into());
                }
            };
            let applied = apply(&mut entity, &validated)?;
            self.database
                .documents
                .save(tenant, collection, id, entity)
                .await?;
            results.push(applied);
        }

        Ok(results)
    }

    pub async fn delete(&self, tenant: &TenantId, collection: &str, id: &str) -> DbResult<Value> {
        self.database
            .documents
            .delete(tenant, collection, id)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("{}/{}", collection, id)))
    }

    // ==================== Bulk ====================

    /// Insert many documents. Every document is validated before any write.
    pub async fn bulk_add(&self, tenant: &TenantId, collection: &str, bodies: Vec<Value>) -> DbResult<BulkAddResult> {
        let mut prepared = Vec::with_capacity(bodies.len());
        for body in bodies {
            let mut fields = Self::object(body)?;
            self.check(tenant, collection, &mut fields).await?.into_result()?;
            prepared.push((new_record_id(), fields));
        }
        let ids = prepared.iter().map(|(id, _)| id.clone()).collect();
        let counts = self
            .database
            .documents
            .bulk_put(tenant, collection, prepared, false)
            .await?;
        Ok(BulkAddResult { ids, counts })
    }

    pub async fn bulk_delete(&self, tenant: &TenantId, collection: &str, ids: Vec<String>) -> DbResult<BulkResult> {
        self.database
            .documents
            .bulk_delete(tenant, collection, ids)
            .await
    }

    /// Upsert many documents by `_id`, generating ids where absent
    pub async fn bulk_load(&self, tenant: &TenantId, collection: &str, bodies: Vec<Value>) -> DbResult<BulkResult> {
        let mut prepared = Vec::with_capacity(bodies.len());
        for body in bodies {
            let mut fields = Self::object(body)?;
            let id = match fields.get(ID_FIELD) {
                Some(Value::String(id)) if !id.is_empty() => id.clone(),
                _ => new_record_id(),
            };
            self.check(tenant, collection, &mut fields).await?.into_result()?;
            prepared.push((id, fields));
        }
        self.database
            .documents
            .bulk_put(tenant, collection, prepared, true)
            .await
    }

    // ==================== Metadata ====================

    pub async fn list_metadata(
        &self,
        tenant: &TenantId,
        collection: &str,
        id: &str,
    ) -> DbResult<BTreeMap<String, MetadataValue>> {
        self.database.documents.metadata(tenant, collection, id).await
    }

    pub async fn get_metadata(&self, tenant: &TenantId, collection: &str, id: &str, key: &str) -> DbResult<MetadataValue> {
        self.list_metadata(tenant, collection, id)
            .await?
            .remove(key)
            .ok_or_else(|| DbError::NotFound(format!("metadata {}", key)))
    }

    pub async fn set_metadata(
        &self,
        tenant: &TenantId,
        collection: &str,
        id: &str,
        key: &str,
        value: MetadataValue,
    ) -> DbResult<MetadataValue> {
        self.database
            .documents
            .set_metadata(tenant, collection, id, key, &value)
            .await?;
        Ok(value)
    }

    pub async fn delete_metadata(&self, tenant: &TenantId, collection: &str, id: &str, key: &str) -> DbResult<()> {
        if self
            .database
            .documents
            .remove_metadata(tenant, collection, id, key)
            .await?
        {
            Ok(())
        } else {
            Err(DbError::NotFound(format!("metadata {}", key)))
        }
    }

    fn object(body: Value) -> DbResult<Map<String, Value>> {
        match body {
            Value::Object(map) => Ok(map),
            _ => Err(ValidationError::invalid("body", "expected a JSON object").into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use docket_core::{builtin_schema, SchemaRegistry, Tenant};
    use serde_json::json;

    async fn setup() -> (DocumentService, TenantId) {
        let database = Arc::new(DocketDatabase::new(Arc::new(MemoryStore::new())));
        let tenant = Tenant::new(TenantId::from("acme"), "Acme", builtin_schema().unwrap());
        database.tenants.create(&tenant).await.unwrap();
        let schemas = Arc::new(SchemaService::new(database.clone(), Arc::new(SchemaRegistry::new())));
        (DocumentService::new(database, schemas), tenant.id)
    }

    #[tokio::test]
    async fn test_create_applies_defaults() {
        let (service, tenant) = setup().await;
        let doc = service
            .create(&tenant, "company", json!({"name": "Acme", "employees": "12"}))
            .await
            .unwrap();
        assert_eq!(doc["status"], json!("pending"));
        assert_eq!(doc["employees"], json!(12));
        assert_eq!(doc["contacts"], json!([]));

        let err = service.create(&tenant, "company", json!({})).await.unwrap_err();
        assert!(matches!(err, DbError::Validation(ValidationError::MissingField(_))));
    }

    #[tokio::test]
    async fn test_unconfigured_collection_accepts_anything() {
        let (service, tenant) = setup().await;
        let doc = service
            .create(&tenant, "scratch", json!({"anything": [1, 2]}))
            .await
            .unwrap();
        assert_eq!(doc["anything"], json!([1, 2]));
    }

    #[tokio::test]
    async fn test_patch_batch_is_fail_fast_and_non_atomic() {
        let (service, tenant) = setup().await;
        let doc = service
            .create(&tenant, "company", json!({"name": "Acme"}))
            .await
            .unwrap();
        let id = doc["_id"].as_str().unwrap().to_string();

        let updates = vec![
            PathUpdate::new("name", json!("Acme Ltd")),
            PathUpdate::new("status", json!("exploded")),
            PathUpdate::new("employees", json!(5)),
        ];
        let err = service.patch(&tenant, "company", &id, updates).await.unwrap_err();
        assert!(matches!(err, DbError::Validation(ValidationError::InvalidValue { .. })));

        let stored = service.get(&tenant, "company", &id).await.unwrap();
        assert_eq!(stored["name"], json!("Acme Ltd"));
        assert!(stored.get("employees").is_none());
    }

    #[tokio::test]
    async fn test_patch_results() {
        let (service, tenant) = setup().await;
        let doc = service
            .create(&tenant, "company", json!({"name": "Acme"}))
            .await
            .unwrap();
        let id = doc["_id"].as_str().unwrap().to_string();

        let results = service
            .patch(
                &tenant,
                "company",
                &id,
                vec![
                    PathUpdate::new("contacts", json!({"email": "a@acme.test"})),
                    PathUpdate::new("settings", json!({"theme": "dark"})),
                    PathUpdate::new("settings", json!({"lang": "en"})),
                    PathUpdate::new("address.city", json!("Leeds")),
                ],
            )
            .await
            .unwrap();
        assert_eq!(
            results[0],
            AppliedResult::VectorAdd {
                element: json!({"email": "a@acme.test"}),
                index: 0
            }
        );

        let stored = service.get(&tenant, "company", &id).await.unwrap();
        assert_eq!(stored["settings"], json!({"theme": "dark", "lang": "en"}));
        assert_eq!(stored["address"], json!({"city": "Leeds"}));
    }

    #[tokio::test]
    async fn test_missing_document_is_not_found() {
        let (service, tenant) = setup().await;
        assert!(matches!(
            service.get(&tenant, "company", "nope").await,
            Err(DbError::NotFound(_))
        ));
        assert!(matches!(
            service.delete(&tenant, "company", "nope").await,
            Err(DbError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_bulk_add_validates_everything_first() {
        let (service, tenant) = setup().await;
        let err = service
            .bulk_add(&tenant, "company", vec![json!({"name": "A"}), json!({"status": "active"})])
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));
        assert!(service.list(&tenant, "company", &ListQuery::all()).await.unwrap().is_empty());

        let added = service
            .bulk_add(&tenant, "company", vec![json!({"name": "A"}), json!({"name": "B"})])
            .await
            .unwrap();
        assert_eq!(added.ids.len(), 2);
        assert_eq!(added.counts.inserted, 2);

        let deleted = service
            .bulk_delete(&tenant, "company", added.ids.clone())
            .await
            .unwrap();
        assert_eq!(deleted.deleted, 2);
    }

    #[tokio::test]
    async fn test_bulk_load_upserts_by_id() {
        let (service, tenant) = setup().await;
        let docs = vec![json!({"_id": "c1", "name": "One"}), json!({"_id": "c1", "name": "Uno"})];
        let result = service.bulk_load(&tenant, "company", docs).await.unwrap();
        assert_eq!(result.upserted, 2);
        let stored = service.get(&tenant, "company", "c1").await.unwrap();
        assert_eq!(stored["name"], json!("Uno"));
    }

    #[tokio::test]
    async fn test_metadata_lifecycle() {
        let (service, tenant) = setup().await;
        let doc = service
            .create(&tenant, "note", json!({"title": "hi"}))
            .await
            .unwrap();
        let id = doc["_id"].as_str().unwrap();
        assert!(doc["createdOn"].is_string());

        service
            .set_metadata(&tenant, "note", id, "pinnedBy", MetadataValue::Text("ann".into()))
            .await
            .unwrap();
        assert_eq!(
            service.get_metadata(&tenant, "note", id, "pinnedBy").await.unwrap(),
            MetadataValue::Text("ann".into())
        );
        service.delete_metadata(&tenant, "note", id, "pinnedBy").await.unwrap();
        assert!(matches!(
            service.get_metadata(&tenant, "note", id, "pinnedBy").await,
            Err(DbError::NotFound(_))
        ));
    }
}
