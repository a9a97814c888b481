//! Schema service
//!
//! Fronts a worker's [`SchemaRegistry`] with the tenant store: lookups that
//! miss the registry load the tenant's stored schema once and install it.

use docket_core::{
    builtin_schema, merge, CollectionDescriptor, Schema, SchemaRegistry, TenantDescriptors, TenantId,
};
use std::sync::Arc;

use crate::error::{DbError, DbResult};
use crate::repos::DocketDatabase;

pub struct SchemaService {
    database: Arc<DocketDatabase>,
    registry: Arc<SchemaRegistry>,
}

impl SchemaService {
    pub fn new(database: Arc<DocketDatabase>, registry: Arc<SchemaRegistry>) -> Self {
        Self { database, registry }
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    /// Compiled descriptors for a tenant, loading them on a miss
    pub async fn descriptors(&self, tenant: &TenantId) -> DbResult<Option<Arc<TenantDescriptors>>> {
        if let Some(descriptors) = self.registry.get(tenant).await {
            return Ok(Some(descriptors));
        }
        match self.database.tenants.get(tenant).await? {
            Some(stored) => Ok(Some(self.registry.install(tenant, &stored.schema).await?)),
            None => Ok(None),
        }
    }

    pub async fn collection(&self, tenant: &TenantId, name: &str) -> DbResult<Option<Arc<CollectionDescriptor>>> {
        Ok(self.descriptors(tenant).await?.and_then(|d| d.collection(name)))
    }

    /// Install every stored tenant's schema
    pub async fn preload_all(&self) -> DbResult<usize> {
        let tenants = self.database.tenants.list().await?;
        for tenant in &tenants {
            self.registry.install(&tenant.id, &tenant.schema).await?;
        }
        Ok(tenants.len())
    }

    /// Drop a tenant's cached descriptors
    pub async fn invalidate(&self, tenant: &TenantId) -> bool {
        let dropped = self.registry.invalidate(tenant).await;
        tracing::debug!(tenant_id = %tenant, dropped, "Schema cache invalidated");
        dropped
    }

    /// Replace a tenant schema.
    ///
    /// Built-ins are merged in and the result must compile before it is
    /// stored. The local cache is invalidated; notifying other workers is the
    /// caller's job.
    pub async fn update_schema(&self, tenant: &TenantId, schema: &Schema) -> DbResult<Schema> {
        let merged = merge(&builtin_schema()?, schema);
        TenantDescriptors::compile(&merged)?;
        self.database.tenants.update_schema(tenant, &merged).await?;
        self.invalidate(tenant).await;
        Ok(merged)
    }

    /// Stored schema for a tenant
    pub async fn schema(&self, tenant: &TenantId) -> DbResult<Schema> {
        self.database
            .tenants
            .get(tenant)
            .await?
            .map(|t| t.schema)
            .ok_or_else(|| DbError::NotFound(format!("tenant {}", tenant)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use docket_core::{CollectionSchema, FieldConfig, FieldType, Tenant};

    async fn setup() -> (SchemaService, TenantId) {
        let database = Arc::new(DocketDatabase::new(Arc::new(MemoryStore::new())));
        let tenant = Tenant::new(TenantId::from("acme"), "Acme", Vec::new());
        database.tenants.create(&tenant).await.unwrap();
        let service = SchemaService::new(database, Arc::new(SchemaRegistry::new()));
        (service, tenant.id)
    }

    #[tokio::test]
    async fn test_lookup_miss_loads_from_store() {
        let (service, tenant) = setup().await;
        assert!(!service.registry().contains(&tenant).await);
        let descriptors = service.descriptors(&tenant).await.unwrap().unwrap();
        assert!(descriptors.is_empty());
        assert!(service.registry().contains(&tenant).await);
        assert!(service.descriptors(&TenantId::from("nope")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_schema_merges_builtins_and_invalidates() {
        let (service, tenant) = setup().await;
        service.descriptors(&tenant).await.unwrap();

        let custom = vec![CollectionSchema::new("invoice")
            .with_field("total", FieldConfig::new(FieldType::Number).updatable())];
        let merged = service.update_schema(&tenant, &custom).await.unwrap();
        assert_eq!(merged[0].name, "invoice");
        assert!(merged.iter().any(|c| c.name == "company"));
        assert!(!service.registry().contains(&tenant).await);

        let invoice = service.collection(&tenant, "invoice").await.unwrap().unwrap();
        assert_eq!(invoice.context.rules().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_rule_pattern_is_rejected() {
        let (service, tenant) = setup().await;
        let bad = vec![CollectionSchema::new("x").with_rule(docket_core::PathRuleDef {
            pattern: "(".to_string(),
            operation: docket_core::OperationKind::Scalar,
            allowed_values: Vec::new(),
        })];
        assert!(matches!(
            service.update_schema(&tenant, &bad).await,
            Err(DbError::Schema(_))
        ));
        assert!(service.schema(&tenant).await.unwrap().is_empty());
    }
}
