//! Tenant repository

use docket_core::{Schema, Tenant, TenantId};
use std::sync::Arc;

use super::TENANT_TABLE;
use crate::error::{DbError, DbResult};
use crate::store::{DocumentStore, Filter, ListQuery};

pub struct TenantRepo {
    store: Arc<dyn DocumentStore>,
}

impl TenantRepo {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, tenant: &Tenant) -> DbResult<Tenant> {
        let doc = serde_json::to_value(tenant)?;
        self.store.insert(TENANT_TABLE, tenant.id.as_str(), doc).await?;
        Ok(tenant.clone())
    }

    pub async fn get(&self, id: &TenantId) -> DbResult<Option<Tenant>> {
        match self.store.get(TENANT_TABLE, id.as_str()).await? {
            Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
            None => Ok(None),
        }
    }

    pub async fn list(&self) -> DbResult<Vec<Tenant>> {
        let docs = self.store.list(TENANT_TABLE, &ListQuery::all()).await?;
        docs.into_iter()
            .map(|doc| serde_json::from_value(doc).map_err(DbError::from))
            .collect()
    }

    pub async fn is_empty(&self) -> DbResult<bool> {
        Ok(self.store.count(TENANT_TABLE, &Filter::new()).await? == 0)
    }

    /// Replace a tenant's stored schema
    pub async fn update_schema(&self, id: &TenantId, schema: &Schema) -> DbResult<Tenant> {
        let mut tenant = self
            .get(id)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("tenant {}", id)))?;
        tenant.schema = schema.clone();
        self.store
            .replace(TENANT_TABLE, id.as_str(), serde_json::to_value(&tenant)?)
            .await?;
        Ok(tenant)
    }
}
