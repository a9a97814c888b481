//! Activity repository
//!
//! Activities are append-only; the only removal is an explicit purge.

use docket_core::{Activity, TenantId};
use std::sync::Arc;

use super::{tenant_table, ACTIVITY_COLLECTION};
use crate::error::{DbError, DbResult};
use crate::store::{DocumentStore, Filter, ListQuery};

pub struct ActivityRepo {
    store: Arc<dyn DocumentStore>,
}

impl ActivityRepo {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn record(&self, activity: &Activity) -> DbResult<()> {
        let table = tenant_table(&activity.tenant_ref, ACTIVITY_COLLECTION);
        self.store
            .insert(&table, &activity.id, serde_json::to_value(activity)?)
            .await?;
        Ok(())
    }

    pub async fn list(&self, tenant: &TenantId, query: &ListQuery) -> DbResult<Vec<Activity>> {
        let table = tenant_table(tenant, ACTIVITY_COLLECTION);
        let docs = self.store.list(&table, query).await?;
        docs.into_iter()
            .map(|doc| serde_json::from_value(doc).map_err(DbError::from))
            .collect()
    }

    /// Bulk delete matching activities
    pub async fn purge(&self, tenant: &TenantId, filter: &Filter) -> DbResult<usize> {
        let table = tenant_table(tenant, ACTIVITY_COLLECTION);
        self.store.purge(&table, filter).await
    }
}
