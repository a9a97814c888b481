//! Docket repositories
//!
//! Typed access to the document store. Global tables hold tenants and
//! tokens; every other table is scoped as `{tenant}:{collection}`.

mod activity_repo;
mod document_repo;
mod tenant_repo;
mod token_repo;

pub use activity_repo::*;
pub use document_repo::*;
pub use tenant_repo::*;
pub use token_repo::*;

use chrono::Utc;
use docket_core::TenantId;
use std::sync::Arc;

use crate::error::DbResult;
use crate::store::DocumentStore;

pub const TENANT_TABLE: &str = "tenant";
pub const TOKEN_TABLE: &str = "token";
pub const ACTIVITY_COLLECTION: &str = "activity";

/// Table name for a tenant-scoped collection
pub fn tenant_table(tenant: &TenantId, collection: &str) -> String {
    format!("{}:{}", tenant, collection)
}

/// Time-ordered record id, so id order follows insertion order
pub fn new_record_id() -> String {
    let uuid = uuid::Uuid::new_v4().simple().to_string();
    format!("{:013x}{}", Utc::now().timestamp_millis(), &uuid[..12])
}

/// Docket database: entry point for storage operations
pub struct DocketDatabase {
    store: Arc<dyn DocumentStore>,
    pub tenants: TenantRepo,
    pub tokens: TokenRepo,
    pub activities: ActivityRepo,
    pub documents: DocumentRepo,
}

impl DocketDatabase {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store: store.clone(),
            tenants: TenantRepo::new(store.clone()),
            tokens: TokenRepo::new(store.clone()),
            activities: ActivityRepo::new(store.clone()),
            documents: DocumentRepo::new(store),
        }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Check store health
    pub async fn health_check(&self) -> DbResult<bool> {
        self.store.ping().await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_ids_sort_by_time() {
        let a = new_record_id();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = new_record_id();
        assert_eq!(a.len(), 25);
        assert!(a < b);
    }

    #[test]
    fn test_tenant_table() {
        assert_eq!(tenant_table(&TenantId::from("acme"), "company"), "acme:company");
    }
}
