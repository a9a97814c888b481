//! Data Transfer Objects for API requests and responses

use docket_core::{PathUpdate, Tenant, Token};
use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub worker: Option<usize>,
    pub store: String,
}

/// PATCH body: one update or an ordered batch
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PatchRequest {
    Batch(Vec<PathUpdate>),
    Single(PathUpdate),
}

/// Bulk delete request
#[derive(Debug, Clone, Deserialize)]
pub struct BulkDeleteRequest {
    pub ids: Vec<String>,
}

/// Create tenant request
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTenantRequest {
    pub id: String,
    pub name: String,
}

/// A new tenant and its ADMIN token
#[derive(Debug, Serialize)]
pub struct TenantCreatedResponse {
    pub tenant: Tenant,
    pub token: Token,
}

/// Tenant listing entry (schema omitted)
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantSummary {
    pub id: String,
    pub name: String,
    pub is_super: bool,
    pub collections: Vec<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<Tenant> for TenantSummary {
    fn from(tenant: Tenant) -> Self {
        Self {
            id: tenant.id.0,
            name: tenant.name,
            is_super: tenant.is_super,
            collections: tenant.schema.into_iter().map(|c| c.name).collect(),
            created_at: tenant.created_at,
        }
    }
}

/// Purge response
#[derive(Debug, Serialize, Deserialize)]
pub struct PurgeResponse {
    pub deleted: usize,
}
