//! Tenant administration endpoints (SUPER only)

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use docket_broker::{topics, BrokerPayload, SchemaChanged};
use docket_core::{AuthLevel, Schema, TenantId};

use crate::dto::{CreateTenantRequest, TenantCreatedResponse, TenantSummary};
use crate::error::ApiResult;
use crate::gate::{RequestContext, RouteSpec};
use crate::state::AppState;

pub const LIST: RouteSpec = RouteSpec::read("tenant", AuthLevel::Super);
pub const CREATE: RouteSpec = RouteSpec::write("tenant", "create", AuthLevel::Super).sensitive();
pub const UPDATE_SCHEMA: RouteSpec = RouteSpec::write("tenant/:tenant_id/schema", "update", AuthLevel::Super);

pub async fn list_tenants(State(state): State<AppState>) -> ApiResult<Json<Vec<TenantSummary>>> {
    let tenants = state.tenants.list_tenants().await?;
    Ok(Json(tenants.into_iter().map(TenantSummary::from).collect()))
}

/// Create a tenant with the built-in schema and an ADMIN token
pub async fn create_tenant(
    State(state): State<AppState>,
    Json(req): Json<CreateTenantRequest>,
) -> ApiResult<(StatusCode, Json<TenantCreatedResponse>)> {
    let (tenant, token) = state.tenants.create_tenant(&req.id, &req.name).await?;
    tracing::info!(tenant_id = %tenant.id, "Tenant created");
    Ok((StatusCode::CREATED, Json(TenantCreatedResponse { tenant, token })))
}

/// Replace a tenant's schema and tell every worker to drop its cached copy
pub async fn update_schema(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(tenant_id): Path<String>,
    Json(schema): Json<Schema>,
) -> ApiResult<Json<Schema>> {
    let tenant = TenantId::new(tenant_id);
    let merged = state.schemas.update_schema(&tenant, &schema).await?;
    tracing::info!(
        tenant_id = %tenant,
        collections = merged.len(),
        by = %ctx.token.reference(),
        "Tenant schema replaced"
    );

    let signal = BrokerPayload::SchemaChanged(SchemaChanged { tenant_id: tenant });
    if let Err(e) = state.broker.publish(topics::SCHEMA_CHANGED, signal).await {
        tracing::warn!(topic = topics::SCHEMA_CHANGED, error = %e, "Failed to publish schema change");
    }
    Ok(Json(merged))
}
