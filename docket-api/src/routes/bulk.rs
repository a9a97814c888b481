//! Bulk document endpoints

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use docket_core::AuthLevel;
use docket_db::{BulkAddResult, BulkResult};
use serde_json::Value;

use crate::dto::BulkDeleteRequest;
use crate::error::ApiResult;
use crate::gate::{RequestContext, RouteSpec};
use crate::state::AppState;

pub const ADD: RouteSpec = RouteSpec::write(":collection/bulk/add", "create", AuthLevel::User);
pub const DELETE: RouteSpec = RouteSpec::write(":collection/bulk/delete", "delete", AuthLevel::User);
pub const LOAD: RouteSpec = RouteSpec::write(":collection/bulk/load", "load", AuthLevel::Admin);

/// Insert many documents; all are validated before any is written
pub async fn bulk_add(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(collection): Path<String>,
    Json(docs): Json<Vec<Value>>,
) -> ApiResult<Json<BulkAddResult>> {
    let result = state.documents.bulk_add(&ctx.tenant, &collection, docs).await?;
    tracing::info!(
        tenant_id = %ctx.tenant,
        collection = %collection,
        inserted = result.counts.inserted,
        "Bulk add"
    );
    Ok(Json(result))
}

/// Delete many documents by id
pub async fn bulk_delete(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(collection): Path<String>,
    Json(req): Json<BulkDeleteRequest>,
) -> ApiResult<Json<BulkResult>> {
    let result = state
        .documents
        .bulk_delete(&ctx.tenant, &collection, req.ids)
        .await?;
    Ok(Json(result))
}

/// Upsert many documents keyed by `_id`
pub async fn bulk_load(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(collection): Path<String>,
    Json(docs): Json<Vec<Value>>,
) -> ApiResult<Json<BulkResult>> {
    let result = state.documents.bulk_load(&ctx.tenant, &collection, docs).await?;
    Ok(Json(result))
}
