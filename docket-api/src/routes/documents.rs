//! Tenant document endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use docket_core::{AuthLevel, Visibility};
use serde_json::Value;
use std::collections::BTreeMap;

use super::list_query;
use crate::dto::PatchRequest;
use crate::error::{ApiError, ApiResult};
use crate::gate::{RequestContext, RouteSpec};
use crate::state::AppState;

pub const LIST: RouteSpec = RouteSpec::read(":collection", AuthLevel::User);
pub const CREATE: RouteSpec = RouteSpec::write(":collection", "create", AuthLevel::User)
    .announced("Document created", Visibility::Tenant);
pub const GET: RouteSpec = RouteSpec::read(":collection/:id", AuthLevel::User);
pub const REPLACE: RouteSpec = RouteSpec::write(":collection/:id", "update", AuthLevel::User)
    .announced("Document replaced", Visibility::Tenant);
pub const PATCH: RouteSpec = RouteSpec::write(":collection/:id", "update", AuthLevel::User)
    .announced("Document updated", Visibility::Tenant);
pub const DELETE: RouteSpec = RouteSpec::write(":collection/:id", "delete", AuthLevel::User)
    .announced("Document deleted", Visibility::Tenant);

/// List documents, filtered by equality on query parameters
pub async fn list_documents(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(collection): Path<String>,
    Query(params): Query<BTreeMap<String, String>>,
) -> ApiResult<Json<Vec<Value>>> {
    let query = list_query(&params)?;
    let docs = state.documents.list(&ctx.tenant, &collection, &query).await?;
    Ok(Json(docs))
}

/// Create a document
pub async fn create_document(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(collection): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let doc = state.documents.create(&ctx.tenant, &collection, body).await?;
    Ok((StatusCode::CREATED, Json(doc)))
}

/// Get a document by id
pub async fn get_document(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((collection, id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let doc = state.documents.get(&ctx.tenant, &collection, &id).await?;
    Ok(Json(doc))
}

/// Replace a document's fields
pub async fn replace_document(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((collection, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let doc = state
        .documents
        .replace(&ctx.tenant, &collection, &id, body)
        .await?;
    Ok(Json(doc))
}

/// Apply one path update or an ordered batch
pub async fn patch_document(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((collection, id)): Path<(String, String)>,
    Json(body): Json<PatchRequest>,
) -> ApiResult<Json<Value>> {
    let (updates, single) = match body {
        PatchRequest::Single(update) => (vec![update], true),
        PatchRequest::Batch(updates) => (updates, false),
    };
    if updates.is_empty() {
        return Err(ApiError::BadRequest("no updates given".to_string()));
    }

    let results = state
        .documents
        .patch(&ctx.tenant, &collection, &id, updates)
        .await?;

    let body = if single {
        serde_json::to_value(results.first())
    } else {
        serde_json::to_value(&results)
    }
    .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(body))
}

/// Delete a document, returning it
pub async fn delete_document(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((collection, id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let doc = state.documents.delete(&ctx.tenant, &collection, &id).await?;
    Ok(Json(doc))
}
