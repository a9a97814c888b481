//! Document metadata endpoints

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use docket_core::{AuthLevel, MetadataValue, Visibility};
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::error::ApiResult;
use crate::gate::{RequestContext, RouteSpec};
use crate::state::AppState;

pub const LIST: RouteSpec = RouteSpec::read(":collection/:id/metadata", AuthLevel::User);
pub const GET: RouteSpec = RouteSpec::read(":collection/:id/metadata/:key", AuthLevel::User);
pub const PUT: RouteSpec = RouteSpec::write(":collection/:id/metadata/:key", "update", AuthLevel::User)
    .announced("Metadata updated", Visibility::Private);
pub const DELETE: RouteSpec = RouteSpec::write(":collection/:id/metadata/:key", "update", AuthLevel::User)
    .announced("Metadata removed", Visibility::Private);

pub async fn list_metadata(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((collection, id)): Path<(String, String)>,
) -> ApiResult<Json<BTreeMap<String, MetadataValue>>> {
    let entries = state
        .documents
        .list_metadata(&ctx.tenant, &collection, &id)
        .await?;
    Ok(Json(entries))
}

pub async fn get_metadata(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((collection, id, key)): Path<(String, String, String)>,
) -> ApiResult<Json<MetadataValue>> {
    let value = state
        .documents
        .get_metadata(&ctx.tenant, &collection, &id, &key)
        .await?;
    Ok(Json(value))
}

/// Set a metadata key; the body is the typed value
pub async fn put_metadata(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((collection, id, key)): Path<(String, String, String)>,
    Json(value): Json<Value>,
) -> ApiResult<Json<Value>> {
    let value = state
        .documents
        .set_metadata(&ctx.tenant, &collection, &id, &key, MetadataValue::from(value))
        .await?;
    Ok(Json(json!({ "key": key, "value": value })))
}

pub async fn delete_metadata(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((collection, id, key)): Path<(String, String, String)>,
) -> ApiResult<Json<Value>> {
    state
        .documents
        .delete_metadata(&ctx.tenant, &collection, &id, &key)
        .await?;
    Ok(Json(json!({ "key": key, "deleted": true })))
}
