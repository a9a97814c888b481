//! Token endpoints (ADMIN)

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use docket_core::{AuthLevel, Token};
use docket_db::TokenRequest;
use serde_json::{json, Value};

use crate::error::ApiResult;
use crate::gate::{RequestContext, RouteSpec};
use crate::state::AppState;

pub const LIST: RouteSpec = RouteSpec::read("token", AuthLevel::Admin);
pub const CREATE: RouteSpec = RouteSpec::write("token", "create", AuthLevel::Admin).sensitive();
pub const REVOKE: RouteSpec = RouteSpec::write("token/:value", "delete", AuthLevel::Admin).sensitive();

pub async fn list_tokens(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> ApiResult<Json<Vec<Token>>> {
    Ok(Json(state.tenants.list_tokens(&ctx.tenant).await?))
}

/// Allocate a token in the caller's tenant
pub async fn create_token(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Json(req): Json<TokenRequest>,
) -> ApiResult<(StatusCode, Json<Token>)> {
    let token = state
        .tenants
        .allocate_token(&ctx.tenant, ctx.token.auth_level, req)
        .await?;
    tracing::info!(tenant_id = %ctx.tenant, auth_level = %token.auth_level, "Token allocated");
    Ok((StatusCode::CREATED, Json(token)))
}

/// Revoke a token of the caller's tenant.
///
/// Other workers forget it on their next wholesale reload.
pub async fn revoke_token(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(value): Path<String>,
) -> ApiResult<Json<Value>> {
    state.tenants.revoke_token(&ctx.tenant, &value).await?;
    state.token_cache.evict(&value).await;
    Ok(Json(json!({ "revoked": true })))
}
