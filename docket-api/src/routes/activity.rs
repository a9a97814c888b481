//! Activity log endpoints (ADMIN)

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use docket_core::{Activity, AuthLevel};
use std::collections::BTreeMap;

use super::list_query;
use crate::dto::PurgeResponse;
use crate::error::ApiResult;
use crate::gate::{RequestContext, RouteSpec};
use crate::state::AppState;

pub const LIST: RouteSpec = RouteSpec::read("activity", AuthLevel::Admin);
pub const PURGE: RouteSpec = RouteSpec::write("activity", "delete", AuthLevel::Admin).unrecorded();

pub async fn list_activities(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Query(params): Query<BTreeMap<String, String>>,
) -> ApiResult<Json<Vec<Activity>>> {
    let query = list_query(&params)?;
    Ok(Json(state.database.activities.list(&ctx.tenant, &query).await?))
}

/// Bulk delete activities matching the query filters
pub async fn purge_activities(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Query(params): Query<BTreeMap<String, String>>,
) -> ApiResult<Json<PurgeResponse>> {
    let query = list_query(&params)?;
    let deleted = state
        .database
        .activities
        .purge(&ctx.tenant, &query.filter)
        .await?;
    tracing::info!(tenant_id = %ctx.tenant, deleted, "Activities purged");
    Ok(Json(PurgeResponse { deleted }))
}
