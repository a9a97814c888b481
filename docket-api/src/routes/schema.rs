//! Schema endpoint

use axum::{extract::State, Extension, Json};
use docket_core::{AuthLevel, Schema};

use crate::error::ApiResult;
use crate::gate::{RequestContext, RouteSpec};
use crate::state::AppState;

pub const GET: RouteSpec = RouteSpec::read("schema", AuthLevel::User);

/// The caller's tenant schema, built-ins merged
pub async fn get_schema(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> ApiResult<Json<Schema>> {
    Ok(Json(state.schemas.schema(&ctx.tenant).await?))
}
