//! API route handlers

pub mod activity;
pub mod bulk;
pub mod documents;
pub mod health;
pub mod metadata;
pub mod schema;
pub mod tenant;
pub mod token;

use axum::{
    middleware,
    routing::{delete, get, patch, post, put, MethodRouter},
    Router,
};
use docket_db::ListQuery;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{ApiError, ApiResult};
use crate::gate::{gated, RouteSpec, TOKEN_PARAM};
use crate::state::AppState;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(health::health_check))
        // Schema
        .route("/schema", gate(get(schema::get_schema), &state, schema::GET))
        // Tenants
        .route("/tenant", gate(get(tenant::list_tenants), &state, tenant::LIST))
        .route("/tenant", gate(post(tenant::create_tenant), &state, tenant::CREATE))
        .route(
            "/tenant/:tenant_id/schema",
            gate(put(tenant::update_schema), &state, tenant::UPDATE_SCHEMA),
        )
        // Tokens
        .route("/token", gate(get(token::list_tokens), &state, token::LIST))
        .route("/token", gate(post(token::create_token), &state, token::CREATE))
        .route("/token/:value", gate(delete(token::revoke_token), &state, token::REVOKE))
        // Activities
        .route("/activity", gate(get(activity::list_activities), &state, activity::LIST))
        .route("/activity", gate(delete(activity::purge_activities), &state, activity::PURGE))
        // Documents
        .route("/:collection", gate(get(documents::list_documents), &state, documents::LIST))
        .route("/:collection", gate(post(documents::create_document), &state, documents::CREATE))
        .route("/:collection/:id", gate(get(documents::get_document), &state, documents::GET))
        .route("/:collection/:id", gate(put(documents::replace_document), &state, documents::REPLACE))
        .route("/:collection/:id", gate(patch(documents::patch_document), &state, documents::PATCH))
        .route("/:collection/:id", gate(delete(documents::delete_document), &state, documents::DELETE))
        // Bulk
        .route("/:collection/bulk/add", gate(post(bulk::bulk_add), &state, bulk::ADD))
        .route("/:collection/bulk/delete", gate(post(bulk::bulk_delete), &state, bulk::DELETE))
        .route("/:collection/bulk/load", gate(post(bulk::bulk_load), &state, bulk::LOAD))
        // Metadata
        .route("/:collection/:id/metadata", gate(get(metadata::list_metadata), &state, metadata::LIST))
        .route("/:collection/:id/metadata/:key", gate(get(metadata::get_metadata), &state, metadata::GET))
        .route("/:collection/:id/metadata/:key", gate(put(metadata::put_metadata), &state, metadata::PUT))
        .route(
            "/:collection/:id/metadata/:key",
            gate(delete(metadata::delete_metadata), &state, metadata::DELETE),
        );

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api/v1", api)
        .with_state(state)
}

// Helper functions

fn gate(method: MethodRouter<AppState>, state: &AppState, route: RouteSpec) -> MethodRouter<AppState> {
    method.route_layer(middleware::from_fn_with_state(state.clone(), gated(route)))
}

/// Build a list query from `skip`, `limit` and equality filters
pub(crate) fn list_query(params: &BTreeMap<String, String>) -> ApiResult<ListQuery> {
    let mut query = ListQuery::all();
    for (key, raw) in params {
        match key.as_str() {
            TOKEN_PARAM => {}
            "skip" => query.skip = parse_count(key, raw)?,
            "limit" => query.limit = Some(parse_count(key, raw)?),
            field => {
                query.filter.insert(field.to_string(), filter_value(raw));
            }
        }
    }
    Ok(query)
}

fn parse_count(key: &str, raw: &str) -> ApiResult<usize> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("{} must be a non-negative integer", key)))
}

/// Query values are strings; booleans, numbers and null are matched by type
fn filter_value(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ (Value::Bool(_) | Value::Number(_) | Value::Null)) => value,
        _ => Value::String(raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_list_query_from_params() {
        let params: BTreeMap<String, String> = [
            ("token", "secret"),
            ("skip", "5"),
            ("limit", "10"),
            ("status", "active"),
            ("pinned", "true"),
            ("employees", "12"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let query = list_query(&params).unwrap();
        assert_eq!(query.skip, 5);
        assert_eq!(query.limit, Some(10));
        assert_eq!(query.filter.len(), 3);
        assert_eq!(query.filter["status"], json!("active"));
        assert_eq!(query.filter["pinned"], json!(true));
        assert_eq!(query.filter["employees"], json!(12));
    }

    #[test]
    fn test_bad_limit_is_rejected() {
        let params: BTreeMap<String, String> =
            [("limit".to_string(), "-1".to_string())].into_iter().collect();
        assert!(matches!(list_query(&params), Err(ApiError::BadRequest(_))));
    }
}
