//! Token gate middleware
//!
//! Every tenant route declares a [`RouteSpec`]. The gate resolves the
//! caller's token, authorizes it against the declaration and hands a
//! [`RequestContext`] to the handler. For mutating routes it buffers the
//! request and response bodies so a successful call can be recorded as an
//! activity once the handler has committed.

use axum::{
    body::{to_bytes, Body, Bytes},
    extract::{Path, Query, Request, State},
    http::{
        header::{AUTHORIZATION, ORIGIN},
        HeaderMap,
    },
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use docket_core::{authorize, check_origin, Activity, AuthError, AuthLevel, TenantId, Token, Visibility};
use docket_db::new_record_id;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;

use crate::activity::Announcement;
use crate::error::ApiError;
use crate::state::AppState;

/// Query parameter carrying the bearer value
pub const TOKEN_PARAM: &str = "token";

/// Largest request body the gate will buffer
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Names that cannot be used as tenant collections
pub const RESERVED_COLLECTIONS: [&str; 4] = ["activity", "schema", "tenant", "token"];

pub fn is_reserved_collection(name: &str) -> bool {
    RESERVED_COLLECTIONS.contains(&name)
}

/// Authorization and recording declaration of one route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteSpec {
    /// Route template relative to the API root, e.g. `:collection/:id`
    pub path_spec: &'static str,
    pub permission: &'static str,
    pub min_level: AuthLevel,
    /// Record successful calls as activities
    pub records: bool,
    /// Broadcast title for recorded calls
    pub announce: Option<&'static str>,
    pub visibility: Visibility,
    /// Keep bodies, params and the concrete path out of the activity
    pub sensitive: bool,
}

impl RouteSpec {
    pub const fn read(path_spec: &'static str, min_level: AuthLevel) -> Self {
        Self {
            path_spec,
            permission: "read",
            min_level,
            records: false,
            announce: None,
            visibility: Visibility::Tenant,
            sensitive: false,
        }
    }

    pub const fn write(path_spec: &'static str, permission: &'static str, min_level: AuthLevel) -> Self {
        Self {
            path_spec,
            permission,
            min_level,
            records: true,
            announce: None,
            visibility: Visibility::Tenant,
            sensitive: false,
        }
    }

    pub const fn announced(mut self, title: &'static str, visibility: Visibility) -> Self {
        self.announce = Some(title);
        self.visibility = visibility;
        self
    }

    pub const fn unrecorded(mut self) -> Self {
        self.records = false;
        self
    }

    pub const fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    /// Path checked against token grants: the template with the collection filled in
    pub fn route_path(&self, collection: Option<&str>) -> String {
        match collection {
            Some(name) => self.path_spec.replace(":collection", name),
            None => self.path_spec.to_string(),
        }
    }
}

/// Caller identity handed to gated handlers
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub token: Token,
    pub tenant: TenantId,
}

impl RequestContext {
    pub fn new(token: Token) -> Self {
        Self {
            tenant: token.tenant.clone(),
            token,
        }
    }
}

/// Bearer value from the `token` query parameter, falling back to the
/// `Authorization: Bearer` header
pub fn token_value(query: &BTreeMap<String, String>, headers: &HeaderMap) -> Option<String> {
    if let Some(value) = query.get(TOKEN_PARAM).filter(|v| !v.is_empty()) {
        return Some(value.clone());
    }
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

type GateFuture = Pin<Box<dyn Future<Output = Result<Response, ApiError>> + Send>>;

/// Gate middleware factory
pub fn gated(
    route: RouteSpec,
) -> impl Fn(
    State<AppState>,
    Option<Path<HashMap<String, String>>>,
    Query<BTreeMap<String, String>>,
    Request,
    Next,
) -> GateFuture
       + Clone
       + Send
       + Sync
       + 'static {
    move |State(state): State<AppState>,
          params: Option<Path<HashMap<String, String>>>,
          Query(query): Query<BTreeMap<String, String>>,
          mut request: Request,
          next: Next| {
        Box::pin(async move {
            let params = params.map(|Path(p)| p).unwrap_or_default();
            let collection = params.get("collection").cloned();
            if let Some(name) = collection.as_deref().filter(|name| is_reserved_collection(name)) {
                return Err(ApiError::NotFound(format!("collection {}", name)));
            }

            let value = token_value(&query, request.headers()).ok_or(AuthError::InvalidToken)?;
            let token = state
                .token_cache
                .resolve(&value)
                .await?
                .ok_or(AuthError::InvalidToken)?;

            let route_path = route.route_path(collection.as_deref());
            authorize(&token, &route_path, route.permission, route.min_level)?;
            let origin = request.headers().get(ORIGIN).and_then(|v| v.to_str().ok());
            check_origin(&token, origin)?;

            let context = RequestContext::new(token);
            if !route.records {
                request.extensions_mut().insert(context);
                return Ok(next.run(request).await);
            }

            let (parts, body) = request.into_parts();
            let body = to_bytes(body, MAX_BODY_BYTES)
                .await
                .map_err(|e| ApiError::BadRequest(format!("Failed to read body: {}", e)))?;
            let call = Call {
                path: concrete_path(parts.uri.path()),
                verb: parts.method.as_str().to_ascii_lowercase(),
                params: params.into_iter().collect(),
                query: query
                    .into_iter()
                    .filter(|(key, _)| key != TOKEN_PARAM)
                    .collect(),
                body: body.clone(),
            };

            let mut request = Request::from_parts(parts, Body::from(body));
            request.extensions_mut().insert(context.clone());
            let response = next.run(request).await;
            if !response.status().is_success() {
                return Ok(response);
            }

            let (parts, body) = response.into_parts();
            let response_body = to_bytes(body, usize::MAX)
                .await
                .map_err(|e| ApiError::Internal(format!("Failed to read response: {}", e)))?;

            let announcement = route.announce.map(|title| Announcement {
                title: title.to_string(),
                description: format!("{} {}", call.verb, call.path),
            });
            let activity = call.into_activity(&route, &context, &response_body);
            state.recorder.record(activity, announcement).await;

            Ok(Response::from_parts(parts, Body::from(response_body)))
        })
    }
}

/// Request details captured before the handler runs
struct Call {
    path: String,
    verb: String,
    params: BTreeMap<String, String>,
    query: BTreeMap<String, String>,
    body: Bytes,
}

impl Call {
    fn into_activity(self, route: &RouteSpec, context: &RequestContext, response: &Bytes) -> Activity {
        let collection = self.params.get("collection").map(String::as_str);
        let path_spec = route.route_path(collection);
        let (path, params, body, response) = if route.sensitive {
            (path_spec.clone(), BTreeMap::new(), Value::Null, Value::Null)
        } else {
            (self.path, self.params, json_body(&self.body), json_body(response))
        };

        Activity {
            id: new_record_id(),
            path,
            path_spec,
            verb: self.verb,
            permissions: vec![route.permission.to_string()],
            params,
            query: self.query,
            body,
            response,
            visibility: route.visibility,
            token_ref: context.token.reference(),
            user_ref: context.token.user.clone(),
            tenant_ref: context.tenant.clone(),
            timestamp: Utc::now(),
        }
    }
}

fn concrete_path(uri_path: &str) -> String {
    let path = uri_path.trim_start_matches('/');
    path.strip_prefix("api/v1/").unwrap_or(path).to_string()
}

fn json_body(bytes: &Bytes) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_route_path_fills_collection() {
        let spec = RouteSpec::write(":collection/:id", "delete", AuthLevel::User);
        assert_eq!(spec.route_path(Some("company")), "company/:id");
        assert_eq!(RouteSpec::read("schema", AuthLevel::User).route_path(None), "schema");
    }

    #[test]
    fn test_token_from_query_then_header() {
        let mut query = BTreeMap::new();
        let mut headers = HeaderMap::new();
        assert_eq!(token_value(&query, &headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(token_value(&query, &headers).as_deref(), Some("abc"));

        query.insert(TOKEN_PARAM.to_string(), "xyz".to_string());
        assert_eq!(token_value(&query, &headers).as_deref(), Some("xyz"));
    }

    #[test]
    fn test_reserved_collections() {
        assert!(is_reserved_collection("token"));
        assert!(is_reserved_collection("activity"));
        assert!(!is_reserved_collection("company"));
    }

    #[test]
    fn test_concrete_path() {
        assert_eq!(concrete_path("/company/abc"), "company/abc");
        assert_eq!(concrete_path("/api/v1/company/abc"), "company/abc");
    }

    #[test]
    fn test_json_body_falls_back_to_text() {
        assert_eq!(json_body(&Bytes::new()), Value::Null);
        assert_eq!(json_body(&Bytes::from_static(b"{\"a\":1}")), serde_json::json!({"a": 1}));
        assert_eq!(json_body(&Bytes::from_static(b"plain")), Value::String("plain".into()));
    }
}
