//! Token authorization
//!
//! A route declares a path template, a permission string and a minimum auth
//! level. A token passes when its level is high enough and one of its
//! permission entries covers the route:
//!
//! | Entry path  | Matches                        | Requires |
//! |-------------|--------------------------------|----------|
//! | `company`   | exactly `company`              | any      |
//! | `company/*` | `company` and `company/...`    | ADMIN    |
//! | `*`         | everything                     | SUPER    |
//!
//! The entry's permission must be `*` or equal to the route's permission.

use crate::error::AuthError;
use crate::types::{AuthLevel, Token, TokenPermission};

/// Check a token against a route declaration
pub fn authorize(
    token: &Token,
    route_path: &str,
    permission: &str,
    min_level: AuthLevel,
) -> Result<(), AuthError> {
    if token.auth_level < min_level {
        return Err(AuthError::InsufficientAuthLevel { required: min_level });
    }

    let granted = token
        .permissions
        .iter()
        .any(|entry| entry_matches(entry, token.auth_level, route_path, permission));

    if granted {
        Ok(())
    } else {
        Err(AuthError::NoMatchingPermission {
            path: route_path.to_string(),
            permission: permission.to_string(),
        })
    }
}

fn entry_matches(entry: &TokenPermission, level: AuthLevel, route_path: &str, permission: &str) -> bool {
    let path_ok = if entry.path == "*" {
        level >= AuthLevel::Super
    } else if let Some(prefix) = entry.path.strip_suffix("/*") {
        level >= AuthLevel::Admin
            && (route_path == prefix
                || route_path
                    .strip_prefix(prefix)
                    .map_or(false, |rest| rest.starts_with('/')))
    } else {
        entry.path == route_path
    };

    path_ok && (entry.permission == "*" || entry.permission == permission)
}

/// Restrict domain-bound tokens to their listed origins.
///
/// Tokens without domains are accepted from anywhere.
pub fn check_origin(token: &Token, origin: Option<&str>) -> Result<(), AuthError> {
    if token.domains.is_empty() {
        return Ok(());
    }
    let host = origin
        .map(origin_host)
        .ok_or_else(|| AuthError::OriginNotAllowed("missing origin".to_string()))?;

    if token.domains.iter().any(|d| d.eq_ignore_ascii_case(host)) {
        Ok(())
    } else {
        Err(AuthError::OriginNotAllowed(host.to_string()))
    }
}

fn origin_host(origin: &str) -> &str {
    let without_scheme = origin.split_once("://").map_or(origin, |(_, rest)| rest);
    without_scheme
        .split(|c| c == ':' || c == '/')
        .next()
        .unwrap_or(without_scheme)
}
