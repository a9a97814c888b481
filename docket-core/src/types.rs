//! Shared data types: tenants, tokens, activities and document metadata

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

use crate::schema::Schema;

/// Tenant identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// An isolated namespace owning exactly one active schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    #[serde(default)]
    pub schema: Schema,
    /// Marks the bootstrap tenant that owns the root credential
    #[serde(default)]
    pub is_super: bool,
    pub created_at: DateTime<Utc>,
}

impl Tenant {
    pub fn new(id: TenantId, name: impl Into<String>, schema: Schema) -> Self {
        Self {
            id,
            name: name.into(),
            schema,
            is_super: false,
            created_at: Utc::now(),
        }
    }
}

/// Token privilege levels, ordered from least to most privileged
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuthLevel {
    User,
    Admin,
    Super,
}

impl fmt::Display for AuthLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthLevel::User => write!(f, "USER"),
            AuthLevel::Admin => write!(f, "ADMIN"),
            AuthLevel::Super => write!(f, "SUPER"),
        }
    }
}

/// Token kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Root,
    Tenant,
    User,
}

/// One `{path, permission}` grant carried by a token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPermission {
    pub path: String,
    pub permission: String,
}

impl TokenPermission {
    pub fn new(path: impl Into<String>, permission: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            permission: permission.into(),
        }
    }

    /// Grant everything (`*` / `*`)
    pub fn all() -> Self {
        Self::new("*", "*")
    }
}

/// Bearer credential. Immutable apart from the `uses` log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    #[serde(rename = "type")]
    pub token_type: TokenType,
    pub value: String,
    pub tenant: TenantId,
    #[serde(default)]
    pub user: Option<String>,
    pub auth_level: AuthLevel,
    #[serde(default)]
    pub permissions: Vec<TokenPermission>,
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default)]
    pub uses: Vec<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Token {
    pub fn new(
        token_type: TokenType,
        value: impl Into<String>,
        tenant: TenantId,
        auth_level: AuthLevel,
    ) -> Self {
        Self {
            token_type,
            value: value.into(),
            tenant,
            user: None,
            auth_level,
            permissions: Vec::new(),
            domains: Vec::new(),
            uses: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_permission(mut self, permission: TokenPermission) -> Self {
        self.permissions.push(permission);
        self
    }

    pub fn with_domains(mut self, domains: Vec<String>) -> Self {
        self.domains = domains;
        self
    }

    /// Stable, non-secret reference to this token for audit records
    pub fn reference(&self) -> String {
        let digest = Sha256::digest(self.value.as_bytes());
        hex::encode(&digest[..8])
    }
}

/// Who may receive an activity broadcast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Every connected client
    Public,
    /// Clients of the same tenant
    Tenant,
    /// Clients of the same tenant and user
    Private,
}

/// Audit record of one successful mutating API call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: String,
    /// Concrete path, e.g. `company/abc`
    pub path: String,
    /// Route template, e.g. `company/:id`
    pub path_spec: String,
    pub verb: String,
    pub permissions: Vec<String>,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    #[serde(default)]
    pub query: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Value,
    #[serde(default)]
    pub response: Value,
    pub visibility: Visibility,
    pub token_ref: String,
    #[serde(default)]
    pub user_ref: Option<String>,
    pub tenant_ref: TenantId,
    pub timestamp: DateTime<Utc>,
}

/// Real-time event published after an activity commits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityBroadcast {
    pub visibility: Visibility,
    pub path: String,
    pub path_spec: String,
    pub verb: String,
    pub permissions: Vec<String>,
    pub title: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub activity_id: String,
    pub response: Value,
    #[serde(default)]
    pub user: Option<String>,
    pub tenant: TenantId,
}

impl ActivityBroadcast {
    pub fn from_activity(activity: &Activity, title: &str, description: &str) -> Self {
        Self {
            visibility: activity.visibility,
            path: activity.path.clone(),
            path_spec: activity.path_spec.clone(),
            verb: activity.verb.clone(),
            permissions: activity.permissions.clone(),
            title: title.to_string(),
            description: description.to_string(),
            timestamp: activity.timestamp,
            activity_id: activity.id.clone(),
            response: activity.response.clone(),
            user: activity.user_ref.clone(),
            tenant: activity.tenant_ref.clone(),
        }
    }
}

/// Typed document metadata value.
///
/// Stored as a JSON-encoded string; use [`MetadataValue::encode`] and
/// [`MetadataValue::decode`] at the store boundary only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Flag(bool),
    Number(f64),
    Text(String),
    Json(Value),
}

impl MetadataValue {
    pub fn encode(&self) -> String {
        match self {
            MetadataValue::Flag(b) => b.to_string(),
            MetadataValue::Number(n) => Value::from(*n).to_string(),
            MetadataValue::Text(s) => Value::String(s.clone()).to_string(),
            MetadataValue::Json(v) => v.to_string(),
        }
    }

    /// Decode a stored value. Strings that are not valid JSON are kept as text.
    pub fn decode(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(value) => Self::from(value),
            Err(_) => MetadataValue::Text(raw.to_string()),
        }
    }
}

impl From<Value> for MetadataValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Bool(b) => MetadataValue::Flag(b),
            Value::Number(ref n) => match n.as_f64() {
                Some(f) => MetadataValue::Number(f),
                None => MetadataValue::Json(value),
            },
            Value::String(s) => MetadataValue::Text(s),
            other => MetadataValue::Json(other),
        }
    }
}
