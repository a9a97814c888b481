//! Tenant and token administration

use docket_core::{
    builtin_schema, merge, AuthLevel, Tenant, TenantId, Token, TokenPermission, TokenType,
    ValidationError,
};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Deserialize;
use std::sync::Arc;

use crate::error::{DbError, DbResult};
use crate::repos::DocketDatabase;

/// Id of the bootstrap tenant
pub const SUPER_TENANT_ID: &str = "root";

const TOKEN_LENGTH: usize = 40;

/// Generate a random bearer value
pub fn generate_token_value() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// Request to allocate a token inside a tenant
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    #[serde(default)]
    pub user: Option<String>,
    pub auth_level: AuthLevel,
    #[serde(default)]
    pub permissions: Vec<TokenPermission>,
    #[serde(default)]
    pub domains: Vec<String>,
}

pub struct TenantService {
    database: Arc<DocketDatabase>,
}

impl TenantService {
    pub fn new(database: Arc<DocketDatabase>) -> Self {
        Self { database }
    }

    /// Create the super tenant and its root token if no tenant exists.
    ///
    /// Returns the root token only when it was just created.
    pub async fn ensure_super_tenant(&self) -> DbResult<Option<Token>> {
        if !self.database.tenants.is_empty().await? {
            return Ok(None);
        }
        let mut tenant = Tenant::new(TenantId::from(SUPER_TENANT_ID), "Root", builtin_schema()?);
        tenant.is_super = true;
        self.database.tenants.create(&tenant).await?;

        let token = Token::new(TokenType::Root, generate_token_value(), tenant.id, AuthLevel::Super)
            .with_permission(TokenPermission::all());
        self.database.tokens.create(&token).await?;
        tracing::info!(tenant_id = SUPER_TENANT_ID, "Super tenant created");
        Ok(Some(token))
    }

    /// Merge the built-in schema into every stored tenant, one at a time
    pub async fn merge_builtins_into_all(&self) -> DbResult<usize> {
        let core = builtin_schema()?;
        let tenants = self.database.tenants.list().await?;
        for tenant in &tenants {
            let merged = merge(&core, &tenant.schema);
            if merged != tenant.schema {
                self.database.tenants.update_schema(&tenant.id, &merged).await?;
                tracing::debug!(tenant_id = %tenant.id, "Built-in schema merged");
            }
        }
        Ok(tenants.len())
    }

    /// Create a tenant with the built-in schema and an ADMIN token
    pub async fn create_tenant(&self, id: &str, name: &str) -> DbResult<(Tenant, Token)> {
        let id = Self::tenant_id(id)?;
        if self.database.tenants.get(&id).await?.is_some() {
            return Err(DbError::AlreadyExists(format!("tenant {}", id)));
        }
        let tenant = Tenant::new(id.clone(), name, builtin_schema()?);
        self.database.tenants.create(&tenant).await?;

        let mut token = Token::new(TokenType::Tenant, generate_token_value(), id, AuthLevel::Admin);
        token.permissions = admin_grants(&tenant);
        self.database.tokens.create(&token).await?;
        Ok((tenant, token))
    }

    pub async fn list_tenants(&self) -> DbResult<Vec<Tenant>> {
        self.database.tenants.list().await
    }

    /// Allocate a token in `tenant`. Callers may not mint a level above their own.
    pub async fn allocate_token(&self, tenant: &TenantId, issuer: AuthLevel, request: TokenRequest) -> DbResult<Token> {
        if request.auth_level > issuer {
            return Err(DbError::Validation(ValidationError::invalid(
                "authLevel",
                format!("cannot allocate {} with a {} token", request.auth_level, issuer),
            )));
        }
        let token_type = if request.user.is_some() {
            TokenType::User
        } else {
            TokenType::Tenant
        };
        let mut token = Token::new(token_type, generate_token_value(), tenant.clone(), request.auth_level)
            .with_domains(request.domains);
        token.user = request.user;
        token.permissions = request.permissions;
        self.database.tokens.create(&token).await
    }

    pub async fn list_tokens(&self, tenant: &TenantId) -> DbResult<Vec<Token>> {
        self.database.tokens.list_for_tenant(tenant).await
    }

    /// Revoke a token belonging to `tenant`
    pub async fn revoke_token(&self, tenant: &TenantId, value: &str) -> DbResult<()> {
        match self.database.tokens.get(value).await? {
            Some(token) if &token.tenant == tenant => {
                self.database.tokens.delete(value).await?;
                Ok(())
            }
            _ => Err(DbError::NotFound("token".to_string())),
        }
    }

    fn tenant_id(id: &str) -> DbResult<TenantId> {
        let valid = !id.is_empty()
            && id.len() <= 64
            && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if valid {
            Ok(TenantId::from(id))
        } else {
            Err(DbError::Validation(ValidationError::invalid(
                "id",
                "tenant ids are 1-64 characters of [A-Za-z0-9_-]",
            )))
        }
    }
}

/// Prefix grants covering a tenant's collections and its admin routes
pub fn admin_grants(tenant: &Tenant) -> Vec<TokenPermission> {
    tenant
        .schema
        .iter()
        .map(|c| c.name.as_str())
        .chain(ADMIN_PATHS)
        .map(|path| TokenPermission::new(format!("{}/*", path), "*"))
        .collect()
}

const ADMIN_PATHS: [&str; 3] = ["schema", "token", "activity"];
