//! Token repository

use chrono::{DateTime, Utc};
use docket_core::{TenantId, Token};
use serde_json::Value;
use std::sync::Arc;

use super::TOKEN_TABLE;
use crate::error::{DbError, DbResult};
use crate::store::{DocumentStore, ListQuery};

pub struct TokenRepo {
    store: Arc<dyn DocumentStore>,
}

impl TokenRepo {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, token: &Token) -> DbResult<Token> {
        let doc = serde_json::to_value(token)?;
        self.store.insert(TOKEN_TABLE, &token.value, doc).await?;
        Ok(token.clone())
    }

    pub async fn get(&self, value: &str) -> DbResult<Option<Token>> {
        match self.store.get(TOKEN_TABLE, value).await? {
            Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
            None => Ok(None),
        }
    }

    pub async fn list_all(&self) -> DbResult<Vec<Token>> {
        self.list(ListQuery::all()).await
    }

    pub async fn list_for_tenant(&self, tenant: &TenantId) -> DbResult<Vec<Token>> {
        self.list(ListQuery::all().with_filter("tenant", Value::String(tenant.to_string())))
            .await
    }

    async fn list(&self, query: ListQuery) -> DbResult<Vec<Token>> {
        let docs = self.store.list(TOKEN_TABLE, &query).await?;
        docs.into_iter()
            .map(|doc| serde_json::from_value(doc).map_err(DbError::from))
            .collect()
    }

    pub async fn delete(&self, value: &str) -> DbResult<bool> {
        Ok(self.store.delete(TOKEN_TABLE, value).await?.is_some())
    }

    /// Append a usage timestamp
    pub async fn record_use(&self, value: &str, at: DateTime<Utc>) -> DbResult<()> {
        let mut token = self
            .get(value)
            .await?
            .ok_or_else(|| DbError::NotFound("token".to_string()))?;
        token.uses.push(at);
        self.store
            .replace(TOKEN_TABLE, value, serde_json::to_value(&token)?)
            .await?;
        Ok(())
    }
}
