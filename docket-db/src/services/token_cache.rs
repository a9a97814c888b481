//! Token cache
//!
//! Holds every allocated token in memory. A lookup miss reloads the whole
//! table; concurrent misses may reload redundantly. Each successful
//! resolution appends a usage timestamp in the cache and persists it from a
//! spawned task so the caller never waits on it.

use chrono::Utc;
use docket_core::Token;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::DbResult;
use crate::repos::DocketDatabase;

pub struct TokenCache {
    database: Arc<DocketDatabase>,
    tokens: RwLock<HashMap<String, Token>>,
}

impl TokenCache {
    pub fn new(database: Arc<DocketDatabase>) -> Self {
        Self {
            database,
            tokens: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve a bearer value. `Ok(None)` means the token does not exist.
    pub async fn resolve(&self, value: &str) -> DbResult<Option<Token>> {
        if value.is_empty() {
            return Ok(None);
        }
        if !self.tokens.read().await.contains_key(value) {
            self.reload().await?;
        }

        let now = Utc::now();
        let token = {
            let mut tokens = self.tokens.write().await;
            match tokens.get_mut(value) {
                Some(token) => {
                    token.uses.push(now);
                    token.clone()
                }
                None => return Ok(None),
            }
        };

        let database = self.database.clone();
        let value = value.to_string();
        tokio::spawn(async move {
            if let Err(e) = database.tokens.record_use(&value, now).await {
                tracing::warn!(error = %e, "Failed to record token use");
            }
        });

        Ok(Some(token))
    }

    /// Replace the cache with the store's current token set
    pub async fn reload(&self) -> DbResult<usize> {
        let all = self.database.tokens.list_all().await?;
        let count = all.len();
        let fresh: HashMap<String, Token> = all.into_iter().map(|t| (t.value.clone(), t)).collect();
        *self.tokens.write().await = fresh;
        tracing::debug!(count, "Token cache reloaded");
        Ok(count)
    }

    /// Drop a revoked token
    pub async fn evict(&self, value: &str) {
        self.tokens.write().await.remove(value);
    }

    pub async fn len(&self) -> usize {
        self.tokens.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tokens.read().await.is_empty()
    }
}
