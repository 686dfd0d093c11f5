//! Secret tier: a secure, per-user-scoped key/value store
//!
//! Treated as an optional authoritative cache ahead of the relational
//! store. Implementations are externally provided; every failure is
//! downgraded to "tier unavailable" at the engine boundary and never
//! surfaced to callers.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

/// Secret tier failure. Internal only: call sites log and continue.
#[derive(Error, Debug)]
#[error("secret tier unavailable: {0}")]
pub struct TierUnavailable(pub String);

/// Scope key for a profile document: `(service, "profile:" + user_id)`.
pub fn scope_key(service: &str, user_id: &str) -> String {
    format!("{}/profile:{}", service, user_id)
}

/// Secure per-user key/value store interface.
#[async_trait]
pub trait SecretTier: Send + Sync {
    /// Store a value under a scope key.
    async fn set(&self, scope_key: &str, value: &str) -> Result<(), TierUnavailable>;

    /// Fetch a value by scope key. `Ok(None)` means absent.
    async fn get(&self, scope_key: &str) -> Result<Option<String>, TierUnavailable>;
}

/// In-process secret tier for tests and single-process deployments.
#[derive(Default)]
pub struct MemorySecretTier {
    values: Arc<RwLock<HashMap<String, String>>>,
}

impl MemorySecretTier {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecretTier for MemorySecretTier {
    async fn set(&self, scope_key: &str, value: &str) -> Result<(), TierUnavailable> {
        self.values
            .write()
            .await
            .insert(scope_key.to_string(), value.to_string());
        Ok(())
    }

    async fn get(&self, scope_key: &str) -> Result<Option<String>, TierUnavailable> {
        Ok(self.values.read().await.get(scope_key).cloned())
    }
}
