//! Profile engine orchestration
//!
//! Owns all write access to the relational store and secret tier for
//! this domain. Writes flow canonical-encode → digest → relational
//! upsert, then best-effort into the secret tier and snapshot sink.
//! Reads try the secret tier first, fall back to the relational store,
//! and schedule an asynchronous integrity check that never blocks the
//! caller.
//!
//! All collaborators are injected at construction; there is no global
//! engine instance.

mod reconcile;
pub mod progress;

use crate::canonical::{canonical_string, digest_hex};
use crate::config::VaultConfig;
use crate::error::{Error, Result};
use crate::notify::{NotificationEmitter, PROFILE_UPDATED};
use crate::profile::types::{IntegrityLock, Profile, ProfilePatch};
use crate::profile::validate::ProfileValidator;
use crate::secret::{scope_key, SecretTier};
use crate::snapshot::SnapshotSink;
use crate::store::{ProfileWrite, SqliteStore};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;

use reconcile::Reconciler;

/// Orchestrates reads and writes across the secret tier and the
/// relational store, owns the integrity-check protocol, and exposes the
/// progress ledger API. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct ProfileEngine {
    store: SqliteStore,
    secret: Option<Arc<dyn SecretTier>>,
    emitter: Arc<dyn NotificationEmitter>,
    snapshot: Arc<dyn SnapshotSink>,
    validator: Arc<dyn ProfileValidator>,
    config: Arc<VaultConfig>,
    reconciler: Reconciler,
}

impl ProfileEngine {
    /// Construct an engine with explicit collaborators. The secret tier
    /// is optional; when absent, reads and writes use the relational
    /// store alone.
    pub fn new(
        store: SqliteStore,
        secret: Option<Arc<dyn SecretTier>>,
        emitter: Arc<dyn NotificationEmitter>,
        snapshot: Arc<dyn SnapshotSink>,
        validator: Arc<dyn ProfileValidator>,
        config: VaultConfig,
    ) -> Self {
        let reconciler = Reconciler::new(config.reconcile.max_concurrent);
        tracing::debug!(
            validator = validator.name(),
            secret_tier = secret.is_some(),
            "profile engine initialized"
        );
        Self {
            store,
            secret,
            emitter,
            snapshot,
            validator,
            config: Arc::new(config),
            reconciler,
        }
    }

    /// Validate, canonicalize, digest, and upsert a profile document.
    /// Last writer wins; no version check. Returns the digest hex string
    /// as an opaque content-addressed reference.
    ///
    /// The relational write is fatal on failure. The secret-tier mirror
    /// and snapshot upload that follow are best-effort.
    pub async fn create(&self, profile: &Profile) -> Result<String> {
        self.validator.validate(profile)?;
        if !profile.gateways.contains(&profile.preferred_gateway) {
            tracing::warn!(
                user_id = %profile.user_id,
                preferred = %profile.preferred_gateway,
                "preferred gateway is not in the enabled set"
            );
        }

        let prefs = canonical_string(profile)?;
        let digest = digest_hex(prefs.as_bytes());
        let now = now_millis();
        let lock = IntegrityLock {
            digest: digest.clone(),
            write_timestamp: now,
        };

        self.store.upsert_profile(&ProfileWrite {
            user_id: profile.user_id.clone(),
            prefs: prefs.clone(),
            lock: serde_json::to_string(&lock)?,
            updated_at: now,
            created_at: now,
        })?;

        if let Some(tier) = &self.secret {
            let key = scope_key(&self.config.service_name, &profile.user_id);
            if let Err(e) = tier.set(&key, &prefs).await {
                tracing::warn!(user_id = %profile.user_id, "secret tier mirror skipped: {}", e);
            }
        }

        if let Err(e) = self
            .snapshot
            .upload_snapshot(&profile.user_id, prefs.as_bytes(), &digest)
            .await
        {
            tracing::warn!(user_id = %profile.user_id, "snapshot upload skipped: {}", e);
        }

        Ok(digest)
    }

    /// Fetch a profile. Unless `skip_secret_tier` is set, the secret
    /// tier is consulted first and is authoritative on a valid hit.
    /// On the relational path, a row that fails to parse is treated as
    /// not-found and a row that fails validation is repaired with
    /// computed defaults. A detached integrity check is scheduled before
    /// returning; it never delays the caller.
    pub async fn get(&self, user_id: &str, skip_secret_tier: bool) -> Result<Option<Profile>> {
        if !skip_secret_tier {
            if let Some(profile) = self.get_from_secret_tier(user_id).await {
                return Ok(Some(profile));
            }
        }

        let Some(row) = self.store.fetch_profile(user_id)? else {
            return Ok(None);
        };

        let raw: serde_json::Value = match serde_json::from_str(&row.prefs) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(user_id, "stored profile is unreadable, treating as absent: {}", e);
                return Ok(None);
            }
        };

        let profile = match serde_json::from_value::<Profile>(raw.clone()) {
            Ok(profile) if self.validator.validate(&profile).is_ok() => profile,
            _ => {
                tracing::warn!(user_id, "stored profile failed validation, applying defaults");
                crate::profile::repair::repair(&raw, user_id)
            }
        };

        let stored_digest = serde_json::from_str::<IntegrityLock>(&row.lock)
            .map(|lock| lock.digest)
            .unwrap_or_default();
        self.schedule_reconcile(profile.clone(), stored_digest);

        Ok(Some(profile))
    }

    /// Secret-tier read path. Any failure (tier unavailable, unreadable
    /// or invalid copy) falls through to the relational store.
    async fn get_from_secret_tier(&self, user_id: &str) -> Option<Profile> {
        let tier = self.secret.as_ref()?;
        let key = scope_key(&self.config.service_name, user_id);
        match tier.get(&key).await {
            Ok(Some(raw)) => match serde_json::from_str::<Profile>(&raw) {
                Ok(profile) if self.validator.validate(&profile).is_ok() => Some(profile),
                Ok(_) => {
                    tracing::warn!(user_id, "secret tier copy failed validation, falling back");
                    None
                }
                Err(e) => {
                    tracing::warn!(user_id, "secret tier copy unreadable, falling back: {}", e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(user_id, "secret tier unavailable, falling back: {}", e);
                None
            }
        }
    }

    /// Read-merge-rewrite: fetch the current document, apply the patch
    /// (provided fields win, the user id never changes), and persist the
    /// merged document as a full replacement.
    pub async fn update(&self, user_id: &str, patch: ProfilePatch) -> Result<String> {
        let current = self
            .get(user_id, false)
            .await?
            .ok_or_else(|| Error::NotFound(format!("profile '{}' does not exist", user_id)))?;
        let merged = current.merged(patch);
        let digest = self.create(&merged).await?;
        self.emitter
            .publish(PROFILE_UPDATED, json!({ "userId": user_id, "digest": digest }))
            .await;
        Ok(digest)
    }

    /// Strict-mode update: rejects the write when the stored digest no
    /// longer equals `expected_digest`. Opt-in; the plain [`update`]
    /// keeps the historical last-writer-wins behavior.
    ///
    /// [`update`]: ProfileEngine::update
    pub async fn update_checked(
        &self,
        user_id: &str,
        patch: ProfilePatch,
        expected_digest: &str,
    ) -> Result<String> {
        let row = self
            .store
            .fetch_profile(user_id)?
            .ok_or_else(|| Error::NotFound(format!("profile '{}' does not exist", user_id)))?;
        let lock: IntegrityLock = serde_json::from_str(&row.lock)
            .map_err(|e| Error::Storage(format!("corrupt integrity lock: {}", e)))?;
        if lock.digest != expected_digest {
            return Err(Error::DigestPrecondition {
                expected: expected_digest.to_string(),
                actual: lock.digest,
            });
        }
        self.update(user_id, patch).await
    }

    /// Write a batch of documents as one atomic relational transaction.
    /// Everything is validated and digested up front; any failure means
    /// no document in the batch is persisted. Secret-tier mirroring and
    /// snapshots are intentionally skipped on this path.
    pub async fn batch_create(&self, profiles: &[Profile]) -> Result<Vec<String>> {
        let now = now_millis();
        let mut writes = Vec::with_capacity(profiles.len());
        let mut digests = Vec::with_capacity(profiles.len());

        for profile in profiles {
            self.validator.validate(profile)?;
            let prefs = canonical_string(profile)?;
            let digest = digest_hex(prefs.as_bytes());
            let lock = IntegrityLock {
                digest: digest.clone(),
                write_timestamp: now,
            };
            writes.push(ProfileWrite {
                user_id: profile.user_id.clone(),
                prefs,
                lock: serde_json::to_string(&lock)?,
                updated_at: now,
                created_at: now,
            });
            digests.push(digest);
        }

        self.store.upsert_batch(&writes)?;
        Ok(digests)
    }
}

pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::notify::LogEmitter;
    use crate::profile::types::{PaymentGateway, SubscriptionTier};
    use crate::profile::validate::StandardValidator;
    use crate::secret::{MemorySecretTier, TierUnavailable};
    use crate::snapshot::NoopSnapshotSink;
    use async_trait::async_trait;
    use std::collections::BTreeMap;

    /// Secret tier that fails every call, for outage scenarios.
    pub struct OutageSecretTier;

    #[async_trait]
    impl SecretTier for OutageSecretTier {
        async fn set(&self, _key: &str, _value: &str) -> std::result::Result<(), TierUnavailable> {
            Err(TierUnavailable("simulated outage".to_string()))
        }

        async fn get(&self, _key: &str) -> std::result::Result<Option<String>, TierUnavailable> {
            Err(TierUnavailable("simulated outage".to_string()))
        }
    }

    pub fn engine_with(secret: Option<Arc<dyn SecretTier>>) -> ProfileEngine {
        ProfileEngine::new(
            SqliteStore::open_in_memory().unwrap(),
            secret,
            Arc::new(LogEmitter),
            Arc::new(NoopSnapshotSink),
            Arc::new(StandardValidator),
            VaultConfig::default(),
        )
    }

    pub fn memory_engine() -> ProfileEngine {
        engine_with(Some(Arc::new(MemorySecretTier::new())))
    }

    pub fn profile(user_id: &str) -> Profile {
        Profile {
            user_id: user_id.to_string(),
            display_name: None,
            safe_mode: false,
            gateways: vec![PaymentGateway::Venmo, PaymentGateway::Paypal],
            preferred_gateway: PaymentGateway::Venmo,
            location: "Brooklyn, NY".to_string(),
            timezone: "America/New_York".to_string(),
            tier: SubscriptionTier::Free,
            avatar_seed: None,
            gateway_confidence: BTreeMap::new(),
            created_at: "2026-01-01T00:00:00Z".to_string(),
            progress: BTreeMap::new(),
        }
    }
}
