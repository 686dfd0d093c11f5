//! Background integrity reconciliation
//!
//! Every relational read schedules a detached task that recomputes the
//! returned document's digest and compares it to the stored integrity
//! lock. A mismatch is not an error: it means the record predates a
//! schema change or was hand-edited, and the task silently rewrites the
//! row with a fresh digest. The task never blocks the read that
//! scheduled it, holds no lock, and tolerates the profile having changed
//! again by the time it runs (its write is last-writer-wins like any
//! other).
//!
//! Repair work is deduplicated per user and bounded by a semaphore so
//! repeated reads of one hot profile cannot pile up concurrent tasks.

use crate::canonical::digest_document;
use crate::engine::ProfileEngine;
use crate::profile::types::Profile;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

/// Dedupe set and concurrency bound for repair tasks.
#[derive(Clone)]
pub(crate) struct Reconciler {
    pending: Arc<Mutex<HashSet<String>>>,
    permits: Arc<Semaphore>,
}

impl Reconciler {
    pub(crate) fn new(max_concurrent: usize) -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashSet::new())),
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Claim the dedupe slot for a user. Returns false when a repair for
    /// this user is already in flight.
    fn try_begin(&self, user_id: &str) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(user_id.to_string())
    }

    fn finish(&self, user_id: &str) {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(user_id);
    }
}

impl ProfileEngine {
    /// Schedule a fire-and-forget drift check for a profile just read.
    /// Never blocks or affects the caller.
    pub(crate) fn schedule_reconcile(&self, profile: Profile, stored_digest: String) {
        if !self.reconciler.try_begin(&profile.user_id) {
            return;
        }
        let engine = self.clone();
        tokio::spawn(async move {
            let user_id = profile.user_id.clone();
            match engine.reconciler.permits.clone().acquire_owned().await {
                Ok(_permit) => engine.run_reconcile(profile, &stored_digest).await,
                Err(_) => {}
            }
            engine.reconciler.finish(&user_id);
        });
    }

    /// Recompute the digest and repair on mismatch. All failures on
    /// this path are swallowed.
    async fn run_reconcile(&self, profile: Profile, stored_digest: &str) {
        let current = match digest_document(&profile) {
            Ok(digest) => digest,
            Err(e) => {
                tracing::warn!(user_id = %profile.user_id, "reconciliation encode failed: {}", e);
                return;
            }
        };
        if current == stored_digest {
            return;
        }
        tracing::warn!(
            user_id = %profile.user_id,
            stored = %stored_digest,
            computed = %current,
            "integrity drift detected, rewriting record"
        );
        if let Err(e) = self.create(&profile).await {
            tracing::warn!(user_id = %profile.user_id, "integrity repair failed: {}", e);
        }
    }
}
