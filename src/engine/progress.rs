//! Append-only progress ledger
//!
//! The ledger is the source of truth for milestone history; the
//! Profile's `progress` map is a derived, overwritable cache of the
//! latest per-milestone score. Entries are only ever inserted, never
//! updated or deleted.

use crate::canonical::digest_document;
use crate::engine::{now_millis, ProfileEngine};
use crate::error::{Error, Result};
use crate::notify::PROGRESS_UPDATED;
use crate::profile::types::{MilestoneStamp, ProfilePatch, ProgressEntry};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;

/// Hashable entry payload (everything except the hash itself).
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EntryPayload<'a> {
    user_id: &'a str,
    milestone: &'a str,
    metadata: &'a BTreeMap<String, String>,
    score: f64,
    timestamp: i64,
}

impl ProfileEngine {
    /// Append one immutable fact to the ledger. The timestamp defaults
    /// to now; the content digest is computed here unless the caller
    /// already hashed the entry, in which case theirs is stored verbatim.
    pub async fn append_progress(
        &self,
        user_id: &str,
        milestone: &str,
        metadata: BTreeMap<String, String>,
        score: f64,
        timestamp: Option<i64>,
        hash: Option<String>,
    ) -> Result<()> {
        if !(0.0..=1.0).contains(&score) {
            return Err(Error::Validation(format!(
                "progress score out of range: {}",
                score
            )));
        }
        let timestamp = timestamp.unwrap_or_else(now_millis);
        let hash = match hash {
            Some(hash) => hash,
            None => digest_document(&EntryPayload {
                user_id,
                milestone,
                metadata: &metadata,
                score,
                timestamp,
            })?,
        };

        self.store.insert_progress(&ProgressEntry {
            user_id: user_id.to_string(),
            milestone: milestone.to_string(),
            metadata,
            score,
            hash,
            timestamp,
        })
    }

    /// Composite save: one ledger insert, then a full profile rewrite
    /// that refreshes the cached per-milestone summary. Returns the new
    /// profile digest.
    pub async fn save_progress(
        &self,
        user_id: &str,
        milestone: &str,
        metadata: BTreeMap<String, String>,
        score: f64,
    ) -> Result<String> {
        let timestamp = now_millis();
        self.append_progress(user_id, milestone, metadata, score, Some(timestamp), None)
            .await?;

        let current = self
            .get(user_id, false)
            .await?
            .ok_or_else(|| Error::NotFound(format!("profile '{}' does not exist", user_id)))?;
        let mut progress = current.progress.clone();
        progress.insert(milestone.to_string(), MilestoneStamp { score, timestamp });

        let digest = self
            .update(
                user_id,
                ProfilePatch {
                    progress: Some(progress),
                    ..Default::default()
                },
            )
            .await?;

        self.emitter
            .publish(
                PROGRESS_UPDATED,
                json!({ "userId": user_id, "milestone": milestone, "score": score }),
            )
            .await;

        Ok(digest)
    }

    /// Most recent ledger entries, timestamp descending, bounded.
    pub async fn recent_progress(&self, user_id: &str, limit: u32) -> Result<Vec<ProgressEntry>> {
        self.store.recent_progress(user_id, limit)
    }
}
