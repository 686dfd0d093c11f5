//! SQLite-backed relational tier
//!
//! Two tables: `profiles` (one row per user; the serialized document plus
//! an integrity-lock JSON sidecar) and `progress_log` (append-only
//! ledger). The connection is a single shared handle reused across all
//! operations, guarded by a mutex that is never held across an await
//! point. Schema migration is additive-only and best-effort.

use crate::error::{Error, Result};
use crate::profile::types::ProgressEntry;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// One row of the `profiles` table.
#[derive(Debug, Clone)]
pub struct ProfileRow {
    pub user_id: String,
    /// Canonical serialized Profile document
    pub prefs: String,
    /// Integrity-lock JSON sidecar: `{digest, writeTimestamp}`
    pub lock: String,
    pub updated_at: i64,
    pub created_at: Option<i64>,
}

/// Payload for one profile write (single or batched).
#[derive(Debug, Clone)]
pub struct ProfileWrite {
    pub user_id: String,
    pub prefs: String,
    pub lock: String,
    pub updated_at: i64,
    pub created_at: i64,
}

/// Shared SQLite store for profiles and the progress ledger.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the store at the given path.
    pub fn open(path: &Path, busy_timeout_ms: u64) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::init(conn, busy_timeout_ms)
    }

    /// Open an in-memory store (tests and ephemeral deployments).
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?, 5_000)
    }

    fn init(conn: Connection, busy_timeout_ms: u64) -> Result<Self> {
        // In-memory databases report "memory" instead of taking WAL.
        if let Err(e) = conn.pragma_update(None, "journal_mode", "wal") {
            tracing::debug!("wal journal mode unavailable: {}", e);
        }
        conn.pragma_update(None, "busy_timeout", busy_timeout_ms as i64)?;
        conn.pragma_update(None, "foreign_keys", true)?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS profiles (
                user_id    TEXT PRIMARY KEY,
                prefs      TEXT NOT NULL,
                progress   TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                created_at INTEGER
            );
            CREATE INDEX IF NOT EXISTS idx_profiles_updated_at
                ON profiles(updated_at);
            CREATE TABLE IF NOT EXISTS progress_log (
                id        INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id   TEXT NOT NULL REFERENCES profiles(user_id),
                milestone TEXT NOT NULL,
                metadata  TEXT,
                score     REAL NOT NULL,
                hash      TEXT NOT NULL,
                timestamp INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_progress_log_user_ts
                ON progress_log(user_id, timestamp);",
        )?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.migrate();
        Ok(store)
    }

    /// Additive best-effort migration: older databases predate the
    /// `created_at` column and its index. Failure means the column is
    /// already there; log and move on.
    fn migrate(&self) {
        let conn = self.lock();
        if let Err(e) = conn.execute_batch("ALTER TABLE profiles ADD COLUMN created_at INTEGER") {
            tracing::debug!("created_at migration skipped: {}", e);
        }
        if let Err(e) =
            conn.execute_batch("CREATE INDEX IF NOT EXISTS idx_profiles_created_at ON profiles(created_at)")
        {
            tracing::debug!("created_at index skipped: {}", e);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        // A poisoned lock means a panic mid-statement; propagating the
        // panic is the only sound option for a storage handle.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert-or-replace one profile row, keyed by user id. Last writer
    /// wins; no version check.
    pub fn upsert_profile(&self, write: &ProfileWrite) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO profiles (user_id, prefs, progress, updated_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(user_id) DO UPDATE SET
                 prefs = excluded.prefs,
                 progress = excluded.progress,
                 updated_at = excluded.updated_at",
            params![
                write.user_id,
                write.prefs,
                write.lock,
                write.updated_at,
                write.created_at
            ],
        )?;
        Ok(())
    }

    /// Write every row inside one transaction; any failure rolls back
    /// the whole batch.
    pub fn upsert_batch(&self, writes: &[ProfileWrite]) -> Result<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        for write in writes {
            tx.execute(
                "INSERT INTO profiles (user_id, prefs, progress, updated_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(user_id) DO UPDATE SET
                     prefs = excluded.prefs,
                     progress = excluded.progress,
                     updated_at = excluded.updated_at",
                params![
                    write.user_id,
                    write.prefs,
                    write.lock,
                    write.updated_at,
                    write.created_at
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Fetch one profile row, if present.
    pub fn fetch_profile(&self, user_id: &str) -> Result<Option<ProfileRow>> {
        let conn = self.lock();
        let row = conn
            .query_row(
                "SELECT user_id, prefs, progress, updated_at, created_at
                 FROM profiles WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok(ProfileRow {
                        user_id: row.get(0)?,
                        prefs: row.get(1)?,
                        lock: row.get(2)?,
                        updated_at: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Append one entry to the progress ledger. This is the only
    /// mutation the ledger supports; rows are never updated or deleted.
    pub fn insert_progress(&self, entry: &ProgressEntry) -> Result<()> {
        let metadata = if entry.metadata.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&entry.metadata)?)
        };
        let conn = self.lock();
        conn.execute(
            "INSERT INTO progress_log (user_id, milestone, metadata, score, hash, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entry.user_id,
                entry.milestone,
                metadata,
                entry.score,
                entry.hash,
                entry.timestamp
            ],
        )?;
        Ok(())
    }

    /// Most recent ledger entries for a user, timestamp descending.
    pub fn recent_progress(&self, user_id: &str, limit: u32) -> Result<Vec<ProgressEntry>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT user_id, milestone, metadata, score, hash, timestamp
             FROM progress_log
             WHERE user_id = ?1
             ORDER BY timestamp DESC, id DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![user_id, limit], |row| {
            let metadata_json: Option<String> = row.get(2)?;
            Ok((
                ProgressEntry {
                    user_id: row.get(0)?,
                    milestone: row.get(1)?,
                    metadata: BTreeMap::new(),
                    score: row.get(3)?,
                    hash: row.get(4)?,
                    timestamp: row.get(5)?,
                },
                metadata_json,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (mut entry, metadata_json) = row?;
            if let Some(json) = metadata_json {
                entry.metadata = serde_json::from_str(&json)
                    .map_err(|e| Error::Storage(format!("corrupt ledger metadata: {}", e)))?;
            }
            entries.push(entry);
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_for(user_id: &str, prefs: &str) -> ProfileWrite {
        ProfileWrite {
            user_id: user_id.to_string(),
            prefs: prefs.to_string(),
            lock: r#"{"digest":"00","writeTimestamp":1}"#.to_string(),
            updated_at: 1,
            created_at: 1,
        }
    }

    fn entry_for(user_id: &str, milestone: &str, timestamp: i64) -> ProgressEntry {
        ProgressEntry {
            user_id: user_id.to_string(),
            milestone: milestone.to_string(),
            metadata: BTreeMap::new(),
            score: 1.0,
            hash: "aa".repeat(32),
            timestamp,
        }
    }

    #[test]
    fn test_upsert_and_fetch() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.upsert_profile(&write_for("@alice", "{}")).unwrap();

        let row = store.fetch_profile("@alice").unwrap().unwrap();
        assert_eq!(row.user_id, "@alice");
        assert_eq!(row.prefs, "{}");
        assert_eq!(row.created_at, Some(1));

        assert!(store.fetch_profile("@nobody").unwrap().is_none());
    }

    #[test]
    fn test_upsert_is_last_writer_wins() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.upsert_profile(&write_for("@alice", r#"{"v":1}"#)).unwrap();

        let mut second = write_for("@alice", r#"{"v":2}"#);
        second.updated_at = 2;
        second.created_at = 2;
        store.upsert_profile(&second).unwrap();

        let row = store.fetch_profile("@alice").unwrap().unwrap();
        assert_eq!(row.prefs, r#"{"v":2}"#);
        assert_eq!(row.updated_at, 2);
        // Creation timestamp survives the replace
        assert_eq!(row.created_at, Some(1));
    }

    #[test]
    fn test_batch_rolls_back_on_failure() {
        let store = SqliteStore::open_in_memory().unwrap();

        // A NULL prefs column violates NOT NULL mid-batch.
        let good = write_for("@alice", "{}");
        let result = {
            let mut conn = store.lock();
            let tx = conn.transaction().unwrap();
            tx.execute(
                "INSERT INTO profiles (user_id, prefs, progress, updated_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![good.user_id, good.prefs, good.lock, good.updated_at, good.created_at],
            )
            .unwrap();
            tx.execute(
                "INSERT INTO profiles (user_id, prefs, progress, updated_at, created_at)
                 VALUES (?1, NULL, ?2, ?3, ?4)",
                params!["@bob", good.lock, 1i64, 1i64],
            )
            // Transaction dropped without commit: rollback.
        };
        assert!(result.is_err());
        assert!(store.fetch_profile("@alice").unwrap().is_none());
        assert!(store.fetch_profile("@bob").unwrap().is_none());
    }

    #[test]
    fn test_batch_commits_all_rows() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .upsert_batch(&[write_for("@alice", "{}"), write_for("@bob", "{}")])
            .unwrap();
        assert!(store.fetch_profile("@alice").unwrap().is_some());
        assert!(store.fetch_profile("@bob").unwrap().is_some());
    }

    #[test]
    fn test_ledger_append_and_recent_ordering() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.upsert_profile(&write_for("@alice", "{}")).unwrap();

        for (milestone, ts) in [("first_login", 100), ("first_payment", 200), ("streak_7", 300)] {
            store.insert_progress(&entry_for("@alice", milestone, ts)).unwrap();
        }

        let recent = store.recent_progress("@alice", 10).unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].milestone, "streak_7");
        assert_eq!(recent[2].milestone, "first_login");

        let bounded = store.recent_progress("@alice", 2).unwrap();
        assert_eq!(bounded.len(), 2);
        assert_eq!(bounded[0].milestone, "streak_7");
    }

    #[test]
    fn test_ledger_requires_profile_row() {
        let store = SqliteStore::open_in_memory().unwrap();
        // Foreign key: no profile row, no ledger entry.
        assert!(store.insert_progress(&entry_for("@ghost", "m", 1)).is_err());
    }

    #[test]
    fn test_ledger_metadata_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.upsert_profile(&write_for("@alice", "{}")).unwrap();

        let mut entry = entry_for("@alice", "first_payment", 100);
        entry.metadata.insert("amount".to_string(), "12.50".to_string());
        store.insert_progress(&entry).unwrap();

        let recent = store.recent_progress("@alice", 1).unwrap();
        assert_eq!(recent[0].metadata.get("amount").map(String::as_str), Some("12.50"));
    }

    #[test]
    fn test_migration_is_idempotent() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("profiles.db");
        // Open twice: second open re-runs the additive migration against
        // a database that already has the column.
        {
            let store = SqliteStore::open(&path, 100).unwrap();
            store.upsert_profile(&write_for("@alice", "{}")).unwrap();
        }
        let store = SqliteStore::open(&path, 100).unwrap();
        assert!(store.fetch_profile("@alice").unwrap().is_some());
    }
}
