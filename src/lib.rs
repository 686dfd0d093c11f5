//! prefvault - Durable per-user preference storage with content-hash
//! integrity and an append-only progress ledger
//!
//! prefvault stores one preference document per user, fingerprints every
//! write with a SHA-256 content digest, reconciles a secure secret-scoped
//! tier against a relational tier, and keeps milestone history in an
//! append-only ledger.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         ProfileEngine                            │
//! │  create / get / update / update_checked / batch_create           │
//! │  append_progress / save_progress / recent_progress               │
//! │                                                                  │
//! │  write path:                                                     │
//! │    validate → canonical encode → digest ──► SqliteStore (fatal)  │
//! │                                        └──► SecretTier (warn)    │
//! │                                        └──► SnapshotSink (warn)  │
//! │                                        └──► Emitter (fire+forget)│
//! │  read path:                                                      │
//! │    SecretTier hit? ──► return (authoritative)                    │
//! │    else SqliteStore ──► parse / repair ──► return                │
//! │                              └──► detached drift check           │
//! │                                   (deduped, bounded, non-blocking)│
//! └──────────────────────────────────────────────────────────────────┘
//!                 │                                    │
//!        ┌────────▼─────────┐                ┌─────────▼──────────┐
//!        │   SqliteStore    │                │ Personalization    │
//!        │   profiles +     │                │ Projector          │
//!        │   progress_log   │                │ 384-wide vector    │
//!        └──────────────────┘                └────────────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - Every persisted document carries the digest of its canonical
//!   encoding, computed at the moment of the last successful write.
//! - The ledger is insert-only; the Profile's progress map is a derived
//!   cache rebuilt from it.
//! - Writes are last-writer-wins; [`ProfileEngine::update_checked`]
//!   offers an opt-in digest precondition for callers that need to
//!   detect lost updates.
//! - Readers never observe an error for corrupted or stale stored data:
//!   they get a repaired document or not-found, and repair happens off
//!   the read path.
//!
//! ## Modules
//!
//! - [`engine`]: orchestration across tiers, the progress ledger API
//! - [`store`]: SQLite-backed relational tier
//! - [`canonical`]: deterministic encoding and content digests
//! - [`profile`]: document model, validation, legacy-shape repair
//! - [`secret`]: per-user-scoped secure key/value tier
//! - [`notify`]: change-event publication
//! - [`snapshot`]: best-effort object-storage snapshot boundary
//! - [`projection`]: derived personalization vectors
//! - [`config`]: configuration management

pub mod canonical;
pub mod config;
pub mod engine;
pub mod error;
pub mod notify;
pub mod profile;
pub mod projection;
pub mod secret;
pub mod snapshot;
pub mod store;

pub use config::VaultConfig;
pub use engine::ProfileEngine;
pub use error::{Error, Result};
pub use profile::{
    IntegrityLock, MilestoneStamp, PaymentGateway, Profile, ProfilePatch, ProgressEntry,
    SubscriptionTier,
};
pub use projection::PersonalizationProjector;
