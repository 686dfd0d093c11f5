//! Object-storage snapshot sink
//!
//! Best-effort boundary: after a successful single-document write the
//! engine offers the serialized bytes and their digest to the sink.
//! Failures are logged, never propagated.

use async_trait::async_trait;
use thiserror::Error;

/// Snapshot upload failure. Internal only: call sites log and continue.
#[derive(Error, Debug)]
#[error("snapshot upload failed: {0}")]
pub struct SnapshotError(pub String);

/// Best-effort snapshot sink interface.
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    async fn upload_snapshot(
        &self,
        user_id: &str,
        serialized: &[u8],
        digest_hex: &str,
    ) -> Result<(), SnapshotError>;
}

/// Sink that discards snapshots (default).
pub struct NoopSnapshotSink;

#[async_trait]
impl SnapshotSink for NoopSnapshotSink {
    async fn upload_snapshot(
        &self,
        _user_id: &str,
        _serialized: &[u8],
        _digest_hex: &str,
    ) -> Result<(), SnapshotError> {
        Ok(())
    }
}
