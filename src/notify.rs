//! Change-event publication
//!
//! The engine publishes to `"profile-updated"` after an update and
//! `"progress-updated"` after a milestone save. Publication is
//! fire-and-forget: implementations swallow their own failures and a
//! publish can never affect the success of the write that triggered it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Channel name for profile document changes
pub const PROFILE_UPDATED: &str = "profile-updated";
/// Channel name for milestone saves
pub const PROGRESS_UPDATED: &str = "progress-updated";

/// A published change event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub channel: String,
    pub payload: serde_json::Value,
}

/// Fire-and-forget change-event sink.
#[async_trait]
pub trait NotificationEmitter: Send + Sync {
    /// Publish a payload to a named channel. Infallible by contract;
    /// implementations log their own failures.
    async fn publish(&self, channel: &str, payload: serde_json::Value);
}

/// Emitter that only logs (default when no consumer is wired in).
pub struct LogEmitter;

#[async_trait]
impl NotificationEmitter for LogEmitter {
    async fn publish(&self, channel: &str, payload: serde_json::Value) {
        tracing::debug!(channel, %payload, "change event");
    }
}

/// Emitter backed by a tokio broadcast channel for in-process consumers.
pub struct BroadcastEmitter {
    sender: Arc<tokio::sync::broadcast::Sender<ChangeEvent>>,
}

impl BroadcastEmitter {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = tokio::sync::broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Subscribe to the change-event stream.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl NotificationEmitter for BroadcastEmitter {
    async fn publish(&self, channel: &str, payload: serde_json::Value) {
        let event = ChangeEvent {
            channel: channel.to_string(),
            payload,
        };
        // No receivers is normal, not an error.
        if self.sender.send(event).is_err() {
            tracing::debug!(channel, "change event dropped: no subscribers");
        }
    }
}
