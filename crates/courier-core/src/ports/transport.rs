//! QueueTransport port - named queues of raw message bodies (Redis or in-memory).
//!
//! The transport knows nothing about envelopes; it moves strings. Delivery is
//! at-least-once, so anything consuming from it has to tolerate duplicates.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::QueueError;

/// Push/pop access to named queues.
///
/// `pop` blocks for at most `timeout` and returns `Ok(None)` when nothing
/// arrived in time. Callers that want to wait indefinitely loop over it, which
/// keeps cancellation observable at every `timeout` boundary.
#[async_trait]
pub trait QueueTransport: Send + Sync {
    async fn push(&self, queue: &str, body: String) -> Result<(), QueueError>;

    async fn pop(&self, queue: &str, timeout: Duration) -> Result<Option<String>, QueueError>;
}
