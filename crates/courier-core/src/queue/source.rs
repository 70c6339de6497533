//! Queue source: an indefinitely blocking pull over a transport.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::domain::Envelope;
use crate::error::QueueError;
use crate::ports::QueueTransport;

/// Blocking pull over one or more named queues.
///
/// `pull` has no timeout of its own: it keeps polling the transport until a
/// message shows up. Cancellation is only checked between polls. A pop that
/// is already on the wire may have taken the message off the queue, so it is
/// always allowed to finish; a cancelled pull therefore returns within one
/// `poll_interval`.
#[derive(Clone)]
pub struct QueueSource {
    transport: Arc<dyn QueueTransport>,
    poll_interval: Duration,
}

impl QueueSource {
    pub fn new(transport: Arc<dyn QueueTransport>, poll_interval: Duration) -> Self {
        Self {
            transport,
            poll_interval,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Wait for the next raw message on `queue`.
    ///
    /// Returns `Ok(None)` only when `cancel` fired and no message came back
    /// from the last poll. A message popped after cancellation is still
    /// returned so the caller can take care of it.
    pub async fn pull(
        &self,
        queue: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, QueueError> {
        while !cancel.is_cancelled() {
            if let Some(body) = self.transport.pop(queue, self.poll_interval).await? {
                return Ok(Some(body));
            }
        }
        Ok(None)
    }

    /// Put an envelope back on `queue`, keeping its attempt count.
    pub async fn requeue(&self, queue: &str, envelope: &Envelope) -> Result<(), QueueError> {
        let body = envelope
            .encode()
            .map_err(|e| QueueError::Command(format!("encode envelope: {e}")))?;
        self.push_raw(queue, body).await
    }

    /// Put a body back on `queue` exactly as it was pulled.
    pub async fn push_raw(&self, queue: &str, body: String) -> Result<(), QueueError> {
        self.transport.push(queue, body).await
    }
}
