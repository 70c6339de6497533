//! Dead-letter sink backed by a queue on the same transport as the inputs.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::domain::{EmailMessage, Envelope};
use crate::error::SinkError;
use crate::ports::{DeadLetterSink, QueueTransport};

pub const DEFAULT_DEAD_LETTER_QUEUE: &str = "failed:queue";

/// Appends dead envelopes to a list with a single push, so an entry is either
/// fully written or not written at all.
pub struct QueueDeadLetterSink {
    transport: Arc<dyn QueueTransport>,
    queue: String,
}

impl QueueDeadLetterSink {
    pub fn new(transport: Arc<dyn QueueTransport>, queue: impl Into<String>) -> Self {
        Self {
            transport,
            queue: queue.into(),
        }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }
}

#[async_trait]
impl DeadLetterSink for QueueDeadLetterSink {
    async fn record(&self, envelope: &Envelope) -> Result<(), SinkError> {
        let body = envelope.encode()?;
        warn!(
            queue = %self.queue,
            kind = %envelope.task.kind,
            attempt = envelope.task.attempt,
            "moving task to dead-letter queue"
        );
        self.transport.push(&self.queue, body).await?;
        Ok(())
    }

    async fn record_email(&self, email: &EmailMessage) -> Result<(), SinkError> {
        let body = email.encode()?;
        warn!(queue = %self.queue, subject = %email.subject, "moving email to dead-letter queue");
        self.transport.push(&self.queue, body).await?;
        Ok(())
    }
}
