//! DeadLetterSink port - where abandoned tasks and emails go.

use async_trait::async_trait;

use crate::domain::{EmailMessage, Envelope};
use crate::error::SinkError;

/// Durable append of an envelope that exhausted its retries or failed fatally.
///
/// The envelope is recorded with its current `attempt` and original
/// credential so an operator can inspect or replay it. Recording the same
/// logical task twice must not corrupt the sink (at-least-once is fine).
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    async fn record(&self, envelope: &Envelope) -> Result<(), SinkError>;

    /// Same guarantees for an email the relay could not deliver.
    async fn record_email(&self, email: &EmailMessage) -> Result<(), SinkError>;
}
