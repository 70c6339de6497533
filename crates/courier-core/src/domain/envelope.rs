//! Envelope: the message actually stored on a queue.

use serde::{Deserialize, Serialize};

use super::task::Task;
use crate::error::DecodeError;

/// A task plus the credential that authorizes its downstream call.
///
/// The credential is opaque to the pipeline. It is only checked for presence
/// and forwarded untouched, including into the dead-letter queue so a replayed
/// envelope can be dispatched again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub task: Task,

    #[serde(rename = "api_key")]
    pub credential: String,
}

impl Envelope {
    pub fn new(task: Task, credential: impl Into<String>) -> Self {
        Self {
            task,
            credential: credential.into(),
        }
    }

    /// Parse a raw queue body.
    pub fn decode(raw: &str) -> Result<Self, DecodeError> {
        let envelope: Envelope = serde_json::from_str(raw)?;
        if envelope.credential.is_empty() {
            return Err(DecodeError::MissingCredential);
        }
        Ok(envelope)
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
