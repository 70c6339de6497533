//! Bodies returned by the processing API with a 2xx status.
//!
//! A 2xx response is either a processed memory or an application-level
//! failure wrapped in the same envelope:
//!
//! ```text
//! {"response": {"user_id": "...", "memory_id": "...", "title": "..."}}
//! {"error": {"message": "..."}}
//! ```

use serde::{Deserialize, Serialize};

/// Successful processing result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedMemory {
    #[serde(alias = "userId")]
    pub user_id: String,

    #[serde(alias = "memoryId")]
    pub memory_id: String,

    #[serde(default)]
    pub title: String,

    /// Everything else the processor returned (transcript, chunks, metadata).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Application-level failure reported inside a 2xx body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownstreamFailure {
    #[serde(alias = "error")]
    pub message: String,

    /// Present when the processor knows whom the task belonged to.
    #[serde(default, alias = "userId", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// The wrapper around either of the two bodies above.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentReply {
    #[serde(default)]
    pub response: Option<ProcessedMemory>,

    #[serde(default)]
    pub error: Option<DownstreamFailure>,
}

/// What a 2xx body turned out to mean.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyKind {
    Processed(ProcessedMemory),
    Failed(DownstreamFailure),
    Empty,
}

impl AgentReply {
    /// A body carrying both fields is treated as a success, matching the
    /// processor's own precedence.
    pub fn into_kind(self) -> ReplyKind {
        match (self.response, self.error) {
            (Some(memory), _) => ReplyKind::Processed(memory),
            (None, Some(failure)) => ReplyKind::Failed(failure),
            (None, None) => ReplyKind::Empty,
        }
    }
}
