use std::time::Duration;

use thiserror::Error;

use crate::domain::{DownstreamFailure, TaskKind};

/// A queue body that cannot be turned into an envelope or an email. Such
/// messages are dropped: without a valid structure they cannot be safely
/// re-enqueued.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("envelope has no credential")]
    MissingCredential,

    #[error("email has no recipient")]
    MissingRecipient,
}

/// Why a single dispatch attempt did not succeed.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unknown kind: {0}")]
    UnknownKind(TaskKind),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected status {0}")]
    UnexpectedStatus(u16),

    #[error("unprocessable input: {0}")]
    UnprocessableInput(String),

    #[error("processor rejected task: {}", .0.message)]
    Rejected(DownstreamFailure),

    #[error("invalid response format: {0}")]
    InvalidResponse(String),
}

impl DispatchError {
    /// Only failures that may go away on their own are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DispatchError::Transport(_) | DispatchError::UnexpectedStatus(_)
        )
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            DispatchError::UnexpectedStatus(code) => Some(*code),
            DispatchError::UnprocessableInput(_) => Some(422),
            _ => None,
        }
    }

    /// Short label for structured logs.
    pub fn error_type(&self) -> &'static str {
        match self {
            DispatchError::UnknownKind(_) => "unknown_kind",
            DispatchError::Encode(_) => "encode_error",
            DispatchError::Transport(_) => "transport_error",
            DispatchError::UnexpectedStatus(_) => "unexpected_status",
            DispatchError::UnprocessableInput(_) => "unprocessable_input",
            DispatchError::Rejected(_) => "rejected",
            DispatchError::InvalidResponse(_) => "invalid_response",
        }
    }
}

/// Failures of the queue transport itself (not of the messages on it).
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue connection error: {0}")]
    Connection(String),

    #[error("queue command failed: {0}")]
    Command(String),

    #[error("queue is closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to encode dead-letter entry: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to write dead-letter entry: {0}")]
    Queue(#[from] QueueError),
}

/// Failures of the notification side path. The task pipeline only logs them;
/// the email relay retries `Mail` failures.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("user not found with id: {0}")]
    UserNotFound(String),

    #[error("user lookup failed: {0}")]
    Lookup(String),

    #[error("notification failed: {0}")]
    Notify(String),

    #[error("mail delivery failed: {0}")]
    Mail(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("at least one input queue is required")]
    NoQueues,

    #[error("duplicate input queue: {0}")]
    DuplicateQueue(String),

    #[error("output queue {0} must not also be an input queue")]
    OutputIsInput(String),

    #[error("dead-letter and email queues must differ, both are {0}")]
    SharedOutputQueue(String),

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("max_delay ({max:?}) must not be shorter than base_delay ({base:?})")]
    MaxDelay { base: Duration, max: Duration },

    #[error("workers must be at most {max}, got {workers}")]
    TooManyWorkers { workers: usize, max: usize },

    #[error("jitter must be within 0.0..=1.0, got {0}")]
    Jitter(f64),

    #[error("invalid processor url: {0}")]
    BaseUrl(String),

    #[error("invalid credential header name: {0}")]
    CredentialHeader(String),

    #[error("failed to build http client: {0}")]
    HttpClient(String),
}
