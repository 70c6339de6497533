//! Outcome of one dispatch attempt.
//!
//! This is the only thing the retry loop looks at when deciding what to do
//! next. It is transient: nothing here is persisted.

use super::reply::ProcessedMemory;
use crate::error::DispatchError;

#[derive(Debug)]
pub enum RetryOutcome {
    Success(ProcessedMemory),

    /// Worth another attempt if the retry budget allows it.
    RetryableFailure(DispatchError),

    /// Will not get better on retry. Bypasses the retry ceiling.
    FatalFailure(DispatchError),
}

impl RetryOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RetryOutcome::Success(_))
    }

    pub fn error(&self) -> Option<&DispatchError> {
        match self {
            RetryOutcome::Success(_) => None,
            RetryOutcome::RetryableFailure(e) | RetryOutcome::FatalFailure(e) => Some(e),
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        self.error().and_then(DispatchError::status_code)
    }
}

impl From<Result<ProcessedMemory, DispatchError>> for RetryOutcome {
    fn from(result: Result<ProcessedMemory, DispatchError>) -> Self {
        match result {
            Ok(memory) => RetryOutcome::Success(memory),
            Err(e) if e.is_retryable() => RetryOutcome::RetryableFailure(e),
            Err(e) => RetryOutcome::FatalFailure(e),
        }
    }
}
