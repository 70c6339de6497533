//! DownstreamClient port - the processing API seen as "POST bytes, get status + body".
//!
//! Interpretation of the response (retryable or not, success or embedded
//! error) lives in the dispatcher, so every client implementation gets the same
//! classification for free.

use async_trait::async_trait;

use crate::error::DispatchError;

/// Raw response of the processing API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownstreamResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl DownstreamResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Lossy view of the body, for log lines and error reasons.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Sends one request to the processing API.
///
/// Implementations must bound the call in time and report connection-level
/// problems (refused, reset, timed out) as [`DispatchError::Transport`].
#[async_trait]
pub trait DownstreamClient: Send + Sync {
    async fn post(
        &self,
        path: &str,
        body: Vec<u8>,
        credential: &str,
    ) -> Result<DownstreamResponse, DispatchError>;
}
