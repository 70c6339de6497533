//! Notifier port - tells the owner of a task how processing went.

use async_trait::async_trait;

use super::user_directory::User;
use crate::domain::{DownstreamFailure, ProcessedMemory};
use crate::error::CollaboratorError;

/// Sends user-facing notifications. Failures are reported to the caller, who
/// logs them; they never feed back into a task's retry state.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn memory_added(
        &self,
        memory: &ProcessedMemory,
        user: &User,
    ) -> Result<(), CollaboratorError>;

    async fn memory_failed(
        &self,
        failure: &DownstreamFailure,
        user: &User,
    ) -> Result<(), CollaboratorError>;
}
