//! Mailer port - final delivery of a notification email.

use async_trait::async_trait;

use crate::domain::EmailMessage;
use crate::error::CollaboratorError;

/// Delivers one email. Errors are `CollaboratorError::Mail` and are retried
/// by the email relay.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &EmailMessage) -> Result<(), CollaboratorError>;
}
