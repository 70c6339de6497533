//! Notifier that hands plain-text emails to the email relay through a queue.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::domain::{DownstreamFailure, EmailMessage, ProcessedMemory};
use crate::error::CollaboratorError;
use crate::ports::{Notifier, QueueTransport, User};

pub const DEFAULT_EMAIL_QUEUE: &str = "email:queue";

pub struct QueueNotifier {
    transport: Arc<dyn QueueTransport>,
    queue: String,
    sender: String,
}

impl QueueNotifier {
    pub fn new(
        transport: Arc<dyn QueueTransport>,
        queue: impl Into<String>,
        sender: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            queue: queue.into(),
            sender: sender.into(),
        }
    }

    async fn send(&self, message: EmailMessage) -> Result<(), CollaboratorError> {
        let body = message
            .encode()
            .map_err(|e| CollaboratorError::Notify(e.to_string()))?;
        self.transport
            .push(&self.queue, body)
            .await
            .map_err(|e| CollaboratorError::Notify(e.to_string()))?;
        info!(queue = %self.queue, subject = %message.subject, "queued notification email");
        Ok(())
    }
}

#[async_trait]
impl Notifier for QueueNotifier {
    async fn memory_added(
        &self,
        memory: &ProcessedMemory,
        user: &User,
    ) -> Result<(), CollaboratorError> {
        let what = if memory.title.is_empty() {
            "Your memory".to_string()
        } else {
            format!("Your memory \"{}\"", memory.title)
        };
        let content = format!(
            "Hello {},\n\n{what} was added successfully (id {}).\n",
            user.name, memory.memory_id
        );
        self.send(EmailMessage {
            to: user.email.clone(),
            from: self.sender.clone(),
            subject: "Memory added successfully".to_string(),
            content,
            is_html: false,
        })
        .await
    }

    async fn memory_failed(
        &self,
        failure: &DownstreamFailure,
        user: &User,
    ) -> Result<(), CollaboratorError> {
        let content = format!(
            "Hello {},\n\nWe could not add your recent memory.\n\nError details: {}\n\n\
             Please try again later or reply to this email if the issue persists.\n",
            user.name, failure.message
        );
        self.send(EmailMessage {
            to: user.email.clone(),
            from: self.sender.clone(),
            subject: "Error adding memory".to_string(),
            content,
            is_html: false,
        })
        .await
    }
}
