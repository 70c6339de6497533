//! Notification emails as they travel through the email queue.

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

/// Wire format shared by the notifier (producer) and the email relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    pub from: String,
    pub subject: String,
    pub content: String,
    #[serde(default)]
    pub is_html: bool,
}

impl EmailMessage {
    pub fn decode(raw: &str) -> Result<Self, DecodeError> {
        let email: EmailMessage = serde_json::from_str(raw)?;
        if email.to.trim().is_empty() {
            return Err(DecodeError::MissingRecipient);
        }
        Ok(email)
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
