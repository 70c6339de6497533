//! HttpMailer - hands emails to an HTTP mail gateway that owns SMTP.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::domain::EmailMessage;
use crate::error::{CollaboratorError, ConfigError};
use crate::ports::Mailer;

/// POSTs each email as JSON (`{to, from, subject, content, is_html}`) to one
/// endpoint. Any 2xx counts as delivered.
pub struct HttpMailer {
    client: reqwest::Client,
    url: String,
}

impl HttpMailer {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, ConfigError> {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::BaseUrl(url.to_string()));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: &EmailMessage) -> Result<(), CollaboratorError> {
        debug!(to = %email.to, subject = %email.subject, "sending email");
        let response = self
            .client
            .post(&self.url)
            .json(email)
            .send()
            .await
            .map_err(|e| CollaboratorError::Mail(format!("mail gateway unreachable: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(CollaboratorError::Mail(format!(
            "mail gateway returned {}: {body}",
            status.as_u16()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn email() -> EmailMessage {
        EmailMessage {
            to: "ada@example.com".into(),
            from: "info@example.com".into(),
            subject: "Memory added successfully".into(),
            content: "hello".into(),
            is_html: false,
        }
    }

    #[tokio::test]
    async fn posts_email_as_json() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/send").json_body(json!({
                    "to": "ada@example.com",
                    "from": "info@example.com",
                    "subject": "Memory added successfully",
                    "content": "hello",
                    "is_html": false
                }));
                then.status(202);
            })
            .await;

        let mailer = HttpMailer::new(&server.url("/send"), Duration::from_secs(5)).unwrap();
        mailer.send(&email()).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn gateway_error_is_a_mail_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/send");
                then.status(503).body("smtp relay down");
            })
            .await;

        let mailer = HttpMailer::new(&server.url("/send"), Duration::from_secs(5)).unwrap();
        let err = mailer.send(&email()).await.unwrap_err();
        match err {
            CollaboratorError::Mail(message) => {
                assert!(message.contains("503"), "{message}");
                assert!(message.contains("smtp relay down"), "{message}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_non_http_url() {
        assert!(matches!(
            HttpMailer::new("smtp://mail:25", Duration::from_secs(1)),
            Err(ConfigError::BaseUrl(_))
        ));
    }
}
