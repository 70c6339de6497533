//! HttpDownstream - the processing API over HTTP (reqwest).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderName};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, DispatchError};
use crate::ports::{DownstreamClient, DownstreamResponse};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpDownstreamConfig {
    /// Scheme, host and port of the processing API, without a trailing slash.
    pub base_url: String,

    /// Header that carries the task's credential.
    pub credential_header: String,

    #[serde(with = "crate::config::duration_secs")]
    pub request_timeout: Duration,

    #[serde(with = "crate::config::duration_secs")]
    pub connect_timeout: Duration,
}

impl Default for HttpDownstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            credential_header: "x-api-key".to_string(),
            request_timeout: Duration::from_secs(120),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

pub struct HttpDownstream {
    client: reqwest::Client,
    base_url: String,
    credential_header: HeaderName,
}

impl HttpDownstream {
    pub fn new(config: &HttpDownstreamConfig) -> Result<Self, ConfigError> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::BaseUrl(config.base_url.clone()));
        }
        let credential_header = HeaderName::from_bytes(config.credential_header.as_bytes())
            .map_err(|_| ConfigError::CredentialHeader(config.credential_header.clone()))?;

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            credential_header,
        })
    }
}

/// Anything reqwest reports before a full response is in hand is a transport
/// problem; HTTP statuses are judged by the dispatcher.
fn transport_error(source: reqwest::Error) -> DispatchError {
    let message = if source.is_timeout() {
        "request timed out".to_string()
    } else if source.is_connect() {
        format!("connection failed: {source}")
    } else {
        format!("request failed: {source}")
    };
    DispatchError::Transport(message)
}

#[async_trait]
impl DownstreamClient for HttpDownstream {
    async fn post(
        &self,
        path: &str,
        body: Vec<u8>,
        credential: &str,
    ) -> Result<DownstreamResponse, DispatchError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "posting task to processor");

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .header(self.credential_header.clone(), credential)
            .body(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status().as_u16();
        let bytes = response.bytes().await.map_err(transport_error)?;
        Ok(DownstreamResponse::new(status, bytes.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client_for(server: &MockServer, timeout: Duration) -> HttpDownstream {
        HttpDownstream::new(&HttpDownstreamConfig {
            base_url: server.base_url(),
            request_timeout: timeout,
            ..HttpDownstreamConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn posts_payload_with_credential_header() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/v1/link/process/web")
                    .header("x-api-key", "secret")
                    .header("content-type", "application/json")
                    .json_body(json!({"url": "https://example.com"}));
                then.status(200)
                    .json_body(json!({"response": {"user_id": "u", "memory_id": "m"}}));
            })
            .await;

        let client = client_for(&server, Duration::from_secs(5));
        let body = serde_json::to_vec(&json!({"url": "https://example.com"})).unwrap();
        let response = client
            .post("/api/v1/link/process/web", body, "secret")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.status, 200);
        assert!(response.body_text().contains("memory_id"));
    }

    #[tokio::test]
    async fn non_success_status_is_returned_not_raised() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/p");
                then.status(503).body("busy");
            })
            .await;

        let response = client_for(&server, Duration::from_secs(5))
            .post("/p", b"{}".to_vec(), "k")
            .await
            .unwrap();
        assert_eq!(response.status, 503);
        assert_eq!(response.body_text(), "busy");
    }

    #[tokio::test]
    async fn slow_processor_times_out_as_transport_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/slow");
                then.status(200).delay(Duration::from_millis(500));
            })
            .await;

        let err = client_for(&server, Duration::from_millis(50))
            .post("/slow", b"{}".to_vec(), "k")
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Transport(_)), "got {err:?}");
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn refused_connection_is_transport_error() {
        let client = HttpDownstream::new(&HttpDownstreamConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            ..HttpDownstreamConfig::default()
        })
        .unwrap();
        let err = client.post("/p", Vec::new(), "k").await.unwrap_err();
        assert!(matches!(err, DispatchError::Transport(_)));
    }

    #[test]
    fn rejects_bad_base_url_and_header() {
        let bad_url = HttpDownstream::new(&HttpDownstreamConfig {
            base_url: "localhost:8000".to_string(),
            ..HttpDownstreamConfig::default()
        });
        assert!(matches!(bad_url, Err(ConfigError::BaseUrl(_))));

        let bad_header = HttpDownstream::new(&HttpDownstreamConfig {
            credential_header: "x api key".to_string(),
            ..HttpDownstreamConfig::default()
        });
        assert!(matches!(bad_header, Err(ConfigError::CredentialHeader(_))));
    }
}
