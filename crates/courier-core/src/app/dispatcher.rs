//! Dispatcher - one attempt of one task against the processing API.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{AgentReply, ProcessedMemory, ReplyKind, RetryOutcome, Task, TaskKind};
use crate::error::DispatchError;
use crate::ports::{DownstreamClient, DownstreamResponse};

const UNPROCESSABLE_ENTITY: u16 = 422;

/// Kind -> endpoint routing table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatcherConfig {
    pub endpoints: HashMap<String, String>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        let endpoints = [
            ("git", "/api/v1/link/process/git"),
            ("youtube", "/api/v1/link/process/youtube"),
            ("web", "/api/v1/link/process/web"),
            ("file", "/api/v1/file/process/pdf"),
            ("audio", "/api/v1/file/process/audio"),
            ("video", "/api/v1/file/process/video"),
            ("image", "/api/v1/file/process/image"),
        ]
        .into_iter()
        .map(|(kind, path)| (kind.to_string(), path.to_string()))
        .collect();
        Self { endpoints }
    }
}

impl DispatcherConfig {
    pub fn endpoint_for(&self, kind: &TaskKind) -> Option<&str> {
        self.endpoints.get(kind.as_str()).map(String::as_str)
    }
}

/// Sends a task to the endpoint for its kind and classifies what came back.
///
/// Stateless apart from the shared client, so one instance serves every
/// worker of every pool.
pub struct Dispatcher {
    client: Arc<dyn DownstreamClient>,
    config: DispatcherConfig,
}

impl Dispatcher {
    pub fn new(client: Arc<dyn DownstreamClient>, config: DispatcherConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Run one attempt.
    ///
    /// `task.attempt` is incremented exactly once, right before the downstream
    /// call. Tasks rejected before that point (unknown kind, unencodable
    /// payload) keep their count.
    pub async fn dispatch(&self, task: &mut Task, credential: &str) -> RetryOutcome {
        self.try_dispatch(task, credential).await.into()
    }

    async fn try_dispatch(
        &self,
        task: &mut Task,
        credential: &str,
    ) -> Result<ProcessedMemory, DispatchError> {
        let endpoint = self
            .config
            .endpoint_for(&task.kind)
            .ok_or_else(|| DispatchError::UnknownKind(task.kind.clone()))?;
        let body =
            serde_json::to_vec(&task.payload).map_err(|e| DispatchError::Encode(e.to_string()))?;

        let attempt = task.begin_attempt();
        debug!(kind = %task.kind, attempt, endpoint, "dispatching task");

        let response = self.client.post(endpoint, body, credential).await?;
        interpret(response)
    }
}

fn interpret(response: DownstreamResponse) -> Result<ProcessedMemory, DispatchError> {
    if response.status == UNPROCESSABLE_ENTITY {
        let body = response.body_text();
        warn!(status = response.status, body = %body, "processor refused input");
        return Err(DispatchError::UnprocessableInput(body));
    }
    if !response.is_success() {
        return Err(DispatchError::UnexpectedStatus(response.status));
    }

    let reply: AgentReply = serde_json::from_slice(&response.body)
        .map_err(|e| DispatchError::InvalidResponse(e.to_string()))?;
    match reply.into_kind() {
        ReplyKind::Processed(memory) => Ok(memory),
        ReplyKind::Failed(failure) => Err(DispatchError::Rejected(failure)),
        ReplyKind::Empty => Err(DispatchError::InvalidResponse(
            "body has neither response nor error".to_string(),
        )),
    }
}
