//! Hand-written fakes for the ports, shared by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::app::{Dispatcher, DispatcherConfig, OutcomeReporter, TaskRunner};
use crate::domain::{DefaultDecider, DownstreamFailure, EmailMessage, Envelope, ProcessedMemory};
use crate::error::{CollaboratorError, DispatchError, QueueError, SinkError};
use crate::impls::InMemoryTransport;
use crate::observability::PoolStats;
use crate::ports::{
    DeadLetterSink, DownstreamClient, DownstreamResponse, Mailer, Notifier, User, UserDirectory,
};
use crate::queue::{QueueSource, RetryPolicy};

/// One canned answer of [`ScriptedDownstream`].
#[derive(Debug, Clone)]
pub enum Reply {
    Status(u16, String),
    Transport(String),
}

impl Reply {
    pub fn status(code: u16) -> Self {
        Reply::Status(code, String::new())
    }

    pub fn processed(user_id: &str) -> Self {
        let body = json!({
            "response": {"user_id": user_id, "memory_id": "m-1", "title": "t"}
        });
        Reply::Status(200, body.to_string())
    }

    pub fn rejected(message: &str, user_id: Option<&str>) -> Self {
        let body = json!({"error": {"message": message, "user_id": user_id}});
        Reply::Status(200, body.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub path: String,
    pub credential: String,
    pub body: serde_json::Value,
}

/// Answers from a script, then repeats `fallback` (or a transport error).
pub struct ScriptedDownstream {
    script: Mutex<VecDeque<Reply>>,
    fallback: Option<Reply>,
    latency: Duration,
    calls: Mutex<Vec<RecordedCall>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedDownstream {
    pub fn new(script: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback: None,
            latency: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn always(reply: Reply) -> Self {
        Self::new([]).with_fallback(reply)
    }

    pub fn with_fallback(mut self, reply: Reply) -> Self {
        self.fallback = Some(reply);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DownstreamClient for ScriptedDownstream {
    async fn post(
        &self,
        path: &str,
        body: Vec<u8>,
        credential: &str,
    ) -> Result<DownstreamResponse, DispatchError> {
        self.calls.lock().unwrap().push(RecordedCall {
            path: path.to_string(),
            credential: credential.to_string(),
            body: serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null),
        });

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let reply = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| self.fallback.clone());
        match reply {
            Some(Reply::Status(code, body)) => Ok(DownstreamResponse::new(code, body)),
            Some(Reply::Transport(msg)) => Err(DispatchError::Transport(msg)),
            None => Err(DispatchError::Transport("script exhausted".into())),
        }
    }
}

/// Dead-letter sink that keeps entries in memory, or fails every write.
#[derive(Default)]
pub struct RecordingSink {
    entries: Mutex<Vec<Envelope>>,
    emails: Mutex<Vec<EmailMessage>>,
    failing: bool,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn entries(&self) -> Vec<Envelope> {
        self.entries.lock().unwrap().clone()
    }

    pub fn emails(&self) -> Vec<EmailMessage> {
        self.emails.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeadLetterSink for RecordingSink {
    async fn record(&self, envelope: &Envelope) -> Result<(), SinkError> {
        if self.failing {
            return Err(SinkError::Queue(QueueError::Connection("sink down".into())));
        }
        self.entries.lock().unwrap().push(envelope.clone());
        Ok(())
    }

    async fn record_email(&self, email: &EmailMessage) -> Result<(), SinkError> {
        if self.failing {
            return Err(SinkError::Queue(QueueError::Connection("sink down".into())));
        }
        self.emails.lock().unwrap().push(email.clone());
        Ok(())
    }
}

/// Mailer that fails its first `fail_first` sends, then delivers.
pub struct ScriptedMailer {
    fail_first: usize,
    calls: AtomicUsize,
    delivered: Mutex<Vec<EmailMessage>>,
}

impl ScriptedMailer {
    pub fn failing_first(fail_first: usize) -> Self {
        Self {
            fail_first,
            calls: AtomicUsize::new(0),
            delivered: Mutex::new(Vec::new()),
        }
    }

    pub fn always_failing() -> Self {
        Self::failing_first(usize::MAX)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn delivered(&self) -> Vec<EmailMessage> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for ScriptedMailer {
    async fn send(&self, email: &EmailMessage) -> Result<(), CollaboratorError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.fail_first {
            return Err(CollaboratorError::Mail("smtp unavailable".into()));
        }
        self.delivered.lock().unwrap().push(email.clone());
        Ok(())
    }
}

pub fn email(to: &str) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        from: "info@example.com".to_string(),
        subject: "Memory added successfully".to_string(),
        content: "hello".to_string(),
        is_html: false,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Added { user_id: String, memory_id: String },
    Failed { user_id: String, message: String },
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Sent>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn memory_added(
        &self,
        memory: &ProcessedMemory,
        user: &User,
    ) -> Result<(), CollaboratorError> {
        self.sent.lock().unwrap().push(Sent::Added {
            user_id: user.id.clone(),
            memory_id: memory.memory_id.clone(),
        });
        Ok(())
    }

    async fn memory_failed(
        &self,
        failure: &DownstreamFailure,
        user: &User,
    ) -> Result<(), CollaboratorError> {
        self.sent.lock().unwrap().push(Sent::Failed {
            user_id: user.id.clone(),
            message: failure.message.clone(),
        });
        Ok(())
    }
}

/// Fixed set of users; anything else is not found.
#[derive(Default)]
pub struct StaticUsers {
    users: HashMap<String, User>,
}

impl StaticUsers {
    pub fn with(ids: &[&str]) -> Self {
        let users = ids
            .iter()
            .map(|id| {
                let user = User {
                    id: id.to_string(),
                    name: format!("user {id}"),
                    email: format!("{id}@example.com"),
                };
                (id.to_string(), user)
            })
            .collect();
        Self { users }
    }
}

#[async_trait]
impl UserDirectory for StaticUsers {
    async fn find_user(&self, user_id: &str) -> Result<User, CollaboratorError> {
        self.users
            .get(user_id)
            .cloned()
            .ok_or_else(|| CollaboratorError::UserNotFound(user_id.to_string()))
    }
}

/// A runner wired to fakes: scripted processor, in-memory requeue transport,
/// recording sink and notifier. Backoff is 1s doubling without jitter.
pub struct Harness {
    pub runner: Arc<TaskRunner>,
    pub downstream: Arc<ScriptedDownstream>,
    pub sink: Arc<RecordingSink>,
    pub notifier: Arc<RecordingNotifier>,
    pub transport: Arc<InMemoryTransport>,
    pub cancel: CancellationToken,
}

impl Harness {
    pub fn new(script: impl IntoIterator<Item = Reply>, fallback: Option<Reply>) -> Self {
        let mut downstream = ScriptedDownstream::new(script);
        if let Some(reply) = fallback {
            downstream = downstream.with_fallback(reply);
        }
        Self::build(downstream, RecordingSink::default())
    }

    pub fn with_failing_sink(script: impl IntoIterator<Item = Reply>) -> Self {
        Self::build(ScriptedDownstream::new(script), RecordingSink::failing())
    }

    pub fn build(downstream: ScriptedDownstream, sink: RecordingSink) -> Self {
        let downstream = Arc::new(downstream);
        let sink = Arc::new(sink);
        let notifier = Arc::new(RecordingNotifier::default());
        let transport = Arc::new(InMemoryTransport::new());

        let dispatcher = Arc::new(Dispatcher::new(
            downstream.clone(),
            DispatcherConfig::default(),
        ));
        let decider = Arc::new(DefaultDecider::new(
            RetryPolicy::exponential(Duration::from_secs(1), Duration::from_secs(60)),
            3,
        ));
        let reporter = Arc::new(OutcomeReporter::new(
            Arc::new(StaticUsers::with(&["u-1"])),
            notifier.clone(),
        ));
        let runner = Arc::new(TaskRunner::new(
            dispatcher,
            decider,
            sink.clone(),
            reporter,
            QueueSource::new(transport.clone(), Duration::from_millis(100)),
            Arc::new(PoolStats::new()),
        ));

        Self {
            runner,
            downstream,
            sink,
            notifier,
            transport,
            cancel: CancellationToken::new(),
        }
    }
}
