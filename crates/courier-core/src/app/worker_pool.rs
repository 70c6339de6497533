//! WorkerPool - one pull loop over one queue, fanning out to at most `workers`
//! concurrent handlers.
//!
//! # Flow
//! 1. Acquire a slot (blocks while all `workers` slots are busy)
//! 2. `QueueSource::pull()` the next raw body
//! 3. Decode it with the pool's `MessageHandler` (malformed bodies are dropped)
//! 4. Spawn `MessageHandler::handle()` holding the slot until it ends
//!
//! On cancellation the loop stops pulling and gives in-flight messages
//! `shutdown_grace` to finish. Whatever is still running then is aborted and
//! its body pushed back onto the queue exactly as it was pulled.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::runner::{TaskReport, TaskRunner};
use crate::domain::DeliveryId;
use crate::error::DecodeError;
use crate::observability::{PoolCounts, PoolStats};
use crate::queue::QueueSource;

/// Longest slice of a raw body that makes it into a log line.
const MAX_LOGGED_BODY: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Concurrent tasks per queue.
    pub workers: usize,

    #[serde(with = "crate::config::duration_secs")]
    pub shutdown_grace: Duration,

    /// Pause after a failed pull before trying the transport again.
    #[serde(with = "crate::config::duration_secs")]
    pub error_backoff: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            shutdown_grace: Duration::from_secs(10),
            error_backoff: Duration::from_secs(1),
        }
    }
}

/// What a pool does with the messages it pulls.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    type Message: Send + 'static;

    /// Turn a raw queue body into a message. Errors drop the body.
    fn decode(&self, raw: &str) -> Result<Self::Message, DecodeError>;

    /// Take one message to a terminal state. Once `cancel` fires, a handler
    /// must not start new work for it but hand it back to `queue`.
    async fn handle(
        &self,
        queue: &str,
        delivery_id: DeliveryId,
        message: Self::Message,
        cancel: &CancellationToken,
    ) -> TaskReport;

    fn stats(&self) -> &Arc<PoolStats>;
}

/// A spawned message, kept until its task is joined.
struct InFlight {
    delivery_id: DeliveryId,
    raw: String,
}

pub struct WorkerPool<H = TaskRunner> {
    queue: String,
    source: QueueSource,
    handler: Arc<H>,
    config: PoolConfig,
}

impl<H: MessageHandler> WorkerPool<H> {
    pub fn new(
        queue: impl Into<String>,
        source: QueueSource,
        handler: Arc<H>,
        config: PoolConfig,
    ) -> Self {
        Self {
            queue: queue.into(),
            source,
            handler,
            config,
        }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub fn stats(&self) -> Arc<PoolStats> {
        self.handler.stats().clone()
    }

    /// Consume until `cancel` fires, then drain. Returns the final counters.
    pub async fn run(self, cancel: CancellationToken) -> PoolCounts {
        let stats = self.stats();
        let slots = Arc::new(Semaphore::new(self.config.workers));
        let mut tasks: JoinSet<TaskReport> = JoinSet::new();
        let mut in_flight: HashMap<Id, InFlight> = HashMap::new();
        info!(queue = %self.queue, workers = self.config.workers, "worker pool started");

        loop {
            while let Some(joined) = tasks.try_join_next_with_id() {
                self.finish(&mut in_flight, joined);
            }

            // Slot first: with every worker busy we must not take another
            // message off the queue.
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                permit = slots.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let raw = match self.source.pull(&self.queue, &cancel).await {
                Ok(Some(raw)) => {
                    stats.set_transport_down(false);
                    raw
                }
                Ok(None) => break,
                Err(err) => {
                    stats.set_transport_down(true);
                    error!(queue = %self.queue, error = %err, "pull failed");
                    drop(permit);
                    let cancelled = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => true,
                        _ = tokio::time::sleep(self.config.error_backoff) => false,
                    };
                    if cancelled {
                        break;
                    }
                    continue;
                }
            };
            stats.pulled();

            let message = match self.handler.decode(&raw) {
                Ok(message) => message,
                Err(err) => {
                    stats.dropped();
                    warn!(
                        queue = %self.queue,
                        error = %err,
                        body = %truncate(&raw, MAX_LOGGED_BODY),
                        "dropping malformed message"
                    );
                    continue;
                }
            };

            // A message popped while shutting down still runs: the handler
            // sees the cancelled token and hands it back instead of retrying.
            let delivery_id = DeliveryId::generate();
            debug!(queue = %self.queue, %delivery_id, "accepted message");
            let handler = self.handler.clone();
            let queue = self.queue.clone();
            let token = cancel.clone();
            let spawned = tasks.spawn(async move {
                let _permit = permit;
                handler.handle(&queue, delivery_id, message, &token).await
            });
            in_flight.insert(spawned.id(), InFlight { delivery_id, raw });
        }

        self.drain(tasks, in_flight).await;
        let counts = stats.snapshot();
        info!(queue = %self.queue, ?counts, "worker pool stopped");
        counts
    }

    async fn drain(&self, mut tasks: JoinSet<TaskReport>, mut in_flight: HashMap<Id, InFlight>) {
        if tasks.is_empty() {
            return;
        }
        info!(
            queue = %self.queue,
            in_flight = tasks.len(),
            grace = ?self.config.shutdown_grace,
            "waiting for in-flight messages"
        );

        let deadline = tokio::time::sleep(self.config.shutdown_grace);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                joined = tasks.join_next_with_id() => match joined {
                    Some(joined) => self.finish(&mut in_flight, joined),
                    None => return,
                },
                _ = &mut deadline => break,
            }
        }

        warn!(queue = %self.queue, left = tasks.len(), "grace period over, aborting");
        tasks.abort_all();
        let mut aborted = 0;
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Err(err) if err.is_cancelled() => {
                    aborted += 1;
                    if let Some(lost) = in_flight.remove(&err.id()) {
                        self.hand_back(lost).await;
                    }
                }
                joined => self.finish(&mut in_flight, joined),
            }
        }
        self.handler.stats().aborted(aborted);
    }

    /// An aborted message may or may not have been processed. Pushing it back
    /// as pulled keeps delivery at-least-once.
    async fn hand_back(&self, lost: InFlight) {
        let InFlight { delivery_id, raw } = lost;
        error!(
            queue = %self.queue,
            %delivery_id,
            body = %truncate(&raw, MAX_LOGGED_BODY),
            "aborted in-flight message"
        );
        match self.source.push_raw(&self.queue, raw).await {
            Ok(()) => info!(queue = %self.queue, %delivery_id, "aborted message pushed back"),
            Err(err) => error!(
                queue = %self.queue,
                %delivery_id,
                error = %err,
                "could not push aborted message back"
            ),
        }
    }

    fn finish(
        &self,
        in_flight: &mut HashMap<Id, InFlight>,
        joined: Result<(Id, TaskReport), JoinError>,
    ) {
        match joined {
            Ok((id, report)) => {
                in_flight.remove(&id);
                debug!(
                    queue = %self.queue,
                    delivery_id = %report.delivery_id,
                    state = ?report.state,
                    attempts = report.attempts,
                    "message finished"
                );
            }
            Err(err) => {
                let lost = in_flight.remove(&err.id());
                if err.is_panic() {
                    error!(
                        queue = %self.queue,
                        delivery_id = ?lost.as_ref().map(|f| f.delivery_id),
                        body = %lost.as_ref().map_or("", |f| truncate(&f.raw, MAX_LOGGED_BODY)),
                        error = %err,
                        "handler panicked"
                    );
                }
            }
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
