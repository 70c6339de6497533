//! EmailRelay - drains the email queue into the mailer.
//!
//! A failed send is retried with the consumer's backoff policy, up to
//! `max_retries` times, before the email goes to the dead-letter sink. Runs
//! inside a regular [`WorkerPool`](super::WorkerPool), so slots, shutdown and
//! statistics work exactly as for tasks.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span, warn};

use super::runner::TaskReport;
use super::worker_pool::MessageHandler;
use crate::domain::{DeliveryId, EmailMessage, TaskState};
use crate::error::DecodeError;
use crate::observability::PoolStats;
use crate::ports::{DeadLetterSink, Mailer};
use crate::queue::{QueueSource, RetryPolicy};

pub struct EmailRelay {
    mailer: Arc<dyn Mailer>,
    sink: Arc<dyn DeadLetterSink>,
    requeue: QueueSource,
    policy: RetryPolicy,
    max_retries: u32,
    stats: Arc<PoolStats>,
}

impl EmailRelay {
    pub fn new(
        mailer: Arc<dyn Mailer>,
        sink: Arc<dyn DeadLetterSink>,
        requeue: QueueSource,
        policy: RetryPolicy,
        max_retries: u32,
    ) -> Self {
        Self {
            mailer,
            sink,
            requeue,
            policy,
            max_retries,
            stats: Arc::new(PoolStats::new()),
        }
    }

    async fn deliver(
        &self,
        queue: &str,
        delivery_id: DeliveryId,
        email: EmailMessage,
        cancel: &CancellationToken,
    ) -> TaskReport {
        let _running = self.stats.track_running();
        let mut state = TaskState::Pending;
        let mut delays = Vec::new();
        let mut sends = 0u32;

        loop {
            state.advance(TaskState::Dispatching);
            sends += 1;
            let err = match self.mailer.send(&email).await {
                Ok(()) => {
                    state.advance(TaskState::Succeeded);
                    self.stats.succeeded();
                    info!(sends, "email sent");
                    break;
                }
                Err(err) => err,
            };

            let retries_done = sends - 1;
            if retries_done >= self.max_retries {
                state.advance(TaskState::DeadLettered);
                warn!(sends, error = %err, "giving up on email");
                self.dead_letter(&email).await;
                break;
            }

            state.advance(TaskState::AwaitingRetry);
            let delay = self.policy.next_delay(retries_done);
            self.stats.retried();
            delays.push(delay);
            warn!(sends, error = %err, ?delay, "email send failed, retrying");

            let slept = tokio::select! {
                biased;
                _ = cancel.cancelled() => false,
                _ = tokio::time::sleep(delay) => true,
            };
            if !slept {
                state = self.hand_back(queue, &email).await;
                break;
            }
        }

        TaskReport {
            delivery_id,
            state,
            attempts: sends,
            delays,
        }
    }

    async fn dead_letter(&self, email: &EmailMessage) {
        self.stats.dead_lettered();
        match self.sink.record_email(email).await {
            Ok(()) => self.stats.set_sink_down(false),
            Err(err) => {
                self.stats.set_sink_down(true);
                error!(error = %err, "dead-letter write failed, email lost");
            }
        }
    }

    /// Shutdown arrived between sends. The retry count is not part of the
    /// wire format, so the email starts over when it is pulled again.
    async fn hand_back(&self, queue: &str, email: &EmailMessage) -> TaskState {
        let pushed = match email.encode() {
            Ok(body) => self.requeue.push_raw(queue, body).await.map_err(|e| e.to_string()),
            Err(err) => Err(err.to_string()),
        };
        match pushed {
            Ok(()) => {
                self.stats.requeued();
                info!("shutting down, email requeued");
                TaskState::Requeued
            }
            Err(err) => {
                self.stats.set_transport_down(true);
                error!(error = %err, "email requeue failed, dead-lettering instead");
                self.dead_letter(email).await;
                TaskState::DeadLettered
            }
        }
    }
}

#[async_trait]
impl MessageHandler for EmailRelay {
    type Message = EmailMessage;

    fn decode(&self, raw: &str) -> Result<EmailMessage, DecodeError> {
        EmailMessage::decode(raw)
    }

    async fn handle(
        &self,
        queue: &str,
        delivery_id: DeliveryId,
        email: EmailMessage,
        cancel: &CancellationToken,
    ) -> TaskReport {
        let span = info_span!("email", queue, delivery_id = %delivery_id, to = %email.to);
        self.deliver(queue, delivery_id, email, cancel)
            .instrument(span)
            .await
    }

    fn stats(&self) -> &Arc<PoolStats> {
        &self.stats
    }
}
