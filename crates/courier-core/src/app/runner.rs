//! TaskRunner - the per-task retry loop.
//!
//! ```text
//! Pending -> Dispatching -> Succeeded
//!                        -> AwaitingRetry -> Dispatching ...
//!                                         -> Requeued      (shutdown)
//!                        -> DeadLettered
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use super::dispatcher::Dispatcher;
use super::reporter::OutcomeReporter;
use super::worker_pool::MessageHandler;
use crate::domain::{Decider, Decision, DeliveryId, Envelope, TaskState};
use crate::error::DecodeError;
use crate::observability::PoolStats;
use crate::ports::DeadLetterSink;
use crate::queue::QueueSource;

/// How one delivery ended.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskReport {
    pub delivery_id: DeliveryId,
    pub state: TaskState,
    /// `task.attempt` when the loop ended.
    pub attempts: u32,
    /// Backoff delays chosen, in order.
    pub delays: Vec<Duration>,
}

/// Everything a task needs to run to completion. Cheap to share: one per
/// pool, borrowed by every task the pool spawns.
pub struct TaskRunner {
    dispatcher: Arc<Dispatcher>,
    decider: Arc<dyn Decider>,
    sink: Arc<dyn DeadLetterSink>,
    reporter: Arc<OutcomeReporter>,
    requeue: QueueSource,
    stats: Arc<PoolStats>,
}

impl TaskRunner {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        decider: Arc<dyn Decider>,
        sink: Arc<dyn DeadLetterSink>,
        reporter: Arc<OutcomeReporter>,
        requeue: QueueSource,
        stats: Arc<PoolStats>,
    ) -> Self {
        Self {
            dispatcher,
            decider,
            sink,
            reporter,
            requeue,
            stats,
        }
    }

    pub fn stats(&self) -> &Arc<PoolStats> {
        &self.stats
    }

    /// Drive `envelope` until it succeeds, is dead-lettered, or is handed back
    /// to `queue` because `cancel` fired before its next attempt.
    ///
    /// An attempt already in flight is never interrupted here; bounding the
    /// whole run is up to the caller.
    pub async fn run(
        &self,
        queue: &str,
        delivery_id: DeliveryId,
        envelope: Envelope,
        cancel: &CancellationToken,
    ) -> TaskReport {
        let span = info_span!(
            "task",
            queue,
            delivery_id = %delivery_id,
            kind = %envelope.task.kind,
        );
        self.run_loop(queue, delivery_id, envelope, cancel)
            .instrument(span)
            .await
    }

    async fn run_loop(
        &self,
        queue: &str,
        delivery_id: DeliveryId,
        mut envelope: Envelope,
        cancel: &CancellationToken,
    ) -> TaskReport {
        let _running = self.stats.track_running();
        let mut state = TaskState::Pending;
        let mut delays = Vec::new();

        loop {
            state.advance(TaskState::Dispatching);
            let outcome = self
                .dispatcher
                .dispatch(&mut envelope.task, &envelope.credential)
                .await;
            let attempt = envelope.task.attempt;

            match self.decider.decide(&envelope.task, &outcome) {
                Decision::Complete => {
                    state.advance(TaskState::Succeeded);
                    self.stats.succeeded();
                    info!(attempt, "task succeeded");
                    self.reporter.report(&outcome).await;
                    break;
                }
                Decision::DeadLetter { reason } => {
                    state.advance(TaskState::DeadLettered);
                    warn!(attempt, status = outcome.status_code(), %reason, "giving up on task");
                    self.reporter.report(&outcome).await;
                    self.dead_letter(&envelope).await;
                    break;
                }
                Decision::Retry { delay, reason } => {
                    state.advance(TaskState::AwaitingRetry);
                    self.stats.retried();
                    delays.push(delay);
                    info!(attempt, status = outcome.status_code(), %reason, "retry scheduled");

                    let slept = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => false,
                        _ = tokio::time::sleep(delay) => true,
                    };
                    if !slept {
                        state = self.hand_back(queue, &envelope).await;
                        break;
                    }
                    debug!(attempt, "backoff elapsed");
                }
            }
        }

        TaskReport {
            delivery_id,
            state,
            attempts: envelope.task.attempt,
            delays,
        }
    }

    async fn dead_letter(&self, envelope: &Envelope) {
        self.stats.dead_lettered();
        match self.sink.record(envelope).await {
            Ok(()) => self.stats.set_sink_down(false),
            Err(err) => {
                // Nothing left to fall back on: the task is lost to the pipeline.
                self.stats.set_sink_down(true);
                error!(error = %err, attempt = envelope.task.attempt, "dead-letter write failed");
            }
        }
    }

    /// Shutdown arrived between attempts: put the task back where it came
    /// from, keeping its attempt count. If even that fails, dead-letter it.
    async fn hand_back(&self, queue: &str, envelope: &Envelope) -> TaskState {
        match self.requeue.requeue(queue, envelope).await {
            Ok(()) => {
                self.stats.requeued();
                info!(attempt = envelope.task.attempt, "shutting down, task requeued");
                TaskState::Requeued
            }
            Err(err) => {
                self.stats.set_transport_down(true);
                error!(error = %err, "requeue failed, dead-lettering instead");
                self.dead_letter(envelope).await;
                TaskState::DeadLettered
            }
        }
    }
}

#[async_trait]
impl MessageHandler for TaskRunner {
    type Message = Envelope;

    fn decode(&self, raw: &str) -> Result<Envelope, DecodeError> {
        Envelope::decode(raw)
    }

    async fn handle(
        &self,
        queue: &str,
        delivery_id: DeliveryId,
        envelope: Envelope,
        cancel: &CancellationToken,
    ) -> TaskReport {
        self.run(queue, delivery_id, envelope, cancel).await
    }

    fn stats(&self) -> &Arc<PoolStats> {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Task;
    use crate::test_support::{Harness, Reply, Sent};
    use tokio::time::Instant;

    fn web_envelope() -> Envelope {
        Envelope::new(Task::new("web", serde_json::json!({"url": "http://x"})), "key")
    }

    #[tokio::test(start_paused = true)]
    async fn four_server_errors_end_in_dead_letter() {
        let h = Harness::new([], Some(Reply::status(500)));
        let start = Instant::now();

        let report = h
            .runner
            .run("q", DeliveryId::generate(), web_envelope(), &h.cancel)
            .await;

        assert_eq!(report.state, TaskState::DeadLettered);
        assert_eq!(report.attempts, 4);
        assert_eq!(
            report.delays,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4)
            ]
        );
        assert!(start.elapsed() >= Duration::from_secs(7));
        assert_eq!(h.downstream.calls().len(), 4);

        let dead = h.sink.entries();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].task.attempt, 4);
        assert_eq!(dead[0].credential, "key");
        assert_eq!(h.runner.stats().snapshot().dead_lettered, 1);
        assert_eq!(h.runner.stats().snapshot().retries, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn unprocessable_is_dead_lettered_without_sleeping() {
        let h = Harness::new([Reply::status(422)], None);
        let start = Instant::now();

        let report = h
            .runner
            .run("q", DeliveryId::generate(), web_envelope(), &h.cancel)
            .await;

        assert_eq!(report.state, TaskState::DeadLettered);
        assert_eq!(report.attempts, 1);
        assert!(report.delays.is_empty());
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(h.sink.entries()[0].task.attempt, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn success_notifies_once_and_skips_sink() {
        let h = Harness::new([Reply::processed("u-1")], None);

        let report = h
            .runner
            .run("q", DeliveryId::generate(), web_envelope(), &h.cancel)
            .await;

        assert_eq!(report.state, TaskState::Succeeded);
        assert_eq!(report.attempts, 1);
        assert!(h.sink.entries().is_empty());
        assert_eq!(
            h.notifier.sent(),
            vec![Sent::Added {
                user_id: "u-1".into(),
                memory_id: "m-1".into()
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failures() {
        let h = Harness::new(
            [
                Reply::Transport("reset".into()),
                Reply::status(503),
                Reply::processed("u-1"),
            ],
            None,
        );

        let report = h
            .runner
            .run("q", DeliveryId::generate(), web_envelope(), &h.cancel)
            .await;

        assert_eq!(report.state, TaskState::Succeeded);
        assert_eq!(report.attempts, 3);
        assert_eq!(report.delays.len(), 2);
        assert!(h.sink.entries().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_deliveries_each_dispatch_independently() {
        let h = Harness::new([], Some(Reply::processed("u-1")));

        for _ in 0..2 {
            let report = h
                .runner
                .run("q", DeliveryId::generate(), web_envelope(), &h.cancel)
                .await;
            assert_eq!(report.state, TaskState::Succeeded);
        }

        assert_eq!(h.downstream.calls().len(), 2);
        assert_eq!(h.notifier.sent().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn replayed_dead_letter_gets_one_more_call() {
        let h = Harness::new([], Some(Reply::status(500)));
        let mut envelope = web_envelope();
        envelope.task.attempt = 4;

        let report = h
            .runner
            .run("q", DeliveryId::generate(), envelope, &h.cancel)
            .await;

        assert_eq!(report.state, TaskState::DeadLettered);
        assert_eq!(report.attempts, 5);
        assert_eq!(h.downstream.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_backoff_requeues_with_attempt() {
        let h = Harness::new([], Some(Reply::status(500)));
        let runner = h.runner.clone();
        let cancel = h.cancel.clone();

        let handle = tokio::spawn(async move {
            runner
                .run("q", DeliveryId::generate(), web_envelope(), &cancel)
                .await
        });
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        h.cancel.cancel();

        let report = handle.await.unwrap();
        assert_eq!(report.state, TaskState::Requeued);
        assert_eq!(report.attempts, 2);
        assert!(h.sink.entries().is_empty());

        let queued = h.transport.snapshot("q").await;
        assert_eq!(queued.len(), 1);
        assert_eq!(Envelope::decode(&queued[0]).unwrap().task.attempt, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_requeue_falls_back_to_dead_letter() {
        let h = Harness::new([], Some(Reply::status(500)));
        h.transport.close().await;
        h.cancel.cancel();

        let report = h
            .runner
            .run("q", DeliveryId::generate(), web_envelope(), &h.cancel)
            .await;

        assert_eq!(report.state, TaskState::DeadLettered);
        assert_eq!(h.sink.entries().len(), 1);
        assert!(!h.runner.stats().health().is_healthy());
    }

    #[tokio::test(start_paused = true)]
    async fn sink_failure_marks_health_and_ends_task() {
        let h = Harness::with_failing_sink([Reply::status(422)]);

        let report = h
            .runner
            .run("q", DeliveryId::generate(), web_envelope(), &h.cancel)
            .await;

        assert_eq!(report.state, TaskState::DeadLettered);
        assert_eq!(h.downstream.calls().len(), 1);
        assert!(!h.runner.stats().health().is_healthy());
    }
}
