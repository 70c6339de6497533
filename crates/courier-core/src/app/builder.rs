//! SupervisorBuilder - wiring of the consumer from its ports.
//!
//! Validation is fail-fast: `build()` refuses to produce a supervisor if the
//! configuration is invalid or if any queue lacks a pull transport, instead of
//! discovering it at the first pull.

use std::collections::HashMap;
use std::sync::Arc;

use super::dispatcher::Dispatcher;
use super::email_relay::EmailRelay;
use super::reporter::OutcomeReporter;
use super::runner::TaskRunner;
use super::supervisor::ConsumerSupervisor;
use super::worker_pool::WorkerPool;
use crate::config::ConsumerConfig;
use crate::domain::{Decider, DefaultDecider};
use crate::error::ConfigError;
use crate::observability::PoolStats;
use crate::ports::{
    DeadLetterSink, DownstreamClient, Mailer, Notifier, QueueTransport, UserDirectory,
};
use crate::queue::QueueSource;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("missing component: {0}")]
    Missing(&'static str),

    #[error("no pull transport for queues: {0:?}")]
    MissingPullTransports(Vec<String>),
}

/// Collects the ports a [`ConsumerSupervisor`] needs.
///
/// ```ignore
/// let supervisor = ConsumerSupervisor::builder(config)
///     .downstream(http)
///     .dead_letter_sink(sink)
///     .reporter(users, notifier)
///     .requeue_transport(shared)
///     .pull_transport("high:priority:queue", high)
///     .pull_transport("low:priority:queue", low)
///     .email_relay(mailer, email)
///     .build()?;
/// ```
pub struct SupervisorBuilder {
    config: ConsumerConfig,
    downstream: Option<Arc<dyn DownstreamClient>>,
    decider: Option<Arc<dyn Decider>>,
    sink: Option<Arc<dyn DeadLetterSink>>,
    reporter: Option<Arc<OutcomeReporter>>,
    requeue: Option<Arc<dyn QueueTransport>>,
    pull: HashMap<String, Arc<dyn QueueTransport>>,
    relay: Option<(Arc<dyn Mailer>, Arc<dyn QueueTransport>)>,
}

impl SupervisorBuilder {
    pub fn new(config: ConsumerConfig) -> Self {
        Self {
            config,
            downstream: None,
            decider: None,
            sink: None,
            reporter: None,
            requeue: None,
            pull: HashMap::new(),
            relay: None,
        }
    }

    pub fn downstream(mut self, client: Arc<dyn DownstreamClient>) -> Self {
        self.downstream = Some(client);
        self
    }

    /// Replace the default ceiling-based decider built from the config.
    pub fn decider(mut self, decider: Arc<dyn Decider>) -> Self {
        self.decider = Some(decider);
        self
    }

    pub fn dead_letter_sink(mut self, sink: Arc<dyn DeadLetterSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn reporter(mut self, users: Arc<dyn UserDirectory>, notifier: Arc<dyn Notifier>) -> Self {
        self.reporter = Some(Arc::new(OutcomeReporter::new(users, notifier)));
        self
    }

    /// Transport used to push tasks back onto their queue at shutdown.
    pub fn requeue_transport(mut self, transport: Arc<dyn QueueTransport>) -> Self {
        self.requeue = Some(transport);
        self
    }

    /// Transport the pool for `queue` pulls from. Blocking pops may tie up a
    /// connection, so each queue can get its own.
    pub fn pull_transport(
        mut self,
        queue: impl Into<String>,
        transport: Arc<dyn QueueTransport>,
    ) -> Self {
        self.pull.insert(queue.into(), transport);
        self
    }

    /// Also drain the email queue into `mailer`, pulling through `transport`.
    /// Without this the email queue is left to an external mailer.
    pub fn email_relay(
        mut self,
        mailer: Arc<dyn Mailer>,
        transport: Arc<dyn QueueTransport>,
    ) -> Self {
        self.relay = Some((mailer, transport));
        self
    }

    pub fn build(mut self) -> Result<ConsumerSupervisor, BuildError> {
        self.config.validate()?;

        let missing: Vec<String> = self
            .config
            .queues
            .iter()
            .filter(|queue| !self.pull.contains_key(*queue))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(BuildError::MissingPullTransports(missing));
        }

        let downstream = self.downstream.ok_or(BuildError::Missing("downstream"))?;
        let sink = self.sink.ok_or(BuildError::Missing("dead_letter_sink"))?;
        let reporter = self.reporter.ok_or(BuildError::Missing("reporter"))?;
        let requeue = self.requeue.ok_or(BuildError::Missing("requeue_transport"))?;

        let config = self.config;
        let decider: Arc<dyn Decider> = match self.decider {
            Some(decider) => decider,
            None => Arc::new(DefaultDecider::new(config.retry.clone(), config.max_retries)),
        };
        let dispatcher = Arc::new(Dispatcher::new(downstream, config.dispatcher.clone()));
        let requeue = QueueSource::new(requeue, config.poll_interval);

        let mut pools = Vec::with_capacity(config.queues.len());
        for queue in &config.queues {
            let Some(transport) = self.pull.remove(queue) else {
                return Err(BuildError::MissingPullTransports(vec![queue.clone()]));
            };
            let runner = Arc::new(TaskRunner::new(
                dispatcher.clone(),
                decider.clone(),
                sink.clone(),
                reporter.clone(),
                requeue.clone(),
                Arc::new(PoolStats::new()),
            ));
            pools.push(WorkerPool::new(
                queue.clone(),
                QueueSource::new(transport, config.poll_interval),
                runner,
                config.pool.clone(),
            ));
        }

        let relay = self.relay.map(|(mailer, transport)| {
            let relay = EmailRelay::new(
                mailer,
                sink.clone(),
                requeue.clone(),
                config.retry.clone(),
                config.max_retries,
            );
            WorkerPool::new(
                config.email_queue.clone(),
                QueueSource::new(transport, config.poll_interval),
                Arc::new(relay),
                config.pool.clone(),
            )
        });

        Ok(ConsumerSupervisor::new(pools, relay))
    }
}
