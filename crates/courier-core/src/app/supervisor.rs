//! ConsumerSupervisor - owns the worker pools and their shutdown.

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::builder::SupervisorBuilder;
use super::email_relay::EmailRelay;
use super::worker_pool::WorkerPool;
use crate::config::ConsumerConfig;
use crate::observability::{Health, PoolCounts, PoolStats};

/// Read-only view of a running supervisor, plus the means to stop it.
#[derive(Clone)]
pub struct SupervisorHandle {
    stats: Arc<[(String, Arc<PoolStats>)]>,
    cancel: CancellationToken,
}

impl SupervisorHandle {
    /// Degraded as soon as any pool sees a transport or sink outage.
    pub fn health(&self) -> Health {
        let (mut transport, mut sink) = (false, false);
        for (_, stats) in self.stats.iter() {
            if let Health::Degraded {
                transport: t,
                sink: s,
            } = stats.health()
            {
                transport |= t;
                sink |= s;
            }
        }
        if transport || sink {
            Health::Degraded { transport, sink }
        } else {
            Health::Healthy
        }
    }

    pub fn counts(&self) -> PoolCounts {
        let mut total = PoolCounts::default();
        for (_, stats) in self.stats.iter() {
            total.merge(&stats.snapshot());
        }
        total
    }

    pub fn counts_by_queue(&self) -> Vec<(String, PoolCounts)> {
        self.stats
            .iter()
            .map(|(queue, stats)| (queue.clone(), stats.snapshot()))
            .collect()
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// One worker pool per input queue, started in priority order and stopped
/// together, plus the optional email relay pool.
pub struct ConsumerSupervisor {
    pools: Vec<WorkerPool>,
    relay: Option<WorkerPool<EmailRelay>>,
    handle: SupervisorHandle,
}

impl ConsumerSupervisor {
    pub fn builder(config: ConsumerConfig) -> SupervisorBuilder {
        SupervisorBuilder::new(config)
    }

    pub(crate) fn new(pools: Vec<WorkerPool>, relay: Option<WorkerPool<EmailRelay>>) -> Self {
        let stats = pools
            .iter()
            .map(|pool| (pool.queue().to_string(), pool.stats()))
            .chain(relay.iter().map(|pool| (pool.queue().to_string(), pool.stats())))
            .collect();
        Self {
            pools,
            relay,
            handle: SupervisorHandle {
                stats,
                cancel: CancellationToken::new(),
            },
        }
    }

    /// Every queue a pool pulls from, the email queue last.
    pub fn queues(&self) -> Vec<String> {
        self.handle.stats.iter().map(|(queue, _)| queue.clone()).collect()
    }

    pub fn handle(&self) -> SupervisorHandle {
        self.handle.clone()
    }

    pub fn health(&self) -> Health {
        self.handle.health()
    }

    /// Run every pool until `signal` resolves or the handle requests
    /// shutdown, then wait for all pools to drain.
    pub async fn run_until<F>(self, signal: F) -> PoolCounts
    where
        F: Future<Output = ()> + Send,
    {
        let cancel = self.handle.cancel.clone();
        let mut pools = JoinSet::new();
        for pool in self.pools {
            info!(queue = %pool.queue(), "starting consumer");
            pools.spawn(pool.run(cancel.clone()));
        }
        match self.relay {
            Some(relay) => {
                info!(queue = %relay.queue(), "starting email relay");
                pools.spawn(relay.run(cancel.clone()));
            }
            None => info!("no mailer configured, email queue left to an external mailer"),
        }

        tokio::select! {
            _ = signal => info!("shutdown signal received"),
            _ = cancel.cancelled() => info!("shutdown requested"),
        }
        cancel.cancel();

        let mut total = PoolCounts::default();
        while let Some(joined) = pools.join_next().await {
            match joined {
                Ok(counts) => total.merge(&counts),
                Err(err) => error!(error = %err, "worker pool failed"),
            }
        }
        info!(counts = ?total, "consumer stopped");
        total
    }

    /// Run until [`SupervisorHandle::shutdown`] is called.
    pub async fn run(self) -> PoolCounts {
        self.run_until(std::future::pending()).await
    }
}
