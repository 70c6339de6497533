use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

/// Point-in-time view of one pool's counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolCounts {
    pub pulled: usize,
    pub running: usize,
    pub succeeded: usize,
    pub retries: usize,
    pub dead_lettered: usize,
    pub requeued: usize,
    pub dropped: usize,
    pub aborted: usize,
}

impl PoolCounts {
    pub fn merge(&mut self, other: &PoolCounts) {
        self.pulled += other.pulled;
        self.running += other.running;
        self.succeeded += other.succeeded;
        self.retries += other.retries;
        self.dead_lettered += other.dead_lettered;
        self.requeued += other.requeued;
        self.dropped += other.dropped;
        self.aborted += other.aborted;
    }
}

/// Process-level health as seen by the pools.
///
/// Only transport and sink outages count. Individual task failures never
/// degrade health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Health {
    Healthy,
    Degraded { transport: bool, sink: bool },
}

impl Health {
    pub fn is_healthy(self) -> bool {
        matches!(self, Health::Healthy)
    }
}

/// Lock-free counters and health flags, shared by a pool and its tasks.
#[derive(Debug, Default)]
pub struct PoolStats {
    pulled: AtomicUsize,
    running: AtomicUsize,
    succeeded: AtomicUsize,
    retries: AtomicUsize,
    dead_lettered: AtomicUsize,
    requeued: AtomicUsize,
    dropped: AtomicUsize,
    aborted: AtomicUsize,
    transport_down: AtomicBool,
    sink_down: AtomicBool,
}

impl PoolStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn pulled(&self) {
        self.pulled.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one running task until the guard is dropped.
    pub(crate) fn track_running(&self) -> RunningGuard<'_> {
        self.running.fetch_add(1, Ordering::Relaxed);
        RunningGuard(self)
    }

    pub(crate) fn succeeded(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn retried(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn dead_lettered(&self) {
        self.dead_lettered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn requeued(&self) {
        self.requeued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn aborted(&self, n: usize) {
        self.aborted.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn set_transport_down(&self, down: bool) {
        self.transport_down.store(down, Ordering::Relaxed);
    }

    pub(crate) fn set_sink_down(&self, down: bool) {
        self.sink_down.store(down, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PoolCounts {
        PoolCounts {
            pulled: self.pulled.load(Ordering::Relaxed),
            running: self.running.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
            requeued: self.requeued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            aborted: self.aborted.load(Ordering::Relaxed),
        }
    }

    pub fn health(&self) -> Health {
        let transport = self.transport_down.load(Ordering::Relaxed);
        let sink = self.sink_down.load(Ordering::Relaxed);
        if transport || sink {
            Health::Degraded { transport, sink }
        } else {
            Health::Healthy
        }
    }
}

pub(crate) struct RunningGuard<'a>(&'a PoolStats);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.running.fetch_sub(1, Ordering::Relaxed);
    }
}
