//! InMemoryTransport - process-local queues for tests and the demo mode.
//!
//! Same FIFO semantics as the Redis transport (`LPUSH` + `BRPOP`), minus the
//! durability.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use crate::error::QueueError;
use crate::ports::QueueTransport;

#[derive(Default)]
struct Queues {
    by_name: HashMap<String, VecDeque<String>>,
    closed: bool,
}

/// Named in-memory queues behind one lock.
///
/// Waiting poppers are woken with `notify_waiters` on every push and re-check
/// their own queue, so a push to one queue never steals a wakeup meant for
/// another.
#[derive(Default)]
pub struct InMemoryTransport {
    queues: Mutex<Queues>,
    notify: Notify,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything currently waiting on `queue`, oldest first.
    pub async fn snapshot(&self, queue: &str) -> Vec<String> {
        let queues = self.queues.lock().await;
        queues
            .by_name
            .get(queue)
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn len(&self, queue: &str) -> usize {
        let queues = self.queues.lock().await;
        queues.by_name.get(queue).map_or(0, VecDeque::len)
    }

    pub async fn is_empty(&self, queue: &str) -> bool {
        self.len(queue).await == 0
    }

    /// Fail every subsequent push/pop with [`QueueError::Closed`].
    pub async fn close(&self) {
        self.queues.lock().await.closed = true;
        self.notify.notify_waiters();
    }
}

#[async_trait]
impl QueueTransport for InMemoryTransport {
    async fn push(&self, queue: &str, body: String) -> Result<(), QueueError> {
        {
            let mut queues = self.queues.lock().await;
            if queues.closed {
                return Err(QueueError::Closed);
            }
            queues
                .by_name
                .entry(queue.to_string())
                .or_default()
                .push_back(body);
        }
        self.notify.notify_waiters();
        Ok(())
    }

    async fn pop(&self, queue: &str, timeout: Duration) -> Result<Option<String>, QueueError> {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            {
                let mut queues = self.queues.lock().await;
                if queues.closed {
                    return Err(QueueError::Closed);
                }
                if let Some(body) = queues.by_name.get_mut(queue).and_then(VecDeque::pop_front) {
                    return Ok(Some(body));
                }
                // Register interest while still holding the lock so a push
                // that lands right after we release it still wakes us.
                notified.as_mut().enable();
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = tokio::time::sleep_until(deadline) => return Ok(None),
            }
        }
    }
}
