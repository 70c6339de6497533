//! RedisTransport - queues as Redis lists (`LPUSH` to enqueue, `BRPOP` to take).

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tracing::debug;

use crate::error::QueueError;
use crate::ports::QueueTransport;

/// One managed Redis connection.
///
/// `BRPOP` parks the whole connection until it returns, so every pull loop
/// needs a transport of its own. Pushes (dead letters, requeues,
/// notifications) can share one.
#[derive(Clone)]
pub struct RedisTransport {
    conn: ConnectionManager,
}

impl RedisTransport {
    pub async fn connect(url: &str) -> Result<Self, QueueError> {
        let client = redis::Client::open(url).map_err(|e| QueueError::Connection(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| QueueError::Connection(e.to_string()))?;
        debug!(url, "connected to redis");
        Ok(Self { conn })
    }
}

/// `BRPOP` takes whole seconds here; zero would mean "block forever".
fn blocking_secs(timeout: Duration) -> u64 {
    let secs = timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0);
    secs.max(1)
}

fn command_error(err: redis::RedisError) -> QueueError {
    if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
        QueueError::Connection(err.to_string())
    } else {
        QueueError::Command(err.to_string())
    }
}

#[async_trait]
impl QueueTransport for RedisTransport {
    async fn push(&self, queue: &str, body: String) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        redis::cmd("LPUSH")
            .arg(queue)
            .arg(body)
            .query_async::<_, i64>(&mut conn)
            .await
            .map_err(command_error)?;
        Ok(())
    }

    async fn pop(&self, queue: &str, timeout: Duration) -> Result<Option<String>, QueueError> {
        let mut conn = self.conn.clone();
        let popped: Option<(String, String)> = redis::cmd("BRPOP")
            .arg(queue)
            .arg(blocking_secs(timeout))
            .query_async(&mut conn)
            .await
            .map_err(command_error)?;
        Ok(popped.map(|(_key, body)| body))
    }
}
