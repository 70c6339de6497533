//! Consumer configuration.
//!
//! Everything tunable lives in one serde struct with working defaults, so the
//! binary only overrides what the operator set and calls `validate()` once at
//! startup.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::app::{DispatcherConfig, PoolConfig};
use crate::error::ConfigError;
use crate::impls::{DEFAULT_DEAD_LETTER_QUEUE, DEFAULT_EMAIL_QUEUE, HttpDownstreamConfig};
use crate::queue::RetryPolicy;

pub const HIGH_PRIORITY_QUEUE: &str = "high:priority:queue";
pub const LOW_PRIORITY_QUEUE: &str = "low:priority:queue";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumerConfig {
    /// Input queues, highest priority first. One worker pool each.
    pub queues: Vec<String>,

    pub dead_letter_queue: String,

    pub email_queue: String,

    /// `from` address of notification emails.
    pub email_sender: String,

    /// Upper bound of a single blocking pop; also how quickly a pull loop
    /// notices shutdown.
    #[serde(with = "duration_secs")]
    pub poll_interval: Duration,

    /// Retries after the first attempt. 3 means four attempts in total.
    pub max_retries: u32,

    pub retry: RetryPolicy,

    pub pool: PoolConfig,

    pub dispatcher: DispatcherConfig,

    pub downstream: HttpDownstreamConfig,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            queues: vec![HIGH_PRIORITY_QUEUE.to_string(), LOW_PRIORITY_QUEUE.to_string()],
            dead_letter_queue: DEFAULT_DEAD_LETTER_QUEUE.to_string(),
            email_queue: DEFAULT_EMAIL_QUEUE.to_string(),
            email_sender: "info@mindkeeperai.com".to_string(),
            poll_interval: Duration::from_secs(1),
            max_retries: 3,
            retry: RetryPolicy::default(),
            pool: PoolConfig::default(),
            dispatcher: DispatcherConfig::default(),
            downstream: HttpDownstreamConfig::default(),
        }
    }
}

impl ConsumerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queues.is_empty() {
            return Err(ConfigError::NoQueues);
        }
        let mut seen = HashSet::new();
        for queue in &self.queues {
            if !seen.insert(queue.as_str()) {
                return Err(ConfigError::DuplicateQueue(queue.clone()));
            }
        }
        for output in [&self.dead_letter_queue, &self.email_queue] {
            if seen.contains(output.as_str()) {
                return Err(ConfigError::OutputIsInput(output.clone()));
            }
        }
        // The email relay pulls from the email queue and pushes failures to
        // the dead-letter queue.
        if self.dead_letter_queue == self.email_queue {
            return Err(ConfigError::SharedOutputQueue(self.email_queue.clone()));
        }

        if self.pool.workers == 0 {
            return Err(ConfigError::Zero { field: "workers" });
        }
        if self.pool.workers > Semaphore::MAX_PERMITS {
            return Err(ConfigError::TooManyWorkers {
                workers: self.pool.workers,
                max: Semaphore::MAX_PERMITS,
            });
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::Zero {
                field: "poll_interval",
            });
        }
        if self.downstream.request_timeout.is_zero() {
            return Err(ConfigError::Zero {
                field: "request_timeout",
            });
        }
        if self.retry.base_delay.is_zero() {
            return Err(ConfigError::Zero { field: "base_delay" });
        }
        if self.retry.max_delay.is_zero() {
            return Err(ConfigError::Zero { field: "max_delay" });
        }
        if self.retry.max_delay < self.retry.base_delay {
            return Err(ConfigError::MaxDelay {
                base: self.retry.base_delay,
                max: self.retry.max_delay,
            });
        }
        if !(0.0..=1.0).contains(&self.retry.jitter) {
            return Err(ConfigError::Jitter(self.retry.jitter));
        }

        let url = &self.downstream.base_url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::BaseUrl(url.clone()));
        }
        Ok(())
    }
}

/// `Duration` as (fractional) seconds in config files.
pub(crate) mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
