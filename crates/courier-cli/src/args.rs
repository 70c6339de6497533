use std::time::Duration;

use clap::{Parser, ValueEnum};
use courier_core::ConsumerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Background consumer: queue -> processing API -> notification or dead letter.
#[derive(Debug, Parser)]
#[command(name = "courier", version, about)]
pub struct Args {
    /// Redis address; a bare `host:port` is accepted.
    #[arg(long, env = "REDIS_ADDR", default_value = "redis://localhost:6379")]
    pub redis_url: String,

    /// Base URL of the processing API.
    #[arg(long, env = "FAST_API_SERVER")]
    pub processor_url: String,

    /// Postgres URL used to look up task owners for notifications.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Input queues, highest priority first.
    #[arg(
        long,
        env = "COURIER_QUEUES",
        value_delimiter = ',',
        default_values_t = ConsumerConfig::default().queues
    )]
    pub queues: Vec<String>,

    #[arg(long, env = "COURIER_DEAD_LETTER_QUEUE", default_value = "failed:queue")]
    pub dead_letter_queue: String,

    #[arg(long, env = "COURIER_EMAIL_QUEUE", default_value = "email:queue")]
    pub email_queue: String,

    #[arg(long, env = "COURIER_EMAIL_SENDER", default_value = "info@mindkeeperai.com")]
    pub email_sender: String,

    /// HTTP mail gateway the email relay delivers to. Without it the email
    /// queue is left to an external mailer.
    #[arg(long, env = "COURIER_MAILER_URL")]
    pub mailer_url: Option<String>,

    /// Per-request timeout of the mail gateway call, in seconds.
    #[arg(long, default_value_t = 30.0)]
    pub mailer_timeout: f64,

    /// Concurrent tasks per queue.
    #[arg(long, env = "COURIER_WORKERS", default_value_t = 4)]
    pub workers: usize,

    /// Retries after the first attempt.
    #[arg(long, env = "COURIER_MAX_RETRIES", default_value_t = 3)]
    pub max_retries: u32,

    /// Delay before the first retry, in seconds.
    #[arg(long, default_value_t = 1.0)]
    pub base_delay: f64,

    /// Cap on any single backoff delay, in seconds.
    #[arg(long, default_value_t = 60.0)]
    pub max_delay: f64,

    /// Random extra delay as a fraction of the computed one (0 disables).
    #[arg(long, default_value_t = 0.1)]
    pub jitter: f64,

    /// Per-request timeout of the processing API call, in seconds.
    #[arg(long, env = "COURIER_REQUEST_TIMEOUT", default_value_t = 120.0)]
    pub request_timeout: f64,

    #[arg(long, default_value_t = 10.0)]
    pub connect_timeout: f64,

    /// Header carrying the task credential.
    #[arg(long, default_value = "x-api-key")]
    pub credential_header: String,

    /// Longest single blocking pop, in seconds.
    #[arg(long, default_value_t = 1.0)]
    pub poll_interval: f64,

    /// Time in-flight tasks get to finish after a shutdown signal, in seconds.
    #[arg(long, env = "COURIER_SHUTDOWN_GRACE", default_value_t = 10.0)]
    pub shutdown_grace: f64,

    #[arg(long, env = "COURIER_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Print the effective configuration as JSON and exit.
    #[arg(long)]
    pub print_config: bool,
}

impl Args {
    pub fn mailer_timeout(&self) -> anyhow::Result<Duration> {
        secs("mailer-timeout", self.mailer_timeout)
    }

    pub fn redis_url(&self) -> String {
        if self.redis_url.contains("://") {
            self.redis_url.clone()
        } else {
            format!("redis://{}", self.redis_url)
        }
    }

    pub fn consumer_config(&self) -> anyhow::Result<ConsumerConfig> {
        let mut config = ConsumerConfig {
            queues: self.queues.clone(),
            dead_letter_queue: self.dead_letter_queue.clone(),
            email_queue: self.email_queue.clone(),
            email_sender: self.email_sender.clone(),
            poll_interval: secs("poll-interval", self.poll_interval)?,
            max_retries: self.max_retries,
            ..ConsumerConfig::default()
        };

        config.retry.base_delay = secs("base-delay", self.base_delay)?;
        config.retry.max_delay = secs("max-delay", self.max_delay)?;
        config.retry.jitter = self.jitter;

        config.pool.workers = self.workers;
        config.pool.shutdown_grace = secs("shutdown-grace", self.shutdown_grace)?;

        config.downstream.base_url = self.processor_url.clone();
        config.downstream.credential_header = self.credential_header.clone();
        config.downstream.request_timeout = secs("request-timeout", self.request_timeout)?;
        config.downstream.connect_timeout = secs("connect-timeout", self.connect_timeout)?;

        Ok(config)
    }
}

fn secs(flag: &str, value: f64) -> anyhow::Result<Duration> {
    Duration::try_from_secs_f64(value)
        .map_err(|e| anyhow::anyhow!("--{flag} must be a non-negative number of seconds: {e}"))
}
