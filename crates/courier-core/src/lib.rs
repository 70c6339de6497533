//! courier-core
//!
//! Core of the courier background consumer: pulls tasks off durable queues,
//! sends each to the processing API, retries transient failures with
//! exponential backoff and dead-letters what cannot be processed. An optional
//! email relay drains the notification queue into a mailer.
//!
//! # Modules
//! - **domain**: tasks, envelopes, outcomes, retry decisions, task state
//! - **ports**: seams to the outside (QueueTransport, DownstreamClient, DeadLetterSink, ...)
//! - **queue**: blocking queue source and backoff policy
//! - **app**: dispatcher, retry loop, worker pools, email relay, supervisor
//! - **impls**: Redis, HTTP, Postgres and in-memory adapters
//! - **config** / **observability**: settings, counters and health

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod queue;

#[cfg(test)]
pub(crate) mod test_support;

pub use app::{ConsumerSupervisor, SupervisorHandle};
pub use config::ConsumerConfig;
