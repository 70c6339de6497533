//! Impls - adapters behind the ports.
//!
//! - **InMemoryTransport**: process-local queues (tests)
//! - **RedisTransport**: Redis lists
//! - **HttpDownstream**: the processing API over reqwest
//! - **HttpMailer**: email delivery through an HTTP mail gateway
//! - **QueueDeadLetterSink** / **QueueNotifier**: queue-backed sinks
//! - **PgUserDirectory**: user lookup in Postgres

pub mod http_downstream;
pub mod http_mailer;
pub mod memory_transport;
pub mod pg_users;
pub mod queue_dead_letter;
pub mod queue_notifier;
pub mod redis_transport;

pub use self::http_downstream::{HttpDownstream, HttpDownstreamConfig};
pub use self::http_mailer::HttpMailer;
pub use self::memory_transport::InMemoryTransport;
pub use self::pg_users::PgUserDirectory;
pub use self::queue_dead_letter::{DEFAULT_DEAD_LETTER_QUEUE, QueueDeadLetterSink};
pub use self::queue_notifier::{DEFAULT_EMAIL_QUEUE, QueueNotifier};
pub use self::redis_transport::RedisTransport;
