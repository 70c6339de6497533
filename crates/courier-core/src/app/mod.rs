//! App - the consumer pipeline, assembled from the ports.
//!
//! # Components
//! - **Dispatcher**: one attempt of one task against the processing API
//! - **OutcomeReporter**: notification side path
//! - **TaskRunner**: per-task retry loop (dispatch, decide, back off, dead-letter)
//! - **WorkerPool**: bounded fan-out over one queue, generic over its `MessageHandler`
//! - **EmailRelay**: drains the email queue into a `Mailer` with retries
//! - **ConsumerSupervisor** / **SupervisorBuilder**: pools per queue, shutdown

pub mod builder;
pub mod dispatcher;
pub mod email_relay;
pub mod reporter;
pub mod runner;
pub mod supervisor;
pub mod worker_pool;

pub use self::builder::{BuildError, SupervisorBuilder};
pub use self::dispatcher::{Dispatcher, DispatcherConfig};
pub use self::email_relay::EmailRelay;
pub use self::reporter::OutcomeReporter;
pub use self::runner::{TaskReport, TaskRunner};
pub use self::supervisor::{ConsumerSupervisor, SupervisorHandle};
pub use self::worker_pool::{MessageHandler, PoolConfig, WorkerPool};
