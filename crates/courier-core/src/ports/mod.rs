//! Ports - the seams between the pipeline and the outside world.
//!
//! Each trait here is implemented once for production (see `impls`) and once
//! more by hand in tests. The pipeline only ever holds `Arc<dyn Port>`.

pub mod dead_letter;
pub mod downstream;
pub mod mailer;
pub mod notifier;
pub mod transport;
pub mod user_directory;

pub use self::dead_letter::DeadLetterSink;
pub use self::downstream::{DownstreamClient, DownstreamResponse};
pub use self::mailer::Mailer;
pub use self::notifier::Notifier;
pub use self::transport::QueueTransport;
pub use self::user_directory::{User, UserDirectory};
