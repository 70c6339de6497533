//! Domain model (tasks, envelopes, emails, outcomes, retry decisions, ...).

pub mod decision;
pub mod email;
pub mod envelope;
pub mod ids;
pub mod outcome;
pub mod reply;
pub mod state;
pub mod task;

pub use decision::{Decider, Decision, DefaultDecider};
pub use email::EmailMessage;
pub use envelope::Envelope;
pub use ids::DeliveryId;
pub use outcome::RetryOutcome;
pub use reply::{AgentReply, DownstreamFailure, ProcessedMemory, ReplyKind};
pub use state::TaskState;
pub use task::{Task, TaskKind};
