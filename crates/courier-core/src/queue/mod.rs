//! Queue module: the pull side of the pipeline and its retry timing.

mod retry;
mod source;

pub use retry::RetryPolicy;
pub use source::QueueSource;
