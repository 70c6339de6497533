//! Decision model: what the retry loop does after an attempt.
//!
//! This module defines the Decision type (what to do next) and the Decider trait
//! (how to determine the next action from the task and the attempt's outcome).

use std::time::Duration;

use super::{RetryOutcome, Task};
use crate::queue::RetryPolicy;

/// The next action to take for a task.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// The task is done; nothing more to send.
    Complete,

    /// Dispatch again after `delay`.
    Retry { delay: Duration, reason: String },

    /// Give up and hand the envelope to the dead-letter sink.
    DeadLetter { reason: String },
}

/// Decides the next action from the current task and the latest outcome.
///
/// Deciders are pure: they never touch the task or perform I/O. Executing the
/// decision (sleeping, recording to the sink) is the runner's job.
pub trait Decider: Send + Sync {
    fn decide(&self, task: &Task, outcome: &RetryOutcome) -> Decision;
}

/// Ceiling-based retry with exponential backoff.
///
/// - Success completes the task.
/// - Fatal failures are dead-lettered whatever the attempt count.
/// - Retryable failures are retried while `task.attempt <= max_retries`,
///   i.e. `max_retries + 1` attempts in total.
#[derive(Debug, Clone)]
pub struct DefaultDecider {
    retry_policy: RetryPolicy,
    max_retries: u32,
}

impl DefaultDecider {
    pub fn new(retry_policy: RetryPolicy, max_retries: u32) -> Self {
        Self {
            retry_policy,
            max_retries,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

impl Decider for DefaultDecider {
    fn decide(&self, task: &Task, outcome: &RetryOutcome) -> Decision {
        match outcome {
            RetryOutcome::Success(_) => Decision::Complete,
            RetryOutcome::FatalFailure(err) => Decision::DeadLetter {
                reason: format!("fatal failure on attempt {}: {err}", task.attempt),
            },
            RetryOutcome::RetryableFailure(err) if task.attempt > self.max_retries => {
                Decision::DeadLetter {
                    reason: format!(
                        "retries exhausted after {} attempts (max_retries={}): {err}",
                        task.attempt, self.max_retries
                    ),
                }
            }
            RetryOutcome::RetryableFailure(err) => {
                // attempt is already >= 1 here: the failed dispatch counted itself.
                let retries_done = task.attempt.saturating_sub(1);
                let delay = self.retry_policy.next_delay(retries_done);
                Decision::Retry {
                    delay,
                    reason: format!(
                        "retry {}/{} after {:?}: {err}",
                        retries_done + 1,
                        self.max_retries,
                        delay
                    ),
                }
            }
        }
    }
}
