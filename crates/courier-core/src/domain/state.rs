//! Per-task retry state machine.

use serde::{Deserialize, Serialize};

/// Where a pulled task is in its retry loop.
///
/// State transitions:
/// - Pending -> Dispatching -> Succeeded
/// - Pending -> Dispatching -> AwaitingRetry -> Dispatching (until the ceiling)
/// - Pending -> Dispatching -> DeadLettered (fatal failure or ceiling reached)
/// - AwaitingRetry -> Requeued (shutdown requested before the next attempt)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Pulled and decoded, nothing sent yet.
    Pending,

    /// One downstream call in flight.
    Dispatching,

    /// Sleeping through backoff before the next attempt.
    AwaitingRetry,

    Succeeded,

    /// Handed to the dead-letter sink.
    DeadLettered,

    /// Pushed back onto its source queue because the consumer is stopping.
    Requeued,
}

impl TaskState {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Succeeded | TaskState::DeadLettered | TaskState::Requeued
        )
    }

    /// Move to `next`. Illegal transitions are caught in debug builds.
    pub fn advance(&mut self, next: TaskState) {
        debug_assert!(
            self.can_transition_to(next),
            "illegal task transition {self:?} -> {next:?}"
        );
        *self = next;
    }

    /// Can the retry loop move from `self` to `next`?
    pub fn can_transition_to(self, next: TaskState) -> bool {
        use TaskState::*;
        matches!(
            (self, next),
            (Pending, Dispatching)
                | (Dispatching, Succeeded)
                | (Dispatching, AwaitingRetry)
                | (Dispatching, DeadLettered)
                | (AwaitingRetry, Dispatching)
                | (AwaitingRetry, Requeued)
        )
    }
}
