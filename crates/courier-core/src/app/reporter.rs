//! OutcomeReporter - the notification side path.
//!
//! Runs after a task reaches a final outcome. Nothing here can change what
//! happens to the task: lookup and notification errors are logged and
//! swallowed.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::{DownstreamFailure, ProcessedMemory, RetryOutcome};
use crate::error::{CollaboratorError, DispatchError};
use crate::ports::{Notifier, UserDirectory};

pub struct OutcomeReporter {
    users: Arc<dyn UserDirectory>,
    notifier: Arc<dyn Notifier>,
}

impl OutcomeReporter {
    pub fn new(users: Arc<dyn UserDirectory>, notifier: Arc<dyn Notifier>) -> Self {
        Self { users, notifier }
    }

    /// Notify the task owner when the outcome is something they should hear
    /// about: a processed memory, or a rejection naming a user.
    pub async fn report(&self, outcome: &RetryOutcome) {
        let result = match outcome {
            RetryOutcome::Success(memory) => self.memory_added(memory).await,
            RetryOutcome::FatalFailure(DispatchError::Rejected(failure)) => {
                self.memory_failed(failure).await
            }
            _ => return,
        };
        if let Err(err) = result {
            warn!(error = %err, "notification skipped");
        }
    }

    async fn memory_added(&self, memory: &ProcessedMemory) -> Result<(), CollaboratorError> {
        let user = self.users.find_user(&memory.user_id).await?;
        self.notifier.memory_added(memory, &user).await?;
        info!(user_id = %user.id, memory_id = %memory.memory_id, "memory added");
        Ok(())
    }

    async fn memory_failed(&self, failure: &DownstreamFailure) -> Result<(), CollaboratorError> {
        let Some(user_id) = failure.user_id.as_deref() else {
            debug!(error = %failure.message, "rejection without user, nobody to notify");
            return Ok(());
        };
        let user = self.users.find_user(user_id).await?;
        self.notifier.memory_failed(failure, &user).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{RecordingNotifier, Sent, StaticUsers};

    fn memory(user_id: &str) -> ProcessedMemory {
        ProcessedMemory {
            user_id: user_id.into(),
            memory_id: "m-1".into(),
            title: String::new(),
            extra: Default::default(),
        }
    }

    fn reporter(notifier: Arc<RecordingNotifier>) -> OutcomeReporter {
        OutcomeReporter::new(Arc::new(StaticUsers::with(&["u-1"])), notifier)
    }

    #[tokio::test]
    async fn success_notifies_owner() {
        let notifier = Arc::new(RecordingNotifier::default());
        reporter(notifier.clone())
            .report(&RetryOutcome::Success(memory("u-1")))
            .await;

        assert_eq!(
            notifier.sent(),
            vec![Sent::Added {
                user_id: "u-1".into(),
                memory_id: "m-1".into()
            }]
        );
    }

    #[tokio::test]
    async fn rejection_with_user_notifies_failure() {
        let notifier = Arc::new(RecordingNotifier::default());
        let outcome = RetryOutcome::FatalFailure(DispatchError::Rejected(DownstreamFailure {
            message: "boom".into(),
            user_id: Some("u-1".into()),
        }));
        reporter(notifier.clone()).report(&outcome).await;

        assert_eq!(
            notifier.sent(),
            vec![Sent::Failed {
                user_id: "u-1".into(),
                message: "boom".into()
            }]
        );
    }

    #[tokio::test]
    async fn other_outcomes_stay_quiet() {
        let notifier = Arc::new(RecordingNotifier::default());
        let reporter = reporter(notifier.clone());

        reporter
            .report(&RetryOutcome::RetryableFailure(DispatchError::UnexpectedStatus(500)))
            .await;
        reporter
            .report(&RetryOutcome::FatalFailure(DispatchError::Rejected(
                DownstreamFailure {
                    message: "anon".into(),
                    user_id: None,
                },
            )))
            .await;

        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn unknown_user_is_swallowed() {
        let notifier = Arc::new(RecordingNotifier::default());
        reporter(notifier.clone())
            .report(&RetryOutcome::Success(memory("ghost")))
            .await;
        assert!(notifier.sent().is_empty());
    }
}
