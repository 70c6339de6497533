use serde::{Deserialize, Serialize};
use std::fmt;

/// Selects the downstream endpoint a task is sent to (`git`, `web`, `audio`, ...).
///
/// Kept as an open string so that tasks of an unknown kind can still be
/// decoded and dead-lettered instead of being dropped at the queue boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskKind(String);

impl TaskKind {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for TaskKind {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A unit of work as produced upstream.
///
/// Wire names (`type`, `data`, `retries`) are the ones the producers write.
/// `attempt` is the only retry counter: it is bumped by the dispatcher right
/// before each downstream call and is never decremented.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(rename = "type")]
    pub kind: TaskKind,

    /// Opaque, kind-dependent body forwarded to the processing API as-is.
    #[serde(rename = "data", default)]
    pub payload: serde_json::Value,

    #[serde(rename = "retries", default)]
    pub attempt: u32,
}

impl Task {
    pub fn new(kind: impl Into<TaskKind>, payload: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
            attempt: 0,
        }
    }

    /// Record that one more dispatch is about to happen.
    pub(crate) fn begin_attempt(&mut self) -> u32 {
        self.attempt = self.attempt.saturating_add(1);
        self.attempt
    }
}
