//! Run types
//!
//! A run is one asynchronous request for the oracle's next turn.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::task::TaskId;

/// Identifier of a run
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle to an outstanding run on a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunHandle {
    pub task_id: TaskId,
    pub run_id: RunId,
}

impl RunHandle {
    pub fn new(task_id: TaskId, run_id: RunId) -> Self {
        Self { task_id, run_id }
    }
}

/// Status of a run as reported by the oracle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "status")]
pub enum RunStatus {
    /// Still being worked on
    Pending,
    /// Finished; the oracle's turn can be read
    Completed,
    /// Finished without a usable turn
    Failed { reason: String },
}

impl RunStatus {
    /// Returns true if the run will not change state again
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Pending)
    }
}
