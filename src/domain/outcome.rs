//! Loop execution outcome types.

use std::fmt;
use std::path::PathBuf;

use crate::domain::run::RunId;
use crate::domain::task::TaskId;

/// The oracle's answer for one completed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposedAction {
    pub run_id: RunId,
    pub text: String,
}

impl ProposedAction {
    pub fn new(run_id: RunId, text: impl Into<String>) -> Self {
        Self {
            run_id,
            text: text.into(),
        }
    }

    /// Returns true if the text equals `sentinel` once trimmed and case-folded
    pub fn is_completion(&self, sentinel: &str) -> bool {
        self.text.trim().to_lowercase() == sentinel.trim().to_lowercase()
    }
}

/// Where the feedback loop currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Objective not yet submitted
    Initiated,
    /// Waiting for the oracle to propose the next action
    AwaitingAction,
    /// Running the proposed action
    Executing,
    /// The oracle sent the completion sentinel
    Terminating,
    /// Finished successfully
    Done,
    /// Ended on a fatal error
    Failed,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoopState::Initiated => "initiated",
            LoopState::AwaitingAction => "awaiting-action",
            LoopState::Executing => "executing",
            LoopState::Terminating => "terminating",
            LoopState::Done => "done",
            LoopState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Summary of a loop that reached `Done`
#[derive(Debug, Clone)]
pub struct LoopReport {
    pub task_id: TaskId,
    pub state: LoopState,
    pub actions_executed: u32,
    /// Artifact paths in execution order
    pub artifacts: Vec<PathBuf>,
}
