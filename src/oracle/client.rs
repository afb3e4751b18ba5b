//! Core oracle client trait

use async_trait::async_trait;

use crate::domain::{Role, RunHandle, RunStatus, TaskId, Turn};
use crate::error::Result;

/// Conversation-style oracle: tasks hold turns, runs ask for the next turn.
///
/// Implementations do no retrying of their own; polling cadence and bounded
/// re-reads belong to the caller.
#[async_trait]
pub trait OracleClient: Send + Sync {
    /// Open a new task (conversation)
    async fn create_task(&self) -> Result<TaskId>;

    /// Append a turn to the task
    async fn submit_turn(&self, task: &TaskId, role: Role, content: &str) -> Result<()>;

    /// Ask the oracle for its next turn
    async fn start_run(&self, task: &TaskId) -> Result<RunHandle>;

    /// Current status of a run
    async fn poll_run(&self, run: &RunHandle) -> Result<RunStatus>;

    /// Turns written by `author`, newest first
    async fn read_turns(&self, task: &TaskId, author: Role) -> Result<Vec<Turn>>;
}
