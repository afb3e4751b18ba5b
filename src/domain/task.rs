//! Task and turn types
//!
//! A Task is one conversation with the oracle. Turns are only ever appended,
//! and an oracle turn is always preceded by a requester turn.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::run::RunId;
use crate::error::{ActloopError, Result};

/// Identifier of a task (a conversation thread on the oracle side)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who authored a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The local host: the objective and every action result
    Requester,
    /// The remote reasoning service
    Oracle,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Requester => f.write_str("requester"),
            Role::Oracle => f.write_str("oracle"),
        }
    }
}

/// One role-tagged unit of content within a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,

    /// Run that produced this turn (oracle turns only, when the service reports it)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<RunId>,
}

impl Turn {
    /// Create a requester turn
    pub fn requester(content: impl Into<String>) -> Self {
        Self {
            role: Role::Requester,
            content: content.into(),
            run_id: None,
        }
    }

    /// Create an oracle turn produced by the given run
    pub fn oracle(content: impl Into<String>, run_id: Option<RunId>) -> Self {
        Self {
            role: Role::Oracle,
            content: content.into(),
            run_id,
        }
    }

    /// Returns true if this turn was produced by `run` (or carries no run at all)
    pub fn belongs_to(&self, run: &RunId) -> bool {
        self.run_id.as_ref().is_none_or(|id| id == run)
    }
}

/// A conversation with the oracle: identifier plus ordered turns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    turns: Vec<Turn>,
}

impl Task {
    pub fn new(id: TaskId) -> Self {
        Self { id, turns: Vec::new() }
    }

    /// Append a turn, rejecting an oracle turn that does not follow a requester turn
    pub fn append(&mut self, turn: Turn) -> Result<()> {
        if turn.role == Role::Oracle && self.turns.last().is_none_or(|last| last.role == Role::Oracle) {
            return Err(ActloopError::Oracle(format!(
                "task {}: oracle turn must follow a requester turn",
                self.id
            )));
        }
        self.turns.push(turn);
        Ok(())
    }

    /// All turns in submission order
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Turns written by `author`, newest first
    pub fn turns_by(&self, author: Role) -> Vec<Turn> {
        self.turns.iter().rev().filter(|t| t.role == author).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_preserves_order() {
        let mut task = Task::new(TaskId::new("t1"));
        task.append(Turn::requester("begin")).unwrap();
        task.append(Turn::oracle("ls", None)).unwrap();
        task.append(Turn::requester("a.txt")).unwrap();

        let contents: Vec<&str> = task.turns().iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["begin", "ls", "a.txt"]);
    }

    #[test]
    fn test_oracle_turn_needs_requester_before_it() {
        let mut task = Task::new(TaskId::new("t1"));
        assert!(task.append(Turn::oracle("ls", None)).is_err());

        task.append(Turn::requester("begin")).unwrap();
        task.append(Turn::oracle("ls", None)).unwrap();
        assert!(task.append(Turn::oracle("pwd", None)).is_err());
        assert_eq!(task.len(), 2);
    }

    #[test]
    fn test_turns_by_is_newest_first() {
        let mut task = Task::new(TaskId::new("t1"));
        task.append(Turn::requester("begin")).unwrap();
        task.append(Turn::oracle("first", None)).unwrap();
        task.append(Turn::requester("out")).unwrap();
        task.append(Turn::oracle("second", None)).unwrap();

        let oracle = task.turns_by(Role::Oracle);
        assert_eq!(oracle.len(), 2);
        assert_eq!(oracle[0].content, "second");
        assert_eq!(oracle[1].content, "first");
    }

    #[test]
    fn test_belongs_to() {
        let run = RunId::new("run_1");
        assert!(Turn::oracle("x", Some(RunId::new("run_1"))).belongs_to(&run));
        assert!(Turn::oracle("x", None).belongs_to(&run));
        assert!(!Turn::oracle("x", Some(RunId::new("run_0"))).belongs_to(&run));
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&Role::Requester).unwrap(), "\"requester\"");
        assert_eq!(serde_json::to_string(&Role::Oracle).unwrap(), "\"oracle\"");
    }
}
