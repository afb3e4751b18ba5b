//! Domain types for actloop
//!
//! This module contains all core domain types:
//! - Task / Turn: the conversation held with the oracle
//! - RunHandle / RunStatus: one request for the oracle's next turn
//! - ProposedAction: the oracle's answer for a completed run
//! - LoopState / LoopReport: where the feedback loop is and how it ended

pub mod outcome;
pub mod run;
pub mod task;

pub use outcome::{LoopReport, LoopState, ProposedAction};
pub use run::{RunHandle, RunId, RunStatus};
pub use task::{Role, Task, TaskId, Turn};
