//! Action execution - run one host action and capture its output
//!
//! This module provides:
//! - ActionExecutor trait for the one-action-at-a-time contract
//! - ActionOutcome describing what happened
//! - ShellExecutor, which runs actions through a POSIX shell

mod shell;

use async_trait::async_trait;

use crate::artifact::ArtifactHandle;
use crate::error::{ActloopError, Result};

pub use shell::ShellExecutor;

/// What one execution left behind
#[derive(Debug)]
pub struct ActionOutcome {
    /// Artifact holding the captured output (always created)
    pub artifact: ArtifactHandle,
    /// Exit code, when the process ran and exited normally
    pub exit_code: Option<i32>,
    /// Local failure (not found, launch failure, timeout); recorded in the artifact
    pub failure: Option<ActloopError>,
}

impl ActionOutcome {
    pub fn succeeded(&self) -> bool {
        self.failure.is_none() && self.exit_code == Some(0)
    }
}

/// Runs exactly one action per call and always produces one artifact.
///
/// `Err` is reserved for failures to create or write the artifact itself;
/// problems with the action are reported through `ActionOutcome::failure`.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(&self, action: &str) -> Result<ActionOutcome>;
}
