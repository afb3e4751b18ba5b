//! actloop - drive local actions from a remote assistant
//!
//! An objective is handed to an assistant service. Each reply is executed as
//! a shell command, its merged output is captured to an artifact file, and the
//! artifact is fed back as the next turn until the assistant replies with the
//! completion sentinel.

pub mod artifact;
pub mod domain;
pub mod error;
pub mod executor;
pub mod id;
pub mod oracle;
pub mod prompt;
pub mod runner;

pub use error::{ActloopError, Result};
