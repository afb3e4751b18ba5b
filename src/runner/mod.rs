//! Loop runner module - drives an objective through the oracle.
//!
//! - CompletionOracle waits on a single run and extracts the proposed action
//! - FeedbackLoop executes actions and feeds their artifacts back

mod completion;
mod feedback_loop;

pub use completion::{CompletionOracle, PollConfig};
pub use feedback_loop::{
    DEFAULT_COMPLETION_SENTINEL, EMPTY_OUTPUT_PLACEHOLDER, FeedbackLoop, LoopConfig, LoopSession,
};
