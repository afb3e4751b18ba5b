//! Prompt System - objective and instruction templates
//!
//! Renders the first requester turn and the oracle's standing instructions
//! with Handlebars.

mod render;

pub use render::{DEFAULT_INSTRUCTIONS, DEFAULT_OBJECTIVE_TEMPLATE, PromptRenderer};
