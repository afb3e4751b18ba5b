//! Prompt Renderer - Render templates with context variables using Handlebars

use handlebars::Handlebars;
use serde::Serialize;
use serde_json::json;

use crate::error::{ActloopError, Result};

/// Objective template used when none is configured
pub const DEFAULT_OBJECTIVE_TEMPLATE: &str = "{{objective}}";

/// Standing instructions given to the oracle when none are configured
pub const DEFAULT_INSTRUCTIONS: &str = "You are an automation agent working toward the objective you are given.
- Respond with exactly one shell command at a time, with no explanation or formatting.
- Do not send another command until you receive the output of the previous one.
- Choose each next command based on the output you receive.
- Avoid commands that require user interaction.
- When the objective is achieved or nothing useful remains to try, respond with {{completion_sentinel}}";

/// Renders prompt templates using Handlebars templating
pub struct PromptRenderer {
    handlebars: Handlebars<'static>,
}

impl Default for PromptRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptRenderer {
    /// Create a new PromptRenderer with default settings
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        // Commands and tool output must reach the oracle verbatim
        handlebars.register_escape_fn(handlebars::no_escape);
        Self { handlebars }
    }

    /// Render a template string with any serializable context
    pub fn render_with<T: Serialize>(&self, template: &str, context: &T) -> Result<String> {
        self.handlebars
            .render_template(template, context)
            .map_err(|e| ActloopError::Template(format!("Failed to render template: {}", e)))
    }

    /// Render the first requester turn; `{{objective}}` is the user's objective
    pub fn render_objective(&self, template: &str, objective: &str) -> Result<String> {
        self.render_with(template, &json!({ "objective": objective }))
    }

    /// Render the oracle instructions; `{{completion_sentinel}}` is the done marker
    pub fn render_instructions(&self, template: &str, completion_sentinel: &str) -> Result<String> {
        self.render_with(template, &json!({ "completion_sentinel": completion_sentinel }))
    }
}
