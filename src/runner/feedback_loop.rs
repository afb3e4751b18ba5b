//! Feedback loop - submit objective, execute proposed actions, feed results back.
//!
//! State moves `Initiated → AwaitingAction → (Terminating | Executing) →
//! AwaitingAction → … → Done`. Everything the loop needs to know between steps
//! lives in a `LoopSession`; nothing is kept in ambient state.

use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio_util::sync::CancellationToken;

use super::completion::{CompletionOracle, PollConfig, cancellable};
use crate::domain::{LoopReport, LoopState, ProposedAction, Role, RunHandle, TaskId};
use crate::error::{ActloopError, Result};
use crate::executor::ActionExecutor;
use crate::oracle::OracleClient;
use crate::prompt::{DEFAULT_OBJECTIVE_TEMPLATE, PromptRenderer};

/// Default completion sentinel
pub const DEFAULT_COMPLETION_SENTINEL: &str = "Done";

/// Submitted instead of an empty artifact, which the oracle would reject
pub const EMPTY_OUTPUT_PLACEHOLDER: &str = "(no output)";

/// Configuration for the FeedbackLoop.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Oracle reply that ends the loop (compared trimmed and case-folded)
    pub completion_sentinel: String,
    /// Template for the first requester turn
    pub objective_template: String,
    /// Stop with `ActionLimitReached` after this many actions
    pub max_actions: Option<u32>,
    /// Polling behaviour for each run
    pub poll: PollConfig,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            completion_sentinel: DEFAULT_COMPLETION_SENTINEL.to_string(),
            objective_template: DEFAULT_OBJECTIVE_TEMPLATE.to_string(),
            max_actions: None,
            poll: PollConfig::default(),
        }
    }
}

/// State threaded through one loop execution
#[derive(Debug, Clone)]
pub struct LoopSession {
    pub task_id: TaskId,
    /// Outstanding run, if any (never more than one)
    pub run: Option<RunHandle>,
    pub state: LoopState,
    pub actions_executed: u32,
    pub artifacts: Vec<PathBuf>,
}

impl LoopSession {
    pub fn new(task_id: TaskId) -> Self {
        Self {
            task_id,
            run: None,
            state: LoopState::Initiated,
            actions_executed: 0,
            artifacts: Vec::new(),
        }
    }

    fn transition(&mut self, next: LoopState) {
        debug!("Task {}: {} -> {}", self.task_id, self.state, next);
        self.state = next;
    }

    fn into_report(self) -> LoopReport {
        LoopReport {
            task_id: self.task_id,
            state: self.state,
            actions_executed: self.actions_executed,
            artifacts: self.artifacts,
        }
    }
}

/// FeedbackLoop drives one objective to completion.
///
/// Each cycle:
/// 1. Waits for the oracle's proposed action
/// 2. Stops if it is the completion sentinel
/// 3. Otherwise executes it and captures the artifact
/// 4. Submits the artifact content as the next requester turn and starts a run
pub struct FeedbackLoop<C, E>
where
    C: OracleClient,
    E: ActionExecutor,
{
    oracle: Arc<C>,
    executor: Arc<E>,
    completion: CompletionOracle<C>,
    renderer: PromptRenderer,
    config: LoopConfig,
}

impl<C, E> FeedbackLoop<C, E>
where
    C: OracleClient,
    E: ActionExecutor,
{
    /// Create a new FeedbackLoop with custom configuration.
    pub fn with_config(oracle: Arc<C>, executor: Arc<E>, config: LoopConfig) -> Self {
        let completion = CompletionOracle::new(oracle.clone(), config.poll.clone());
        Self {
            oracle,
            executor,
            completion,
            renderer: PromptRenderer::new(),
            config,
        }
    }

    /// Run the loop for `objective` until the oracle signals completion.
    ///
    /// Local execution failures are fed back to the oracle; oracle failures,
    /// the action limit, and cancellation end the loop with an error.
    pub async fn run(&self, objective: &str, cancel: &CancellationToken) -> Result<LoopReport> {
        let prompt = self
            .renderer
            .render_objective(&self.config.objective_template, objective)?;

        let task_id = cancellable(cancel, self.oracle.create_task()).await?;
        info!("Starting loop on task {}", task_id);
        let mut session = LoopSession::new(task_id);

        match self.drive(&mut session, &prompt, cancel).await {
            Ok(()) => {
                info!(
                    "Task {} done after {} actions",
                    session.task_id, session.actions_executed
                );
                Ok(session.into_report())
            }
            Err(e) => {
                error!(
                    "Task {} failed in state {} after {} actions: {}",
                    session.task_id, session.state, session.actions_executed, e
                );
                session.transition(LoopState::Failed);
                Err(e)
            }
        }
    }

    async fn drive(&self, session: &mut LoopSession, prompt: &str, cancel: &CancellationToken) -> Result<()> {
        self.submit_and_start(session, prompt, cancel).await?;

        loop {
            let run = session
                .run
                .clone()
                .ok_or_else(|| ActloopError::Oracle("no outstanding run to wait for".to_string()))?;

            let action = self.completion.await_action(&run, cancel).await?;
            session.run = None;
            info!("Oracle proposed: {}", action.text.trim());

            if action.is_completion(&self.config.completion_sentinel) {
                session.transition(LoopState::Terminating);
                session.transition(LoopState::Done);
                return Ok(());
            }

            if let Some(max) = self.config.max_actions.filter(|max| session.actions_executed >= *max) {
                return Err(ActloopError::ActionLimitReached(max));
            }

            if cancel.is_cancelled() {
                return Err(ActloopError::Cancelled);
            }

            let feedback = self.execute(session, &action).await?;
            self.submit_and_start(session, &feedback, cancel).await?;
        }
    }

    /// Run the proposed action and return the text to feed back
    async fn execute(&self, session: &mut LoopSession, action: &ProposedAction) -> Result<String> {
        session.transition(LoopState::Executing);

        let mut outcome = self.executor.execute(action.text.trim()).await?;
        session.actions_executed += 1;
        session.artifacts.push(outcome.artifact.path().to_path_buf());

        match outcome.failure.take() {
            Some(failure) if !failure.is_local_execution_failure() => return Err(failure),
            Some(failure) => warn!("Action failed locally, feeding back: {}", failure),
            None => debug!("Action exited with {:?}", outcome.exit_code),
        }

        let content = outcome.artifact.read_to_string().await?;
        if content.trim().is_empty() {
            return Ok(EMPTY_OUTPUT_PLACEHOLDER.to_string());
        }
        Ok(content)
    }

    /// Append a requester turn and start the run that answers it
    async fn submit_and_start(&self, session: &mut LoopSession, content: &str, cancel: &CancellationToken) -> Result<()> {
        cancellable(cancel, self.oracle.submit_turn(&session.task_id, Role::Requester, content)).await?;
        let run = cancellable(cancel, self.oracle.start_run(&session.task_id)).await?;
        debug!("Started run {} on task {}", run.run_id, session.task_id);

        session.run = Some(run);
        session.transition(LoopState::AwaitingAction);
        Ok(())
    }
}
