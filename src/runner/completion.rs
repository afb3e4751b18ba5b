//! Completion oracle - wait for a run to finish and extract its action.
//!
//! Polls the oracle at a fixed interval until the run is terminal, then reads
//! back the oracle's turn for that run. Empty reads after completion are
//! retried a bounded number of times before giving up.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, warn};
use tokio_util::sync::CancellationToken;

use crate::domain::{ProposedAction, Role, RunHandle, RunStatus};
use crate::error::{ActloopError, Result};
use crate::oracle::OracleClient;

/// Polling behaviour for a single run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// Pause between status polls
    pub interval: Duration,
    /// Give up with `RunTimedOut` after this long (None waits forever)
    pub max_wait: Option<Duration>,
    /// Extra reads allowed when a completed run has no turn yet
    pub empty_read_retries: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            max_wait: None,
            empty_read_retries: 3,
        }
    }
}

/// Resolve `fut` unless `cancel` fires first
pub(crate) async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ActloopError::Cancelled),
        result = fut => result,
    }
}

/// Waits for runs to complete and extracts the proposed action
pub struct CompletionOracle<C: OracleClient> {
    client: Arc<C>,
    config: PollConfig,
}

impl<C: OracleClient> CompletionOracle<C> {
    pub fn new(client: Arc<C>, config: PollConfig) -> Self {
        Self { client, config }
    }

    /// Block (asynchronously) until `run` yields an action or a fatal error.
    pub async fn await_action(&self, run: &RunHandle, cancel: &CancellationToken) -> Result<ProposedAction> {
        let started = Instant::now();
        let mut polls: u32 = 0;

        loop {
            let status = cancellable(cancel, self.client.poll_run(run)).await?;
            polls += 1;

            match status {
                RunStatus::Pending => {
                    debug!("Run {} pending after {} polls", run.run_id, polls);
                    self.pause_before_poll(run, started, cancel).await?;
                }
                RunStatus::Completed => {
                    debug!("Run {} completed after {} polls", run.run_id, polls);
                    return self.extract(run, cancel).await;
                }
                RunStatus::Failed { reason } => {
                    return Err(ActloopError::RunFailed { reason });
                }
            }
        }
    }

    /// Sleep one interval, clipped to the remaining wait budget
    async fn pause_before_poll(&self, run: &RunHandle, started: Instant, cancel: &CancellationToken) -> Result<()> {
        let mut pause = self.config.interval;

        if let Some(max_wait) = self.config.max_wait {
            let waited = started.elapsed();
            if waited >= max_wait {
                return Err(ActloopError::RunTimedOut {
                    run_id: run.run_id.to_string(),
                    waited,
                });
            }
            pause = pause.min(max_wait - waited);
        }

        cancellable(cancel, async {
            tokio::time::sleep(pause).await;
            Ok(())
        })
        .await
    }

    /// Read the oracle's turn for a completed run
    async fn extract(&self, run: &RunHandle, cancel: &CancellationToken) -> Result<ProposedAction> {
        let attempts = self.config.empty_read_retries + 1;

        for attempt in 1..=attempts {
            let turns = cancellable(cancel, self.client.read_turns(&run.task_id, Role::Oracle)).await?;
            if let Some(turn) = turns.into_iter().find(|t| t.belongs_to(&run.run_id)) {
                return Ok(ProposedAction::new(run.run_id.clone(), turn.content));
            }

            warn!(
                "Run {} completed but has no oracle turn yet (read {} of {})",
                run.run_id, attempt, attempts
            );
            if attempt < attempts {
                let interval = self.config.interval;
                cancellable(cancel, async {
                    tokio::time::sleep(interval).await;
                    Ok(())
                })
                .await?;
            }
        }

        Err(ActloopError::NoResponseContent {
            run_id: run.run_id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskId;
    use crate::oracle::{ScriptedOracle, ScriptedRun};

    fn fast(max_wait: Option<Duration>) -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(5),
            max_wait,
            empty_read_retries: 2,
        }
    }

    async fn started(oracle: &Arc<ScriptedOracle>) -> RunHandle {
        let task: TaskId = oracle.create_task().await.unwrap();
        oracle.submit_turn(&task, Role::Requester, "begin").await.unwrap();
        oracle.start_run(&task).await.unwrap()
    }

    #[test]
    fn test_poll_config_default() {
        let config = PollConfig::default();
        assert_eq!(config.interval, Duration::from_secs(10));
        assert_eq!(config.max_wait, None);
        assert_eq!(config.empty_read_retries, 3);
    }

    #[tokio::test]
    async fn test_completed_run_yields_action() {
        let oracle = Arc::new(ScriptedOracle::responding(["nmap 10.0.0.5"]));
        let run = started(&oracle).await;
        let completion = CompletionOracle::new(oracle.clone(), fast(None));

        let action = completion.await_action(&run, &CancellationToken::new()).await.unwrap();

        assert_eq!(action.text, "nmap 10.0.0.5");
        assert_eq!(action.run_id, run.run_id);
        assert_eq!(oracle.total_polls(), 1);
    }

    #[tokio::test]
    async fn test_polls_until_completed() {
        let oracle = Arc::new(ScriptedOracle::new(vec![ScriptedRun::RespondAfter {
            polls: 3,
            text: "id".into(),
        }]));
        let run = started(&oracle).await;
        let completion = CompletionOracle::new(oracle.clone(), fast(None));

        let action = completion.await_action(&run, &CancellationToken::new()).await.unwrap();

        assert_eq!(action.text, "id");
        assert_eq!(oracle.total_polls(), 4);
    }

    #[tokio::test]
    async fn test_failed_run_is_fatal() {
        let oracle = Arc::new(ScriptedOracle::new(vec![ScriptedRun::Fail("server_error".into())]));
        let run = started(&oracle).await;
        let completion = CompletionOracle::new(oracle.clone(), fast(None));

        let err = completion.await_action(&run, &CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, ActloopError::RunFailed { ref reason } if reason == "server_error"));
        assert_eq!(oracle.total_polls(), 1);
    }

    #[tokio::test]
    async fn test_empty_reads_are_bounded() {
        let oracle = Arc::new(ScriptedOracle::new(vec![ScriptedRun::CompleteWithoutTurn]));
        let run = started(&oracle).await;
        let completion = CompletionOracle::new(oracle.clone(), fast(None));

        let err = completion.await_action(&run, &CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, ActloopError::NoResponseContent { .. }));
    }

    #[tokio::test]
    async fn test_late_turn_within_retry_budget() {
        let oracle = Arc::new(ScriptedOracle::new(vec![ScriptedRun::RespondLate {
            empty_reads: 2,
            text: "uname -a".into(),
        }]));
        let run = started(&oracle).await;
        let completion = CompletionOracle::new(oracle.clone(), fast(None));

        let action = completion.await_action(&run, &CancellationToken::new()).await.unwrap();
        assert_eq!(action.text, "uname -a");
    }

    #[tokio::test]
    async fn test_late_turn_beyond_retry_budget() {
        let oracle = Arc::new(ScriptedOracle::new(vec![ScriptedRun::RespondLate {
            empty_reads: 3,
            text: "uname -a".into(),
        }]));
        let run = started(&oracle).await;
        let completion = CompletionOracle::new(oracle.clone(), fast(None));

        let err = completion.await_action(&run, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, ActloopError::NoResponseContent { .. }));
    }

    #[tokio::test]
    async fn test_never_complete_times_out() {
        let oracle = Arc::new(ScriptedOracle::new(vec![ScriptedRun::NeverComplete]));
        let run = started(&oracle).await;
        let completion = CompletionOracle::new(oracle.clone(), fast(Some(Duration::from_millis(60))));

        let started_at = Instant::now();
        let err = completion.await_action(&run, &CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, ActloopError::RunTimedOut { .. }));
        assert!(started_at.elapsed() >= Duration::from_millis(60));
        assert!(oracle.total_polls() > 1);
    }

    #[tokio::test]
    async fn test_cancel_during_wait() {
        let oracle = Arc::new(ScriptedOracle::new(vec![ScriptedRun::NeverComplete]));
        let run = started(&oracle).await;
        let config = PollConfig {
            interval: Duration::from_secs(30),
            ..fast(None)
        };
        let completion = CompletionOracle::new(oracle.clone(), config);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = completion.await_action(&run, &cancel).await.unwrap_err();
        assert!(matches!(err, ActloopError::Cancelled));
        assert_eq!(oracle.total_polls(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_poll() {
        let oracle = Arc::new(ScriptedOracle::responding(["ls"]));
        let run = started(&oracle).await;
        let completion = CompletionOracle::new(oracle.clone(), fast(None));

        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = completion.await_action(&run, &cancel).await.unwrap_err();
        assert!(matches!(err, ActloopError::Cancelled));
        assert_eq!(oracle.total_polls(), 0);
    }
}
