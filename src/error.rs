//! Error types for actloop
//!
//! Centralized error handling using thiserror. Every variant renders as a
//! single line so a fatal failure can be reported verbatim.

use std::time::Duration;

use thiserror::Error;

/// All error types that can occur in actloop
#[derive(Debug, Error)]
pub enum ActloopError {
    /// The action's interpreter or command could not be resolved
    #[error("Action not found: command not found: {0}")]
    ActionNotFound(String),

    /// The action could not be started for any other reason
    #[error("Action launch failed: {0}")]
    ActionLaunchFailed(String),

    /// The action exceeded the configured execution timeout
    #[error("Action timed out after {}ms", .0.as_millis())]
    ActionTimedOut(Duration),

    /// The oracle reported the run as failed
    #[error("Run failed: {reason}")]
    RunFailed { reason: String },

    /// The run completed but produced no oracle turn
    #[error("No response content: run {run_id} completed without an oracle turn")]
    NoResponseContent { run_id: String },

    /// The run did not reach a terminal state within the configured wait
    #[error("Run timed out: run {run_id} still pending after {}ms", .waited.as_millis())]
    RunTimedOut { run_id: String, waited: Duration },

    /// The host aborted the loop
    #[error("Cancelled: loop aborted by host")]
    Cancelled,

    /// The configured action budget was exhausted
    #[error("Action limit reached: {0} actions executed without completion")]
    ActionLimitReached(u32),

    /// Oracle transport or protocol error
    #[error("Oracle error: {0}")]
    Oracle(String),

    /// Invalid configuration
    #[error("Config error: {0}")]
    Config(String),

    /// Objective template could not be rendered
    #[error("Template error: {0}")]
    Template(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ActloopError {
    /// Local execution failures are fed back to the oracle instead of ending the loop
    pub fn is_local_execution_failure(&self) -> bool {
        matches!(
            self,
            ActloopError::ActionNotFound(_) | ActloopError::ActionLaunchFailed(_) | ActloopError::ActionTimedOut(_)
        )
    }
}

/// Result type alias for actloop operations
pub type Result<T> = std::result::Result<T, ActloopError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_not_found_error() {
        let err = ActloopError::ActionNotFound("scan-tool".to_string());
        assert_eq!(err.to_string(), "Action not found: command not found: scan-tool");
    }

    #[test]
    fn test_run_failed_error() {
        let err = ActloopError::RunFailed {
            reason: "rate_limit_exceeded".to_string(),
        };
        assert_eq!(err.to_string(), "Run failed: rate_limit_exceeded");
    }

    #[test]
    fn test_run_timed_out_error() {
        let err = ActloopError::RunTimedOut {
            run_id: "run_1".to_string(),
            waited: Duration::from_millis(1500),
        };
        assert_eq!(err.to_string(), "Run timed out: run run_1 still pending after 1500ms");
    }

    #[test]
    fn test_no_response_content_error() {
        let err = ActloopError::NoResponseContent {
            run_id: "run_9".to_string(),
        };
        assert!(err.to_string().starts_with("No response content"));
        assert!(err.to_string().contains("run_9"));
    }

    #[test]
    fn test_action_timed_out_error() {
        let err = ActloopError::ActionTimedOut(Duration::from_millis(250));
        assert_eq!(err.to_string(), "Action timed out after 250ms");
    }

    #[test]
    fn test_fatal_errors_are_single_line() {
        let errors = vec![
            ActloopError::RunFailed {
                reason: "server_error".to_string(),
            },
            ActloopError::NoResponseContent {
                run_id: "run_1".to_string(),
            },
            ActloopError::RunTimedOut {
                run_id: "run_1".to_string(),
                waited: Duration::from_secs(1),
            },
            ActloopError::Cancelled,
            ActloopError::ActionLimitReached(3),
        ];
        for err in errors {
            assert!(!err.to_string().contains('\n'), "multi-line: {}", err);
        }
    }

    #[test]
    fn test_local_execution_failures() {
        assert!(ActloopError::ActionNotFound("x".into()).is_local_execution_failure());
        assert!(ActloopError::ActionLaunchFailed("x".into()).is_local_execution_failure());
        assert!(ActloopError::ActionTimedOut(Duration::from_secs(1)).is_local_execution_failure());
        assert!(!ActloopError::Cancelled.is_local_execution_failure());
        assert!(
            !ActloopError::RunFailed {
                reason: "x".into()
            }
            .is_local_execution_failure()
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ActloopError = io_err.into();
        assert!(matches!(err, ActloopError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let err: ActloopError = json_err.into();
        assert!(matches!(err, ActloopError::Json(_)));
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_ok() -> Result<i32> {
            Ok(42)
        }

        fn returns_err() -> Result<i32> {
            Err(ActloopError::Cancelled)
        }

        assert!(returns_ok().is_ok());
        assert!(returns_err().is_err());
    }
}
