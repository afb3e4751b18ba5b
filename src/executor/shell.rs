//! Shell executor - run an action through `sh -c` with streaming capture

use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use colored::*;
use log::{debug, info, warn};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

use super::{ActionExecutor, ActionOutcome};
use crate::artifact::{ArtifactHandle, leading_token};
use crate::error::{ActloopError, Result};

/// Default interpreter for actions
pub const DEFAULT_SHELL: &str = "sh";

/// Shell exit status for "command not found"
const EXIT_NOT_FOUND: i32 = 127;

/// Shell exit status for "found but not executable"
const EXIT_NOT_EXECUTABLE: i32 = 126;

/// Runs each action in a child shell, writing merged stdout/stderr to an artifact
#[derive(Debug)]
pub struct ShellExecutor {
    artifact_dir: PathBuf,
    shell: String,
    timeout: Option<Duration>,
    echo: bool,
    lines: Option<mpsc::UnboundedSender<String>>,
}

impl ShellExecutor {
    /// Executor writing artifacts into `artifact_dir`
    pub fn new(artifact_dir: impl Into<PathBuf>) -> Self {
        Self {
            artifact_dir: artifact_dir.into(),
            shell: DEFAULT_SHELL.to_string(),
            timeout: None,
            echo: false,
            lines: None,
        }
    }

    /// Use a different POSIX-compatible interpreter
    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Kill actions that run longer than `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Print every captured line to stdout as it arrives
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Forward every captured line to `tx` as it arrives
    pub fn with_line_channel(mut self, tx: mpsc::UnboundedSender<String>) -> Self {
        self.lines = Some(tx);
        self
    }

    /// Merge stderr into stdout inside the shell so both share one pipe in write order
    fn script(action: &str) -> String {
        format!("exec 2>&1\n{}", action)
    }

    fn spawn(&self, action: &str) -> std::io::Result<Child> {
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(Self::script(action))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        // Own process group, so a timeout can take down everything the shell started
        #[cfg(unix)]
        cmd.process_group(0);

        cmd.spawn()
    }

    /// Classify a failure to start the interpreter itself
    fn spawn_failure(&self, err: std::io::Error) -> ActloopError {
        match err.kind() {
            ErrorKind::NotFound => ActloopError::ActionNotFound(self.shell.clone()),
            ErrorKind::PermissionDenied => ActloopError::ActionLaunchFailed(format!("permission denied: {}", self.shell)),
            _ => ActloopError::ActionLaunchFailed(format!("{}: {}", self.shell, err)),
        }
    }

    /// Classify the shell's own report that the command could not be started
    fn exit_failure(action: &str, status: &ExitStatus) -> Option<ActloopError> {
        let token = leading_token(action).to_string();
        match status.code() {
            Some(EXIT_NOT_FOUND) => Some(ActloopError::ActionNotFound(token)),
            Some(EXIT_NOT_EXECUTABLE) => Some(ActloopError::ActionLaunchFailed(format!("permission denied: {}", token))),
            _ => None,
        }
    }

    async fn write_line(&self, artifact: &mut File, line: &str) -> Result<()> {
        artifact.write_all(line.as_bytes()).await?;
        artifact.write_all(b"\n").await?;
        artifact.flush().await?;

        if self.echo {
            println!("{}", line);
        }
        if let Some(tx) = &self.lines {
            // Observers are optional; a closed receiver must not stop the capture.
            let _ = tx.send(line.to_string());
        }
        Ok(())
    }

    /// Copy lines from the child's output into the artifact until EOF
    async fn capture<R: AsyncRead + Unpin>(&self, output: R, artifact: &mut File) -> Result<usize> {
        let mut reader = BufReader::new(output);
        let mut buf = Vec::new();
        let mut count = 0;

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                break;
            }
            let line = String::from_utf8_lossy(&buf);
            self.write_line(artifact, line.trim_end_matches('\n')).await?;
            count += 1;
        }

        Ok(count)
    }

    async fn record_failure(&self, artifact: &mut File, failure: &ActloopError) -> Result<()> {
        warn!("{}", failure);
        self.write_line(artifact, &failure.to_string()).await
    }
}

#[async_trait]
impl ActionExecutor for ShellExecutor {
    async fn execute(&self, action: &str) -> Result<ActionOutcome> {
        tokio::fs::create_dir_all(&self.artifact_dir).await?;
        // A same-second name collision truncates the earlier artifact
        let handle = ArtifactHandle::for_action(&self.artifact_dir, action, Local::now());
        let mut artifact = File::create(handle.path()).await?;
        info!("Executing action: {} -> {}", action, handle.path().display());
        if self.echo {
            println!("{}", banner(action));
        }

        let mut child = match self.spawn(action) {
            Ok(child) => child,
            Err(e) => {
                let failure = self.spawn_failure(e);
                self.record_failure(&mut artifact, &failure).await?;
                return Ok(ActionOutcome {
                    artifact: handle,
                    exit_code: None,
                    failure: Some(failure),
                });
            }
        };

        let Some(output) = child.stdout.take() else {
            let failure = ActloopError::ActionLaunchFailed("child output was not captured".to_string());
            self.record_failure(&mut artifact, &failure).await?;
            return Ok(ActionOutcome {
                artifact: handle,
                exit_code: None,
                failure: Some(failure),
            });
        };

        let captured = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.capture(output, &mut artifact)).await.ok(),
            None => Some(self.capture(output, &mut artifact).await),
        };

        let (exit_code, failure) = match captured {
            Some(lines) => {
                let lines = lines?;
                let status = child.wait().await?;
                debug!("Action exited with {} after {} lines", status, lines);
                (status.code(), Self::exit_failure(action, &status))
            }
            None => {
                kill_process_group(&child);
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill timed out action: {}", e);
                }
                (None, self.timeout.map(ActloopError::ActionTimedOut))
            }
        };

        if let Some(failure) = &failure {
            self.record_failure(&mut artifact, failure).await?;
        }
        artifact.flush().await?;

        Ok(ActionOutcome {
            artifact: handle,
            exit_code,
            failure,
        })
    }
}

/// Line printed before an echoed action's output
fn banner(action: &str) -> String {
    format!("{} {}", "Executing command:".cyan(), action)
}

#[cfg(unix)]
fn kill_process_group(child: &Child) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        warn!("Failed to kill process group {}: {}", pid, e);
    }
}

#[cfg(not(unix))]
fn kill_process_group(_child: &Child) {}
