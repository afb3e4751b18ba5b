//! In-memory oracle driven by a script of per-run behaviours
//!
//! Each call to `start_run` consumes the next `ScriptedRun`. Every turn is kept
//! so tests can inspect the full conversation afterwards.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::domain::{Role, RunHandle, RunId, RunStatus, Task, TaskId, Turn};
use crate::error::{ActloopError, Result};
use crate::id::{generate_run_id, generate_task_id};
use crate::oracle::client::OracleClient;

/// How a single run behaves
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedRun {
    /// Completes on the first poll with this turn
    Respond(String),
    /// Stays pending for `polls` polls, then completes with this turn
    RespondAfter { polls: u32, text: String },
    /// Completes immediately, but the turn only shows up after `empty_reads` reads
    RespondLate { empty_reads: u32, text: String },
    /// Fails on the first poll
    Fail(String),
    /// Never leaves pending
    NeverComplete,
    /// Completes without ever producing a turn
    CompleteWithoutTurn,
}

impl ScriptedRun {
    pub fn respond(text: impl Into<String>) -> Self {
        ScriptedRun::Respond(text.into())
    }
}

#[derive(Debug)]
struct RunState {
    task_id: TaskId,
    behaviour: ScriptedRun,
    polls: u32,
    status: RunStatus,
    delivered: bool,
}

#[derive(Debug, Default)]
struct Inner {
    script: VecDeque<ScriptedRun>,
    tasks: HashMap<TaskId, Task>,
    runs: HashMap<RunId, RunState>,
    run_order: Vec<RunId>,
    total_polls: usize,
}

/// Oracle that plays back a fixed script
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    inner: Mutex<Inner>,
}

impl ScriptedOracle {
    pub fn new(script: Vec<ScriptedRun>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                script: script.into(),
                ..Default::default()
            }),
        }
    }

    /// Script where every run completes immediately with the next response
    pub fn responding<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(responses.into_iter().map(|r| ScriptedRun::Respond(r.into())).collect())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Every turn of the task in submission order
    pub fn turns(&self, task: &TaskId) -> Vec<Turn> {
        self.lock()
            .tasks
            .get(task)
            .map(|t| t.turns().to_vec())
            .unwrap_or_default()
    }

    /// IDs of all tasks created so far
    pub fn task_ids(&self) -> Vec<TaskId> {
        self.lock().tasks.keys().cloned().collect()
    }

    /// Number of runs started
    pub fn runs_started(&self) -> usize {
        self.lock().run_order.len()
    }

    /// Number of poll calls across all runs
    pub fn total_polls(&self) -> usize {
        self.lock().total_polls
    }
}

impl Inner {
    fn task_mut(&mut self, task: &TaskId) -> Result<&mut Task> {
        self.tasks
            .get_mut(task)
            .ok_or_else(|| ActloopError::Oracle(format!("unknown task {}", task)))
    }

    fn deliver(&mut self, run_id: &RunId, text: String) -> Result<()> {
        let task_id = match self.runs.get_mut(run_id) {
            Some(run) if !run.delivered => {
                run.delivered = true;
                run.task_id.clone()
            }
            _ => return Ok(()),
        };
        self.task_mut(&task_id)?.append(Turn::oracle(text, Some(run_id.clone())))
    }
}

#[async_trait]
impl OracleClient for ScriptedOracle {
    async fn create_task(&self) -> Result<TaskId> {
        let id = TaskId::new(generate_task_id());
        self.lock().tasks.insert(id.clone(), Task::new(id.clone()));
        Ok(id)
    }

    async fn submit_turn(&self, task: &TaskId, role: Role, content: &str) -> Result<()> {
        let turn = match role {
            Role::Requester => Turn::requester(content),
            Role::Oracle => Turn::oracle(content, None),
        };
        self.lock().task_mut(task)?.append(turn)
    }

    async fn start_run(&self, task: &TaskId) -> Result<RunHandle> {
        let mut inner = self.lock();
        inner.task_mut(task)?;

        let outstanding = inner
            .runs
            .values()
            .any(|r| &r.task_id == task && !r.status.is_terminal());
        if outstanding {
            return Err(ActloopError::Oracle(format!("task {} already has a run in progress", task)));
        }

        let behaviour = inner
            .script
            .pop_front()
            .ok_or_else(|| ActloopError::Oracle("script exhausted".to_string()))?;

        let run_id = RunId::new(generate_run_id());
        inner.runs.insert(
            run_id.clone(),
            RunState {
                task_id: task.clone(),
                behaviour,
                polls: 0,
                status: RunStatus::Pending,
                delivered: false,
            },
        );
        inner.run_order.push(run_id.clone());
        Ok(RunHandle::new(task.clone(), run_id))
    }

    async fn poll_run(&self, run: &RunHandle) -> Result<RunStatus> {
        let mut inner = self.lock();
        inner.total_polls += 1;

        let state = inner
            .runs
            .get_mut(&run.run_id)
            .ok_or_else(|| ActloopError::Oracle(format!("unknown run {}", run.run_id)))?;
        if state.status.is_terminal() {
            return Ok(state.status.clone());
        }
        state.polls += 1;

        let (status, immediate) = match &state.behaviour {
            ScriptedRun::Respond(text) => (RunStatus::Completed, Some(text.clone())),
            ScriptedRun::RespondAfter { polls, text } if state.polls > *polls => {
                (RunStatus::Completed, Some(text.clone()))
            }
            ScriptedRun::RespondAfter { .. } | ScriptedRun::NeverComplete => (RunStatus::Pending, None),
            ScriptedRun::RespondLate { .. } | ScriptedRun::CompleteWithoutTurn => (RunStatus::Completed, None),
            ScriptedRun::Fail(reason) => (
                RunStatus::Failed {
                    reason: reason.clone(),
                },
                None,
            ),
        };
        state.status = status.clone();

        if let Some(text) = immediate {
            inner.deliver(&run.run_id, text)?;
        }
        Ok(status)
    }

    async fn read_turns(&self, task: &TaskId, author: Role) -> Result<Vec<Turn>> {
        let mut inner = self.lock();

        let mut late = Vec::new();
        for (run_id, state) in inner.runs.iter_mut() {
            if &state.task_id != task || state.delivered || state.status != RunStatus::Completed {
                continue;
            }
            if let ScriptedRun::RespondLate { empty_reads, text } = &mut state.behaviour {
                if *empty_reads == 0 {
                    late.push((run_id.clone(), text.clone()));
                } else {
                    *empty_reads -= 1;
                }
            }
        }
        for (run_id, text) in late {
            inner.deliver(&run_id, text)?;
        }

        let task = inner
            .tasks
            .get(task)
            .ok_or_else(|| ActloopError::Oracle(format!("unknown task {}", task)))?;
        Ok(task.turns_by(author))
    }
}
