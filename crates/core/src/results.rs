//! Result types for pipeline operations
//!
//! This module contains the result types returned by pipeline manager operations,
//! providing a centralized location for output structures.

use std::time::Duration;

use crate::types::{PipewrightError, PipewrightResult};

/// Runner state machine: `Idle → Expanding → Executing(i) → {Executing(i+1) | Failed | Done}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Expanding,
    Executing(usize),
    Failed,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Succeeded,
    Failed { message: String },
    /// Not started because an earlier task halted the run
    Skipped,
}

#[derive(Debug, Clone)]
pub struct TaskResult {
    pub name: String,
    pub status: TaskStatus,
    pub duration: Duration,
}

/// Outcome of one run of the task runner
#[derive(Debug, Clone)]
pub struct RunReport {
    pub requested: Vec<String>,
    pub leaves: Vec<String>,
    pub results: Vec<TaskResult>,
    pub state: RunState,
    pub forced: bool,
}

impl RunReport {
    pub fn executed(&self) -> impl Iterator<Item = &TaskResult> {
        self.results
            .iter()
            .filter(|r| r.status != TaskStatus::Skipped)
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.results.iter().filter_map(|r| match &r.status {
            TaskStatus::Failed { message } => Some((r.name.as_str(), message.as_str())),
            _ => None,
        })
    }

    pub fn is_done(&self) -> bool {
        self.state == RunState::Done
    }

    /// Turn a `Failed` run into the error of the task that halted it
    pub fn into_result(self) -> PipewrightResult<Self> {
        if self.state != RunState::Failed {
            return Ok(self);
        }
        let (task, message) = self
            .failures()
            .last()
            .map(|(task, message)| (task.to_string(), message.to_string()))
            .unwrap_or_default();
        Err(PipewrightError::Execution { task, message })
    }
}

/// Information about a declared task
#[derive(Debug, Clone)]
pub struct TaskInfo {
    pub name: String,
    pub kind: String,
    pub description: Option<String>,
    pub targets: Vec<String>,
    pub members: Vec<String>,
}

#[derive(Debug)]
pub struct TaskListResult {
    pub tasks: Vec<TaskInfo>,
    pub environments: Vec<String>,
    pub watch_groups: Vec<String>,
}

/// Ordered leaves a run would execute
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pub requested: Vec<String>,
    pub leaves: Vec<String>,
}

#[derive(Debug)]
pub struct AliasGraphResult {
    pub aliases: Vec<(String, Vec<String>)>,
    pub cycles: Vec<Vec<String>>,
}
