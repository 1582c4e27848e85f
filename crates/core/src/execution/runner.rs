//! High-level task runner
//!
//! This module drives a run: it expands the requested tasks into leaves, then
//! executes the leaves strictly one after another. Each leaf's configuration is
//! re-read from the config store right before it runs, so values written by
//! earlier leaves are visible to later ones.
//!
//! There is no per-task timeout. A command that never exits keeps the run
//! waiting forever.

use std::path::Path;
use std::time::Instant;

use colored::*;
use tracing::{debug, error, instrument, warn};

use crate::config_store::ConfigStore;
use crate::configs::pipeline::PipelineConfig;
use crate::environment::Environment;
use crate::events::EventBus;
use crate::execution::expander::{AliasExpander, AliasTable};
use crate::registry::{Executor, ExecutorRegistry, Invocation, TaskContext};
use crate::results::{RunReport, RunState, TaskResult, TaskStatus};
use crate::tasks::get_task_color;
use crate::types::{PipewrightError, PipewrightResult};

/// Configuration for the task runner
#[derive(Debug, Default, Clone)]
pub struct TaskRunnerConfig {
    /// Log failures and keep going instead of halting on the first one
    pub force: bool,
}

/// Sequential runner over a registry and its aliases
pub struct TaskRunner<'a> {
    root: &'a Path,
    pipeline: &'a PipelineConfig,
    registry: &'a ExecutorRegistry,
    aliases: &'a AliasTable,
    events: &'a EventBus,
    config: TaskRunnerConfig,
}

impl<'a> TaskRunner<'a> {
    pub fn new(
        root: &'a Path,
        pipeline: &'a PipelineConfig,
        registry: &'a ExecutorRegistry,
        aliases: &'a AliasTable,
        events: &'a EventBus,
    ) -> Self {
        Self {
            root,
            pipeline,
            registry,
            aliases,
            events,
            config: TaskRunnerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: TaskRunnerConfig) -> Self {
        self.config = config;
        self
    }

    pub async fn run(
        &self,
        task: &str,
        store: &mut ConfigStore,
        environment: &mut Environment,
    ) -> PipewrightResult<RunReport> {
        self.run_all(&[task.to_string()], store, environment).await
    }

    /// Run several requested tasks as one sequence.
    ///
    /// Configuration errors (unknown task, cyclic alias) are returned as `Err`
    /// before any task executes. Task failures are reported in the `RunReport`.
    #[instrument(skip(self, store, environment), fields(force = self.config.force))]
    pub async fn run_all(
        &self,
        tasks: &[String],
        store: &mut ConfigStore,
        environment: &mut Environment,
    ) -> PipewrightResult<RunReport> {
        let mut state = RunState::Idle;
        transition(&mut state, RunState::Expanding);

        let leaves = AliasExpander::new(self.aliases, self.registry).expand_all(tasks)?;

        // Resolve every executor up front so a bad name never surfaces mid-run
        let executors = leaves
            .iter()
            .map(|leaf| {
                self.registry
                    .resolve(leaf)
                    .ok_or_else(|| PipewrightError::UnknownTask {
                        name: leaf.clone(),
                        referenced_by: None,
                    })
            })
            .collect::<PipewrightResult<Vec<_>>>()?;

        let mut results = Vec::with_capacity(leaves.len());

        for (index, (leaf, executor)) in leaves.iter().zip(&executors).enumerate() {
            transition(&mut state, RunState::Executing(index));
            print_header(leaf, executor.kind(), index, leaves.len());

            let started = Instant::now();
            let outcome = self
                .execute_leaf(leaf, executor.as_ref(), store, environment)
                .await;
            let duration = started.elapsed();

            let Err(err) = outcome else {
                results.push(TaskResult {
                    name: leaf.clone(),
                    status: TaskStatus::Succeeded,
                    duration,
                });
                continue;
            };

            let message = err.failure_message();
            results.push(TaskResult {
                name: leaf.clone(),
                status: TaskStatus::Failed {
                    message: message.clone(),
                },
                duration,
            });

            if self.config.force {
                warn!(task = %leaf, error = %message, "task failed, continuing because force is enabled");
                println!(
                    "{} {}",
                    "⚠".yellow().bold(),
                    format!("{} failed: {} (continuing)", leaf, message).yellow()
                );
                continue;
            }

            error!(task = %leaf, error = %message, "task failed, halting run");
            println!(
                "{} {}",
                "✗".red().bold(),
                format!("{} failed: {}", leaf, message).red()
            );

            results.extend(leaves[index + 1..].iter().map(|name| TaskResult {
                name: name.clone(),
                status: TaskStatus::Skipped,
                duration: Default::default(),
            }));
            transition(&mut state, RunState::Failed);

            return Ok(RunReport {
                requested: tasks.to_vec(),
                leaves,
                results,
                state,
                forced: self.config.force,
            });
        }

        transition(&mut state, RunState::Done);
        Ok(RunReport {
            requested: tasks.to_vec(),
            leaves,
            results,
            state,
            forced: self.config.force,
        })
    }

    async fn execute_leaf(
        &self,
        leaf: &str,
        executor: &dyn Executor,
        store: &mut ConfigStore,
        environment: &mut Environment,
    ) -> PipewrightResult<()> {
        let (task, target) = match self.registry.split_target(leaf) {
            Some((task, target)) if !self.registry.contains(leaf) => (task, Some(target)),
            _ => (leaf, None),
        };

        let config = store.task_config(task, target)?;
        let invocation = Invocation {
            name: leaf,
            task,
            target,
            config: &config,
        };

        let mut ctx = TaskContext {
            root: self.root,
            store,
            environment,
            events: self.events,
            config: self.pipeline,
        };

        executor.execute(&invocation, &mut ctx).await
    }
}

fn transition(state: &mut RunState, next: RunState) {
    debug!(from = ?state, to = ?next, "runner state");
    *state = next;
}

fn print_header(leaf: &str, kind: &str, index: usize, total: usize) {
    println!();
    println!(
        "┌─ {} {}",
        format!("Running task '{}'", leaf)
            .color(get_task_color(leaf))
            .bold(),
        format!("[{}/{}]", index + 1, total).bright_black()
    );
    println!("└─ {} {}", "Kind:".bright_black(), kind);
}
