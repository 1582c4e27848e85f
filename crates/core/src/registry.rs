//! Executor registry
//!
//! Maps task names to the executable unit behind them. Executors are either
//! external tasks (spawned commands) or inline functions that act directly on
//! the run context.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::config_store::ConfigStore;
use crate::environment::Environment;
use crate::events::EventBus;
use crate::types::{PipewrightError, PipewrightResult};

/// Which leaf task is being executed, with its freshly resolved configuration
#[derive(Debug, Clone)]
pub struct Invocation<'a> {
    /// Full leaf name, e.g. `html2js:main`
    pub name: &'a str,
    pub task: &'a str,
    pub target: Option<&'a str>,
    pub config: &'a Value,
}

/// Mutable state shared by every task of a run
pub struct TaskContext<'a> {
    pub root: &'a Path,
    pub store: &'a mut ConfigStore,
    pub environment: &'a mut Environment,
    pub events: &'a EventBus,
    pub config: &'a crate::configs::pipeline::PipelineConfig,
}

#[async_trait]
pub trait Executor: Send + Sync {
    /// Short label shown by `list` and in logs
    fn kind(&self) -> &'static str;

    /// Run the task; an error means the task failed
    async fn execute(
        &self,
        invocation: &Invocation<'_>,
        ctx: &mut TaskContext<'_>,
    ) -> PipewrightResult<()>;
}

/// Wraps a closure as an inline executor
pub struct InlineExecutor<F> {
    func: F,
}

impl<F> InlineExecutor<F>
where
    F: Fn(&Invocation<'_>, &mut TaskContext<'_>) -> PipewrightResult<()> + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F> Executor for InlineExecutor<F>
where
    F: Fn(&Invocation<'_>, &mut TaskContext<'_>) -> PipewrightResult<()> + Send + Sync,
{
    fn kind(&self) -> &'static str {
        "inline"
    }

    async fn execute(
        &self,
        invocation: &Invocation<'_>,
        ctx: &mut TaskContext<'_>,
    ) -> PipewrightResult<()> {
        (self.func)(invocation, ctx)
    }
}

struct Registration {
    executor: Arc<dyn Executor>,
    targets: Vec<String>,
}

#[derive(Default)]
pub struct ExecutorRegistry {
    entries: HashMap<String, Registration>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, executor: Arc<dyn Executor>) -> PipewrightResult<()> {
        self.register_with_targets(name, executor, Vec::new())
    }

    /// Register a multi-target task; the targets run in the given order when
    /// the task is requested without one.
    pub fn register_with_targets(
        &mut self,
        name: &str,
        executor: Arc<dyn Executor>,
        targets: Vec<String>,
    ) -> PipewrightResult<()> {
        if self.entries.contains_key(name) {
            return Err(PipewrightError::Config(format!(
                "Task '{}' is registered more than once",
                name
            )));
        }
        self.entries
            .insert(name.to_string(), Registration { executor, targets });
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Declared targets of a task, empty for single tasks and unknown names
    pub fn targets(&self, name: &str) -> &[String] {
        self.entries
            .get(name)
            .map(|r| r.targets.as_slice())
            .unwrap_or_default()
    }

    /// Split a leaf name into its task and target when the task declares that target
    pub fn split_target<'n>(&self, name: &'n str) -> Option<(&'n str, &'n str)> {
        let (task, target) = name.rsplit_once(':')?;
        self.targets(task)
            .iter()
            .any(|t| t == target)
            .then_some((task, target))
    }

    /// Resolve a leaf name. Exact names win over `task:target` fallbacks.
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn Executor>> {
        if let Some(entry) = self.entries.get(name) {
            return Some(entry.executor.clone());
        }
        let (task, _) = self.split_target(name)?;
        self.entries.get(task).map(|entry| entry.executor.clone())
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }
}
