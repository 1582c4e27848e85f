//! High-level pipeline management interface
//!
//! This module provides the [`PipelineManager`] which serves as the primary interface
//! for all pipeline operations. It loads the workspace configuration, registers every
//! declared task with the right executor and exposes listing, planning and running.
//!
//! The PipelineManager abstracts away the complexity of:
//! - Loading and merging the YAML task files
//! - Validating task kinds and registering executors
//! - Seeding the config store from static task configuration
//! - Wiring event listeners declared in the pipeline file
//!
//! ## Example
//!
//! ```rust,no_run
//! use pipewright_core::pipeline::{PipelineManager, PipelineManagerConfig, RunOptions};
//! use std::path::PathBuf;
//!
//! # async fn example() -> pipewright_core::types::PipewrightResult<()> {
//! let manager = PipelineManager::new(PipelineManagerConfig {
//!     workspace_root: PathBuf::from("."),
//! })?;
//!
//! // Ordered leaves of the default pipeline
//! let plan = manager.get_execution_plan(&[])?;
//!
//! // Run the test pipeline
//! let report = manager
//!     .run_tasks(&["test".to_string()], &RunOptions::default())
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config_store::ConfigStore;
use crate::configs::{
    pipeline::{parse_pipeline_config, PipelineConfig},
    tasks::{parse_tasks_config, TaskConfig, TaskKind, TasksFileConfig},
};
use crate::coverage::CoverageUploader;
use crate::environment::Environment;
use crate::events::{EventBus, Listener};
use crate::execution::inline::{
    CoverageCheckExecutor, EnvironmentExecutor, LoadConfigExecutor, SetConfigExecutor,
};
use crate::execution::{alias_cycles, AliasExpander, AliasTable, CommandExecutor};
use crate::execution::{TaskRunner, TaskRunnerConfig};
use crate::registry::{Executor, ExecutorRegistry};
use crate::results::{AliasGraphResult, ExecutionPlan, RunReport, TaskInfo, TaskListResult};
use crate::types::{PipewrightError, PipewrightResult};
use crate::watch::WatchGroup;

/// Directory holding the workspace configuration
pub const CONFIG_DIR: &str = ".pipewright";
/// Name of the builtin multi-target task applying environment profiles
pub const ENV_TASK: &str = "env";

/// High-level pipeline manager that encapsulates all pipeline operations
pub struct PipelineManager {
    pub root: PathBuf,
    pub pipeline_config: PipelineConfig,
    pub task_configs: TasksFileConfig,
    registry: ExecutorRegistry,
    aliases: AliasTable,
    events: EventBus,
    initial_store: ConfigStore,
}

/// Configuration for initializing a pipeline manager
pub struct PipelineManagerConfig {
    pub workspace_root: PathBuf,
}

/// Per-run overrides given on the command line
#[derive(Debug, Default, Clone)]
pub struct RunOptions {
    /// Overrides `options.force` from the pipeline file
    pub force: Option<bool>,
    /// Environment profile applied before the first task
    pub environment: Option<String>,
}

impl PipelineManager {
    /// Initialize a new pipeline manager from the given workspace root
    pub fn new(config: PipelineManagerConfig) -> PipewrightResult<Self> {
        let pipeline_config = Self::load_pipeline_config(&config.workspace_root)?;
        let task_configs = Self::load_task_configs(&config.workspace_root)?;

        Self::from_configs(config.workspace_root, pipeline_config, task_configs)
    }

    /// Build a manager from already parsed configuration
    pub fn from_configs(
        root: PathBuf,
        pipeline_config: PipelineConfig,
        task_configs: TasksFileConfig,
    ) -> PipewrightResult<Self> {
        let mut registry = ExecutorRegistry::new();
        let mut aliases = AliasTable::new();
        let mut initial_store = ConfigStore::new();
        let mut declared = HashSet::new();

        for (key, value) in pipeline_config.config.iter().flatten() {
            initial_store.set(key.clone(), value.clone());
        }

        for task in &task_configs.tasks {
            if !declared.insert(task.name.as_str()) {
                return Err(PipewrightError::Config(format!(
                    "Task '{}' is declared more than once",
                    task.name
                )));
            }

            Self::register_task(task, &pipeline_config, &mut registry, &mut aliases)?;

            if let Some(value) = task.store_value() {
                if initial_store.set(task.name.clone(), value).is_some() {
                    return Err(PipewrightError::Config(format!(
                        "Task '{}' clashes with a static config value of the same name",
                        task.name
                    )));
                }
            }
        }

        let profiles = Self::environment_names(&pipeline_config);
        if !profiles.is_empty() && !declared.contains(ENV_TASK) {
            registry.register_with_targets(
                ENV_TASK,
                Arc::new(EnvironmentExecutor::new(None)),
                profiles,
            )?;
        }

        let mut events = EventBus::new();
        for listener in pipeline_config.events.iter().flatten() {
            let upload = listener.upload.clone().ok_or_else(|| {
                PipewrightError::Config(format!(
                    "Event listener for topic '{}' declares no action",
                    listener.topic
                ))
            })?;
            events.on(listener.topic.clone(), Arc::new(CoverageUploader::new(upload)));
        }

        // Surface bad glob patterns at load time rather than when watching starts
        for group in pipeline_config.watch.iter().flatten() {
            WatchGroup::from_config(group)?;
        }

        debug!(
            tasks = task_configs.tasks.len(),
            aliases = aliases.iter().count(),
            "pipeline loaded"
        );

        Ok(Self {
            root,
            pipeline_config,
            task_configs,
            registry,
            aliases,
            events,
            initial_store,
        })
    }

    /// Register an additional inline task, e.g. from an embedding program
    pub fn register_executor(
        &mut self,
        name: &str,
        executor: Arc<dyn Executor>,
    ) -> PipewrightResult<()> {
        if self.aliases.contains(name) {
            return Err(PipewrightError::Config(format!(
                "Task '{}' is already declared as an alias",
                name
            )));
        }
        self.registry.register(name, executor)
    }

    /// Subscribe an additional listener to a topic
    pub fn on_event(&mut self, topic: &str, listener: Arc<dyn Listener>) {
        self.events.on(topic, listener);
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn default_task(&self) -> &str {
        self.pipeline_config.default_task()
    }

    /// List all declared tasks, profiles and watch groups
    pub fn list_tasks(&self) -> TaskListResult {
        let mut tasks: Vec<TaskInfo> = self
            .task_configs
            .tasks
            .iter()
            .map(|task| {
                let kind = task.kind().map(|k| k.label()).unwrap_or("invalid");
                TaskInfo {
                    name: task.name.clone(),
                    kind: kind.to_string(),
                    description: task.description.clone(),
                    targets: task.target_names(),
                    members: task.alias.clone().unwrap_or_default(),
                }
            })
            .collect();

        if self.registry.contains(ENV_TASK) && !tasks.iter().any(|t| t.name == ENV_TASK) {
            tasks.push(TaskInfo {
                name: ENV_TASK.to_string(),
                kind: "env".to_string(),
                description: Some("Apply an environment profile".to_string()),
                targets: self.registry.targets(ENV_TASK).to_vec(),
                members: Vec::new(),
            });
        }

        TaskListResult {
            tasks,
            environments: Self::environment_names(&self.pipeline_config),
            watch_groups: self
                .pipeline_config
                .watch
                .iter()
                .flatten()
                .map(|group| group.name.clone())
                .collect(),
        }
    }

    /// Get the ordered leaves the given tasks expand to
    pub fn get_execution_plan(&self, tasks: &[String]) -> PipewrightResult<ExecutionPlan> {
        let requested = self.requested_tasks(tasks);
        let leaves = AliasExpander::new(&self.aliases, &self.registry).expand_all(&requested)?;
        Ok(ExecutionPlan { requested, leaves })
    }

    /// Get alias membership and any cycles among aliases
    pub fn get_alias_graph(&self) -> AliasGraphResult {
        AliasGraphResult {
            aliases: self
                .aliases
                .iter()
                .map(|(name, members)| (name.clone(), members.to_vec()))
                .collect(),
            cycles: alias_cycles(&self.aliases),
        }
    }

    /// All configured watch groups, in declaration order
    pub fn watch_groups(&self) -> PipewrightResult<Vec<WatchGroup>> {
        self.pipeline_config
            .watch
            .iter()
            .flatten()
            .map(WatchGroup::from_config)
            .collect()
    }

    /// Run tasks as a single sequence with a fresh copy of the seeded config store
    pub async fn run_tasks(
        &self,
        tasks: &[String],
        options: &RunOptions,
    ) -> PipewrightResult<RunReport> {
        let requested = self.requested_tasks(tasks);

        // Configuration errors surface before the environment is touched
        AliasExpander::new(&self.aliases, &self.registry).expand_all(&requested)?;

        let force = options
            .force
            .unwrap_or_else(|| self.pipeline_config.force());
        if force {
            warn!("force mode is enabled, task failures will not stop the run");
        }

        let mut store = self.initial_store.clone();
        let mut environment = Environment::new();

        if let Some(name) = &options.environment {
            let profile = self.pipeline_config.environment(name).ok_or_else(|| {
                PipewrightError::Config(format!("Environment profile '{}' is not declared", name))
            })?;
            environment.apply(profile, &self.root, &mut store)?;
        }

        TaskRunner::new(
            &self.root,
            &self.pipeline_config,
            &self.registry,
            &self.aliases,
            &self.events,
        )
        .with_config(TaskRunnerConfig { force })
        .run_all(&requested, &mut store, &mut environment)
        .await
    }

    // Private helper methods

    fn requested_tasks(&self, tasks: &[String]) -> Vec<String> {
        if tasks.is_empty() {
            vec![self.default_task().to_string()]
        } else {
            tasks.to_vec()
        }
    }

    fn register_task(
        task: &TaskConfig,
        pipeline_config: &PipelineConfig,
        registry: &mut ExecutorRegistry,
        aliases: &mut AliasTable,
    ) -> PipewrightResult<()> {
        let executor: Arc<dyn Executor> = match task.kind()? {
            TaskKind::Alias(members) => return aliases.insert(&task.name, members),
            TaskKind::Command { .. } => {
                return registry.register_with_targets(
                    &task.name,
                    Arc::new(CommandExecutor::from_task(task)),
                    task.target_names(),
                );
            }
            TaskKind::Set(values) => Arc::new(SetConfigExecutor::new(values)),
            TaskKind::Load(load) => Arc::new(LoadConfigExecutor::new(load)),
            TaskKind::Environment(profile) => {
                if pipeline_config.environment(&profile).is_none() {
                    return Err(PipewrightError::Config(format!(
                        "Task '{}' applies undeclared environment profile '{}'",
                        task.name, profile
                    )));
                }
                Arc::new(EnvironmentExecutor::new(Some(profile)))
            }
            TaskKind::CoverageCheck(check) => Arc::new(CoverageCheckExecutor::new(check)),
        };
        registry.register(&task.name, executor)
    }

    fn environment_names(pipeline_config: &PipelineConfig) -> Vec<String> {
        pipeline_config
            .environments
            .iter()
            .flatten()
            .map(|env| env.name.clone())
            .collect()
    }

    fn load_pipeline_config(workspace_root: &Path) -> PipewrightResult<PipelineConfig> {
        let pipeline_config_path = workspace_root.join(CONFIG_DIR).join("pipeline.yml");
        let content = std::fs::read_to_string(&pipeline_config_path).map_err(|e| {
            PipewrightError::Config(format!(
                "Failed to read pipeline config {}: {}",
                pipeline_config_path.display(),
                e
            ))
        })?;

        parse_pipeline_config(&content).map_err(|e| {
            PipewrightError::Config(format!(
                "Failed to parse pipeline config {}: {}",
                pipeline_config_path.display(),
                e
            ))
        })
    }

    fn load_task_configs(workspace_root: &Path) -> PipewrightResult<TasksFileConfig> {
        let tasks_dir = workspace_root.join(CONFIG_DIR).join("tasks");
        let mut paths = Vec::new();

        if tasks_dir.exists() {
            for entry in std::fs::read_dir(&tasks_dir).map_err(|e| {
                PipewrightError::Config(format!(
                    "Failed to read tasks directory {}: {}",
                    tasks_dir.display(),
                    e
                ))
            })? {
                let path = entry?.path();
                if matches!(
                    path.extension().and_then(|s| s.to_str()),
                    Some("yml") | Some("yaml")
                ) {
                    paths.push(path);
                }
            }
        }

        // Merge order is file-name order
        paths.sort();

        let mut merged = TasksFileConfig::default();
        for path in &paths {
            let content = std::fs::read_to_string(path).map_err(|e| {
                PipewrightError::Config(format!(
                    "Failed to read task config {}: {}",
                    path.display(),
                    e
                ))
            })?;
            let config = parse_tasks_config(&content).map_err(|e| {
                PipewrightError::Config(format!(
                    "Failed to parse task config {}: {}",
                    path.display(),
                    e
                ))
            })?;

            if config.name.is_some() {
                merged.name = config.name;
            }
            if config.description.is_some() {
                merged.description = config.description;
            }
            merged.tasks.extend(config.tasks);
        }

        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configs::pipeline::EnvironmentConfig;
    use crate::results::{RunState, TaskStatus};
    use std::collections::BTreeMap;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn manager(pipeline: &str, tasks: &str) -> (tempfile::TempDir, PipewrightResult<PipelineManager>) {
        let temp_dir = tempfile::tempdir().unwrap();
        write(temp_dir.path(), ".pipewright/pipeline.yml", pipeline);
        write(temp_dir.path(), ".pipewright/tasks/main.yml", tasks);
        let manager = PipelineManager::new(PipelineManagerConfig {
            workspace_root: temp_dir.path().to_path_buf(),
        });
        (temp_dir, manager)
    }

    #[test]
    fn test_task_files_merge_in_name_order() {
        let temp_dir = tempfile::tempdir().unwrap();
        write(temp_dir.path(), ".pipewright/pipeline.yml", "name: web\n");
        write(
            temp_dir.path(),
            ".pipewright/tasks/b.yml",
            "tasks:\n  - name: second\n    command: \"true\"\n",
        );
        write(
            temp_dir.path(),
            ".pipewright/tasks/a.yaml",
            "tasks:\n  - name: first\n    command: \"true\"\n",
        );
        write(temp_dir.path(), ".pipewright/tasks/notes.txt", "ignored");

        let manager = PipelineManager::new(PipelineManagerConfig {
            workspace_root: temp_dir.path().to_path_buf(),
        })
        .unwrap();

        let names: Vec<_> = manager.list_tasks().tasks.into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn test_duplicate_task_across_kinds_is_config_error() {
        let (_dir, manager) = manager(
            "name: web\n",
            "tasks:\n  - name: lint\n    command: \"true\"\n  - name: lint\n    alias: [other]\n",
        );
        let err = manager.err().unwrap();
        assert!(err.is_configuration_error());
        assert!(err.to_string().contains("'lint' is declared more than once"));
    }

    #[test]
    fn test_missing_pipeline_file_is_config_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = PipelineManager::new(PipelineManagerConfig {
            workspace_root: temp_dir.path().to_path_buf(),
        });
        assert!(result.err().unwrap().is_configuration_error());
    }

    #[test]
    fn test_env_task_registered_for_profiles() {
        let (_dir, manager) = manager(
            "environments:\n  - name: test\n  - name: production\n",
            "tasks:\n  - name: test\n    alias: [\"env:test\"]\n",
        );
        let manager = manager.unwrap();

        let plan = manager.get_execution_plan(&["test".to_string()]).unwrap();
        assert_eq!(plan.leaves, vec!["env:test"]);

        let env = manager
            .list_tasks()
            .tasks
            .into_iter()
            .find(|t| t.name == ENV_TASK)
            .unwrap();
        assert_eq!(env.targets, vec!["test", "production"]);
    }

    #[test]
    fn test_env_task_with_undeclared_profile_is_rejected() {
        let (_dir, manager) = manager(
            "name: web\n",
            "tasks:\n  - name: secure\n    env: secure\n",
        );
        assert!(manager
            .err()
            .unwrap()
            .to_string()
            .contains("undeclared environment profile 'secure'"));
    }

    #[test]
    fn test_empty_request_runs_default_task() {
        let (_dir, manager) = manager(
            "options:\n  defaultTask: build\n",
            "tasks:\n  - name: build\n    alias: [a, b]\n  - name: a\n    command: \"true\"\n  - name: b\n    command: \"true\"\n",
        );
        let plan = manager.unwrap().get_execution_plan(&[]).unwrap();
        assert_eq!(plan.requested, vec!["build"]);
        assert_eq!(plan.leaves, vec!["a", "b"]);
    }

    #[test]
    fn test_alias_graph_reports_cycles() {
        let (_dir, manager) = manager(
            "name: web\n",
            "tasks:\n  - name: a\n    alias: [b]\n  - name: b\n    alias: [a]\n",
        );
        let manager = manager.unwrap();
        let graph = manager.get_alias_graph();
        assert_eq!(graph.aliases.len(), 2);
        assert_eq!(graph.cycles.len(), 1);

        let err = manager.get_execution_plan(&["a".to_string()]).unwrap_err();
        assert!(matches!(err, PipewrightError::CyclicAlias { .. }));
    }

    #[tokio::test]
    async fn test_unknown_environment_option_fails_before_running() {
        let (dir, manager) = manager(
            "name: web\n",
            "tasks:\n  - name: touch\n    command: \"touch ran\"\n",
        );
        let options = RunOptions {
            environment: Some("staging".to_string()),
            ..RunOptions::default()
        };
        let err = manager
            .unwrap()
            .run_tasks(&["touch".to_string()], &options)
            .await
            .unwrap_err();

        assert!(err.is_configuration_error());
        assert!(!dir.path().join("ran").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_with_environment_and_force_override() {
        let (dir, manager) = manager(
            "environments:\n  - name: test\n    vars:\n      NODE_ENV: test\n",
            r#"tasks:
  - name: default
    alias: [fail, record]
  - name: fail
    command: "exit 1"
  - name: record
    command: "printf '%s' \"$NODE_ENV\" > node_env.txt"
"#,
        );
        let manager = manager.unwrap();

        let halted = manager
            .run_tasks(&[], &RunOptions::default())
            .await
            .unwrap();
        assert_eq!(halted.state, RunState::Failed);
        assert!(!dir.path().join("node_env.txt").exists());

        let options = RunOptions {
            force: Some(true),
            environment: Some("test".to_string()),
        };
        let forced = manager.run_tasks(&[], &options).await.unwrap();
        assert_eq!(forced.state, RunState::Done);
        assert!(matches!(forced.results[0].status, TaskStatus::Failed { .. }));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("node_env.txt")).unwrap(),
            "test"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_option_turns_pipeline_force_off() {
        let (dir, manager) = manager(
            "options:\n  force: true\n",
            r#"tasks:
  - name: default
    alias: [fail, record]
  - name: fail
    command: "exit 1"
  - name: record
    command: "touch recorded"
"#,
        );
        let manager = manager.unwrap();

        let options = RunOptions {
            force: Some(false),
            ..RunOptions::default()
        };
        let halted = manager.run_tasks(&[], &options).await.unwrap();
        assert_eq!(halted.state, RunState::Failed);
        assert!(!dir.path().join("recorded").exists());

        let forced = manager
            .run_tasks(&[], &RunOptions::default())
            .await
            .unwrap();
        assert_eq!(forced.state, RunState::Done);
        assert!(dir.path().join("recorded").exists());
    }

    #[tokio::test]
    async fn test_static_config_seeds_store() {
        let pipeline = PipelineConfig {
            config: Some(BTreeMap::from([(
                "dist".to_string(),
                serde_json::json!("public/dist"),
            )])),
            environments: Some(vec![EnvironmentConfig {
                name: "test".to_string(),
                vars: None,
                env_file: None,
            }]),
            ..PipelineConfig::default()
        };
        let tasks = parse_tasks_config(
            "tasks:\n  - name: bundle\n    set:\n      bundle: \"<%= dist %>/app.js\"\n",
        )
        .unwrap();

        let manager =
            PipelineManager::from_configs(PathBuf::from("."), pipeline, tasks).unwrap();
        let report = manager
            .run_tasks(&["bundle".to_string()], &RunOptions::default())
            .await
            .unwrap();
        assert!(report.is_done());
    }
}
