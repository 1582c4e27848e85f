//! External task execution
//!
//! An external task is a command line handed to an unmodified third-party tool
//! (linter, minifier, test runner). Arguments may contain `<%= key %>`
//! placeholders, resolved against the config store just before the process is
//! spawned.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use colored::*;
use serde_json::Value;
use tokio::process::Command;
use tracing::debug;

use crate::configs::tasks::{Command as TaskCommand, PublishConfig, TaskConfig};
use crate::events::EventPayload;
use crate::registry::{Executor, Invocation, TaskContext};
use crate::tasks::get_task_color;
use crate::types::{PipewrightError, PipewrightResult};

/// Environment variable carrying the task's resolved configuration as JSON
pub const TASK_CONFIG_ENV: &str = "PIPEWRIGHT_TASK_CONFIG";
/// Environment variable carrying the leaf task name
pub const TASK_NAME_ENV: &str = "PIPEWRIGHT_TASK";

/// Spawns the configured command and waits for it to exit
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    command: Option<TaskCommand>,
    target_commands: HashMap<String, TaskCommand>,
    cwd: Option<String>,
    publish: Option<PublishConfig>,
}

impl CommandExecutor {
    pub fn new(command: TaskCommand) -> Self {
        Self {
            command: Some(command),
            target_commands: HashMap::new(),
            cwd: None,
            publish: None,
        }
    }

    pub fn from_task(task: &TaskConfig) -> Self {
        let target_commands = task
            .targets
            .iter()
            .flatten()
            .filter_map(|t| t.command.clone().map(|c| (t.name.clone(), c)))
            .collect();

        Self {
            command: task.command.clone(),
            target_commands,
            cwd: task.cwd.clone(),
            publish: task.publish.clone(),
        }
    }

    pub fn with_publish(mut self, publish: PublishConfig) -> Self {
        self.publish = Some(publish);
        self
    }

    /// Resolve the command line for an invocation into a program and its arguments
    fn command_line(
        &self,
        invocation: &Invocation<'_>,
        ctx: &TaskContext<'_>,
    ) -> PipewrightResult<(String, Vec<String>)> {
        let command = invocation
            .target
            .and_then(|target| self.target_commands.get(target))
            .or(self.command.as_ref())
            .ok_or_else(|| PipewrightError::Execution {
                task: invocation.name.to_string(),
                message: "no command to execute".to_string(),
            })?;

        match command {
            TaskCommand::Single(cmd) => {
                let resolved = render_argument(ctx.store.resolve(&Value::String(cmd.clone()))?);
                Ok(("sh".to_string(), vec!["-c".to_string(), resolved.join(" ")]))
            }
            TaskCommand::Multiple(parts) => {
                let mut args = Vec::new();
                for part in parts {
                    args.extend(render_argument(
                        ctx.store.resolve(&Value::String(part.clone()))?,
                    ));
                }
                if args.is_empty() {
                    return Err(PipewrightError::Execution {
                        task: invocation.name.to_string(),
                        message: "command is empty".to_string(),
                    });
                }
                let program = args.remove(0);
                Ok((program, args))
            }
        }
    }

    async fn publish_output(
        &self,
        publish: &PublishConfig,
        invocation: &Invocation<'_>,
        ctx: &TaskContext<'_>,
    ) -> PipewrightResult<()> {
        let path = ctx.root.join(&publish.file);
        let body = tokio::fs::read_to_string(&path).await.map_err(|e| {
            PipewrightError::Execution {
                task: invocation.name.to_string(),
                message: format!("Failed to read {} for publishing: {}", path.display(), e),
            }
        })?;

        ctx.events
            .emit(EventPayload {
                topic: publish.topic.clone(),
                source_task: invocation.name.to_string(),
                body,
            })
            .await
    }
}

#[async_trait]
impl Executor for CommandExecutor {
    fn kind(&self) -> &'static str {
        "command"
    }

    async fn execute(
        &self,
        invocation: &Invocation<'_>,
        ctx: &mut TaskContext<'_>,
    ) -> PipewrightResult<()> {
        let (program, args) = self.command_line(invocation, ctx)?;

        let working_dir = match &self.cwd {
            Some(cwd) => ctx.root.join(cwd),
            None => PathBuf::from(ctx.root),
        };

        debug!(task = invocation.name, %program, ?args, "spawning command");

        let mut command = Command::new(&program);
        command
            .args(&args)
            .current_dir(&working_dir)
            .envs(ctx.environment.vars())
            .env(TASK_NAME_ENV, invocation.name)
            .env(TASK_CONFIG_ENV, invocation.config.to_string());

        let status = command.status().await.map_err(|e| PipewrightError::Execution {
            task: invocation.name.to_string(),
            message: format!("Failed to execute command '{}': {}", program, e),
        })?;

        if !status.success() {
            return Err(PipewrightError::Execution {
                task: invocation.name.to_string(),
                message: format!(
                    "Command '{}' failed with exit code {}",
                    program,
                    status.code().unwrap_or(-1)
                ),
            });
        }

        if let Some(publish) = &self.publish {
            self.publish_output(publish, invocation, ctx).await?;
        }

        println!(
            "{} {}",
            "✓".green().bold(),
            format!("Completed {}", invocation.name).color(get_task_color(invocation.name))
        );
        Ok(())
    }
}

/// A resolved argument; arrays splice into several arguments
fn render_argument(value: Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s],
        Value::Null => Vec::new(),
        Value::Array(items) => items.into_iter().flat_map(render_argument).collect(),
        other => vec![other.to_string()],
    }
}
