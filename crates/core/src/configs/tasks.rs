use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{PipewrightError, PipewrightResult};

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Command {
    Single(String),
    Multiple(Vec<String>),
}

/// Publish a file produced by a command on the event bus once the command succeeds
#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PublishConfig {
    pub topic: String,
    pub file: String,
}

/// Copy values out of a JSON or YAML file into the config store
#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LoadConfig {
    pub file: String,
    /// Store key -> JSON pointer into the loaded document (e.g. "/assets/js")
    pub keys: BTreeMap<String, String>,
}

/// Minimum percentages an lcov report must reach
#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CoverageCheckConfig {
    pub report: String,
    pub lines: Option<f64>,
    pub functions: Option<f64>,
    pub branches: Option<f64>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TargetConfig {
    pub name: String,
    pub description: Option<String>,
    pub command: Option<Command>,
    pub config: Option<Value>,
    pub options: Option<Value>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TaskConfig {
    pub name: String,
    pub description: Option<String>,
    pub alias: Option<Vec<String>>,
    pub command: Option<Command>,
    pub cwd: Option<String>,
    pub config: Option<Value>,
    pub options: Option<Value>,
    pub targets: Option<Vec<TargetConfig>>,
    pub publish: Option<PublishConfig>,
    pub set: Option<BTreeMap<String, Value>>,
    pub load: Option<LoadConfig>,
    pub env: Option<String>,
    pub check_coverage: Option<CoverageCheckConfig>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TasksFileConfig {
    pub name: Option<String>,
    pub description: Option<String>,
    pub tasks: Vec<TaskConfig>,
}

/// The validated shape of a task declaration
#[derive(Debug, Clone, PartialEq)]
pub enum TaskKind {
    Alias(Vec<String>),
    Command {
        command: Option<Command>,
        cwd: Option<String>,
        publish: Option<PublishConfig>,
    },
    Set(BTreeMap<String, Value>),
    Load(LoadConfig),
    Environment(String),
    CoverageCheck(CoverageCheckConfig),
}

impl TaskKind {
    pub fn label(&self) -> &'static str {
        match self {
            TaskKind::Alias(_) => "alias",
            TaskKind::Command { .. } => "command",
            TaskKind::Set(_) => "set",
            TaskKind::Load(_) => "load",
            TaskKind::Environment(_) => "env",
            TaskKind::CoverageCheck(_) => "checkCoverage",
        }
    }
}

impl TaskConfig {
    /// Validate that exactly one task kind is declared and return it
    pub fn kind(&self) -> PipewrightResult<TaskKind> {
        let mut kinds = Vec::new();

        if let Some(members) = &self.alias {
            kinds.push(TaskKind::Alias(members.clone()));
        }
        // A command may live on the task or on every target
        let has_target_commands = self
            .targets
            .as_ref()
            .is_some_and(|targets| !targets.is_empty() && targets.iter().all(|t| t.command.is_some()));
        if self.command.is_some() || has_target_commands {
            kinds.push(TaskKind::Command {
                command: self.command.clone(),
                cwd: self.cwd.clone(),
                publish: self.publish.clone(),
            });
        }
        if let Some(values) = &self.set {
            kinds.push(TaskKind::Set(values.clone()));
        }
        if let Some(load) = &self.load {
            kinds.push(TaskKind::Load(load.clone()));
        }
        if let Some(profile) = &self.env {
            kinds.push(TaskKind::Environment(profile.clone()));
        }
        if let Some(check) = &self.check_coverage {
            kinds.push(TaskKind::CoverageCheck(check.clone()));
        }

        if kinds.len() != 1 {
            let found = kinds.iter().map(TaskKind::label).collect::<Vec<_>>();
            return Err(PipewrightError::Config(format!(
                "Task '{}' must declare exactly one of alias, command, set, load, env or checkCoverage (found: [{}])",
                self.name,
                found.join(", ")
            )));
        }

        let kind = kinds.remove(0);

        if !matches!(kind, TaskKind::Command { .. })
            && (self.targets.is_some() || self.publish.is_some() || self.cwd.is_some())
        {
            return Err(PipewrightError::Config(format!(
                "Task '{}' is a '{}' task; targets, publish and cwd only apply to command tasks",
                self.name,
                kind.label()
            )));
        }

        if let Some(targets) = &self.targets {
            let mut seen = std::collections::HashSet::new();
            for target in targets {
                if !seen.insert(target.name.as_str()) {
                    return Err(PipewrightError::Config(format!(
                        "Task '{}' declares target '{}' more than once",
                        self.name, target.name
                    )));
                }
                if self.command.is_none() && target.command.is_none() {
                    return Err(PipewrightError::Config(format!(
                        "Target '{}:{}' has no command to execute",
                        self.name, target.name
                    )));
                }
            }
        }

        Ok(kind)
    }

    /// Names of the declared targets, in declaration order
    pub fn target_names(&self) -> Vec<String> {
        self.targets
            .as_ref()
            .map(|targets| targets.iter().map(|t| t.name.clone()).collect())
            .unwrap_or_default()
    }

    /// The value seeded into the config store under this task's name.
    ///
    /// Multi-target tasks are stored as `{ options, <target>: { ... } }`.
    pub fn store_value(&self) -> Option<Value> {
        match &self.targets {
            Some(targets) if !targets.is_empty() => {
                let mut map = serde_json::Map::new();
                if let Some(options) = &self.options {
                    map.insert("options".to_string(), options.clone());
                }
                for target in targets {
                    let mut target_value = match &target.config {
                        Some(Value::Object(obj)) => obj.clone(),
                        Some(other) => {
                            let mut obj = serde_json::Map::new();
                            obj.insert("value".to_string(), other.clone());
                            obj
                        }
                        None => serde_json::Map::new(),
                    };
                    if let Some(options) = &target.options {
                        target_value.insert("options".to_string(), options.clone());
                    }
                    map.insert(target.name.clone(), Value::Object(target_value));
                }
                Some(Value::Object(map))
            }
            _ => match (&self.config, &self.options) {
                (None, None) => None,
                (Some(Value::Object(obj)), Some(options)) => {
                    let mut obj = obj.clone();
                    obj.insert("options".to_string(), options.clone());
                    Some(Value::Object(obj))
                }
                (None, Some(options)) => {
                    let mut obj = serde_json::Map::new();
                    obj.insert("options".to_string(), options.clone());
                    Some(Value::Object(obj))
                }
                (Some(config), _) => Some(config.clone()),
            },
        }
    }
}

pub fn parse_tasks_config(yaml_str: &str) -> PipewrightResult<TasksFileConfig> {
    let config: TasksFileConfig = serde_yaml::from_str(yaml_str)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_alias_and_command_tasks() {
        let config = parse_tasks_config(
            r#"
tasks:
  - name: lint
    alias: [jshint, csslint]
  - name: uglify
    command: ["uglifyjs", "public/dist/application.js"]
    options:
      mangle: false
"#,
        )
        .unwrap();

        assert_eq!(config.tasks.len(), 2);
        assert_eq!(
            config.tasks[0].kind().unwrap(),
            TaskKind::Alias(vec!["jshint".to_string(), "csslint".to_string()])
        );
        assert!(matches!(
            config.tasks[1].kind().unwrap(),
            TaskKind::Command { .. }
        ));
        assert_eq!(
            config.tasks[1].store_value(),
            Some(json!({ "options": { "mangle": false } }))
        );
    }

    #[test]
    fn test_kind_rejects_multiple_kinds() {
        let config = parse_tasks_config(
            r#"
tasks:
  - name: broken
    alias: [a]
    env: test
"#,
        )
        .unwrap();

        let err = config.tasks[0].kind().unwrap_err();
        assert!(err.to_string().contains("exactly one"));
        assert!(err.to_string().contains("alias, env"));
    }

    #[test]
    fn test_kind_rejects_empty_task() {
        let config = parse_tasks_config("tasks:\n  - name: nothing\n").unwrap();
        assert!(config.tasks[0].kind().is_err());
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let result = parse_tasks_config("tasks:\n  - name: a\n    comand: echo\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_multi_target_store_value() {
        let config = parse_tasks_config(
            r#"
tasks:
  - name: jshint
    command: jshint
    options:
      jshintrc: true
    targets:
      - name: all
        config:
          src: ["public/js/*.js"]
      - name: allTests
        config:
          src: ["public/modules/**/tests/*.js"]
        options:
          quiet: true
"#,
        )
        .unwrap();

        let task = &config.tasks[0];
        assert_eq!(task.target_names(), vec!["all", "allTests"]);
        assert_eq!(
            task.store_value(),
            Some(json!({
                "options": { "jshintrc": true },
                "all": { "src": ["public/js/*.js"] },
                "allTests": {
                    "src": ["public/modules/**/tests/*.js"],
                    "options": { "quiet": true }
                }
            }))
        );
    }

    #[test]
    fn test_targets_require_command() {
        let config = parse_tasks_config(
            r#"
tasks:
  - name: karma
    targets:
      - name: unit
        command: "karma start"
      - name: e2e
"#,
        )
        .unwrap();

        // Not every target has a command, so no kind can be inferred
        assert!(config.tasks[0].kind().is_err());
    }

    #[test]
    fn test_duplicate_targets_rejected() {
        let config = parse_tasks_config(
            r#"
tasks:
  - name: karma
    command: karma
    targets:
      - name: unit
      - name: unit
"#,
        )
        .unwrap();

        let err = config.tasks[0].kind().unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }
}
