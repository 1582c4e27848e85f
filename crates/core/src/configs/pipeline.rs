use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::types::PipewrightResult;

pub const DEFAULT_TASK: &str = "default";

#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PipelineConfig {
    pub name: Option<String>,
    pub description: Option<String>,
    pub options: Option<PipelineOptions>,
    /// Values seeded into the config store before any task runs
    pub config: Option<BTreeMap<String, serde_json::Value>>,
    pub environments: Option<Vec<EnvironmentConfig>>,
    pub watch: Option<Vec<WatchGroupConfig>>,
    pub events: Option<Vec<ListenerConfig>>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PipelineOptions {
    /// Keep running after a task fails. Failures are still reported.
    pub force: Option<bool>,
    /// Task run when none is given on the command line
    pub default_task: Option<String>,
}

/// A named bundle of environment variables, optionally backed by a dotenv secrets file
#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EnvironmentConfig {
    pub name: String,
    pub vars: Option<BTreeMap<String, String>>,
    pub env_file: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WatchGroupConfig {
    pub name: String,
    /// Glob patterns relative to the workspace root
    pub files: Vec<String>,
    pub tasks: Vec<String>,
    pub debounce_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ListenerConfig {
    pub topic: String,
    pub upload: Option<UploadConfig>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UploadConfig {
    pub url: String,
    /// Name of the environment variable holding the repository token
    pub token_env: Option<String>,
    pub service_name: Option<String>,
}

impl PipelineConfig {
    pub fn force(&self) -> bool {
        self.options
            .as_ref()
            .and_then(|o| o.force)
            .unwrap_or(false)
    }

    pub fn default_task(&self) -> &str {
        self.options
            .as_ref()
            .and_then(|o| o.default_task.as_deref())
            .unwrap_or(DEFAULT_TASK)
    }

    pub fn environment(&self, name: &str) -> Option<&EnvironmentConfig> {
        self.environments
            .as_ref()
            .and_then(|envs| envs.iter().find(|e| e.name == name))
    }
}

pub fn parse_pipeline_config(yaml_str: &str) -> PipewrightResult<PipelineConfig> {
    let config: PipelineConfig = serde_yaml::from_str(yaml_str)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_options_missing() {
        let config = parse_pipeline_config("name: web\n").unwrap();
        assert!(!config.force());
        assert_eq!(config.default_task(), "default");
        assert!(config.environment("test").is_none());
    }

    #[test]
    fn test_parse_full_pipeline() {
        let config = parse_pipeline_config(
            r#"
name: web
options:
  force: true
  defaultTask: build
config:
  dist: public/dist
environments:
  - name: test
    vars:
      NODE_ENV: test
    envFile: /opt/deploy/.env
watch:
  - name: clientViews
    files: ["public/modules/**/views/**/*.html"]
    tasks: ["html2js:main"]
events:
  - topic: coverage
    upload:
      url: https://coveralls.io/api/v1/jobs
      tokenEnv: COVERALLS_REPO_TOKEN
"#,
        )
        .unwrap();

        assert!(config.force());
        assert_eq!(config.default_task(), "build");
        assert_eq!(
            config.config.as_ref().unwrap()["dist"],
            serde_json::Value::String("public/dist".to_string())
        );
        let test_env = config.environment("test").unwrap();
        assert_eq!(test_env.env_file.as_deref(), Some("/opt/deploy/.env"));
        assert_eq!(config.watch.as_ref().unwrap()[0].tasks, vec!["html2js:main"]);
        let upload = config.events.as_ref().unwrap()[0].upload.as_ref().unwrap();
        assert_eq!(upload.token_env.as_deref(), Some("COVERALLS_REPO_TOKEN"));
    }
}
