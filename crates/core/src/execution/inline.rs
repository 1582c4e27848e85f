//! Built-in inline tasks
//!
//! These run inside the runner process and act on the run context directly:
//! writing config values, loading them from a file, applying an environment
//! profile or checking a coverage report.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::configs::tasks::{CoverageCheckConfig, LoadConfig};
use crate::coverage::CoverageSummary;
use crate::registry::{Executor, Invocation, TaskContext};
use crate::types::{PipewrightError, PipewrightResult};

fn failure(invocation: &Invocation<'_>, message: String) -> PipewrightError {
    PipewrightError::Execution {
        task: invocation.name.to_string(),
        message,
    }
}

/// Writes fixed values (placeholders resolved) into the config store
pub struct SetConfigExecutor {
    values: BTreeMap<String, Value>,
}

impl SetConfigExecutor {
    pub fn new(values: BTreeMap<String, Value>) -> Self {
        Self { values }
    }
}

#[async_trait]
impl Executor for SetConfigExecutor {
    fn kind(&self) -> &'static str {
        "set"
    }

    async fn execute(
        &self,
        _invocation: &Invocation<'_>,
        ctx: &mut TaskContext<'_>,
    ) -> PipewrightResult<()> {
        for (key, value) in &self.values {
            let resolved = ctx.store.resolve(value)?;
            ctx.store.set(key.clone(), resolved);
        }
        Ok(())
    }
}

/// Reads a JSON or YAML document and copies selected values into the store
pub struct LoadConfigExecutor {
    load: LoadConfig,
}

impl LoadConfigExecutor {
    pub fn new(load: LoadConfig) -> Self {
        Self { load }
    }
}

/// Accept both JSON pointers (`/assets/js`) and dotted paths (`assets.js`)
fn to_pointer(selector: &str) -> String {
    if selector.is_empty() || selector.starts_with('/') {
        selector.to_string()
    } else {
        format!("/{}", selector.replace('.', "/"))
    }
}

fn parse_document(path: &Path, content: &str) -> PipewrightResult<Value> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => Ok(serde_json::from_str(content)?),
        Some("yml") | Some("yaml") => Ok(serde_yaml::from_str(content)?),
        _ => match serde_json::from_str(content) {
            Ok(value) => Ok(value),
            Err(_) => Ok(serde_yaml::from_str(content)?),
        },
    }
}

#[async_trait]
impl Executor for LoadConfigExecutor {
    fn kind(&self) -> &'static str {
        "load"
    }

    async fn execute(
        &self,
        invocation: &Invocation<'_>,
        ctx: &mut TaskContext<'_>,
    ) -> PipewrightResult<()> {
        let path = ctx.root.join(&self.load.file);
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| failure(invocation, format!("Failed to read {}: {}", path.display(), e)))?;
        let document = parse_document(&path, &content)
            .map_err(|e| failure(invocation, format!("Failed to parse {}: {}", path.display(), e)))?;

        for (key, selector) in &self.load.keys {
            let value = document.pointer(&to_pointer(selector)).ok_or_else(|| {
                failure(
                    invocation,
                    format!("'{}' not found in {}", selector, path.display()),
                )
            })?;
            ctx.store.set(key.clone(), value.clone());
        }

        info!(
            task = invocation.name,
            keys = self.load.keys.len(),
            file = %path.display(),
            "configuration loaded"
        );
        Ok(())
    }
}

/// Applies an environment profile.
///
/// With no fixed profile, the invocation's target names it (`env:test`).
pub struct EnvironmentExecutor {
    profile: Option<String>,
}

impl EnvironmentExecutor {
    pub fn new(profile: Option<String>) -> Self {
        Self { profile }
    }
}

#[async_trait]
impl Executor for EnvironmentExecutor {
    fn kind(&self) -> &'static str {
        "env"
    }

    async fn execute(
        &self,
        invocation: &Invocation<'_>,
        ctx: &mut TaskContext<'_>,
    ) -> PipewrightResult<()> {
        let name = self
            .profile
            .as_deref()
            .or(invocation.target)
            .ok_or_else(|| failure(invocation, "no environment profile named".to_string()))?;

        let profile = ctx.config.environment(name).ok_or_else(|| {
            failure(invocation, format!("environment profile '{}' is not declared", name))
        })?;

        ctx.environment.apply(profile, ctx.root, ctx.store)
    }
}

/// Fails when an lcov report is below its thresholds
pub struct CoverageCheckExecutor {
    check: CoverageCheckConfig,
}

impl CoverageCheckExecutor {
    pub fn new(check: CoverageCheckConfig) -> Self {
        Self { check }
    }
}

#[async_trait]
impl Executor for CoverageCheckExecutor {
    fn kind(&self) -> &'static str {
        "checkCoverage"
    }

    async fn execute(
        &self,
        invocation: &Invocation<'_>,
        ctx: &mut TaskContext<'_>,
    ) -> PipewrightResult<()> {
        let path = ctx.root.join(&self.check.report);
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| failure(invocation, format!("Failed to read {}: {}", path.display(), e)))?;
        let summary = CoverageSummary::parse_lcov(&content)?;

        info!(
            files = summary.files,
            lines = %format!("{:.2}%", summary.lines.percent()),
            functions = %format!("{:.2}%", summary.functions.percent()),
            branches = %format!("{:.2}%", summary.branches.percent()),
            "coverage summary"
        );

        let shortfalls = summary.check(&self.check);
        if shortfalls.is_empty() {
            Ok(())
        } else {
            Err(failure(invocation, shortfalls.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_store::ConfigStore;
    use crate::configs::pipeline::{EnvironmentConfig, PipelineConfig};
    use crate::environment::{Environment, ENVIRONMENT_KEY};
    use crate::events::EventBus;
    use serde_json::json;

    struct Fixture {
        root: tempfile::TempDir,
        store: ConfigStore,
        environment: Environment,
        events: EventBus,
        pipeline: PipelineConfig,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                root: tempfile::tempdir().unwrap(),
                store: ConfigStore::new(),
                environment: Environment::new(),
                events: EventBus::new(),
                pipeline: PipelineConfig {
                    environments: Some(vec![EnvironmentConfig {
                        name: "test".to_string(),
                        vars: Some(BTreeMap::from([(
                            "NODE_ENV".to_string(),
                            "test".to_string(),
                        )])),
                        env_file: None,
                    }]),
                    ..PipelineConfig::default()
                },
            }
        }

        async fn run(
            &mut self,
            executor: &dyn Executor,
            name: &str,
            target: Option<&str>,
        ) -> PipewrightResult<()> {
            let mut ctx = TaskContext {
                root: self.root.path(),
                store: &mut self.store,
                environment: &mut self.environment,
                events: &self.events,
                config: &self.pipeline,
            };
            let config = Value::Null;
            let invocation = Invocation {
                name,
                task: name.split(':').next().unwrap_or(name),
                target,
                config: &config,
            };
            executor.execute(&invocation, &mut ctx).await
        }
    }

    #[tokio::test]
    async fn test_set_resolves_placeholders() {
        let mut fixture = Fixture::new();
        fixture.store.set("dist", json!("public/dist"));
        let executor = SetConfigExecutor::new(BTreeMap::from([(
            "bundle".to_string(),
            json!("<%= dist %>/application.js"),
        )]));

        fixture.run(&executor, "setBundle", None).await.unwrap();
        assert_eq!(
            fixture.store.get("bundle"),
            Some(&json!("public/dist/application.js"))
        );
    }

    #[tokio::test]
    async fn test_load_copies_selected_values() {
        let mut fixture = Fixture::new();
        std::fs::write(
            fixture.root.path().join("assets.yml"),
            "assets:\n  js: [public/js/app.js]\n  css: [public/css/app.css]\n",
        )
        .unwrap();
        let executor = LoadConfigExecutor::new(LoadConfig {
            file: "assets.yml".to_string(),
            keys: BTreeMap::from([
                ("applicationJavaScriptFiles".to_string(), "/assets/js".to_string()),
                ("applicationCSSFiles".to_string(), "assets.css".to_string()),
            ]),
        });

        fixture.run(&executor, "loadConfig", None).await.unwrap();
        assert_eq!(
            fixture.store.get("applicationJavaScriptFiles"),
            Some(&json!(["public/js/app.js"]))
        );
        assert_eq!(
            fixture.store.get("applicationCSSFiles"),
            Some(&json!(["public/css/app.css"]))
        );
    }

    #[tokio::test]
    async fn test_load_missing_key_fails() {
        let mut fixture = Fixture::new();
        std::fs::write(fixture.root.path().join("assets.json"), r#"{"assets": {}}"#).unwrap();
        let executor = LoadConfigExecutor::new(LoadConfig {
            file: "assets.json".to_string(),
            keys: BTreeMap::from([("js".to_string(), "/assets/js".to_string())]),
        });

        let err = fixture.run(&executor, "loadConfig", None).await.unwrap_err();
        assert!(err.to_string().contains("'/assets/js' not found"));
    }

    #[tokio::test]
    async fn test_environment_from_target() {
        let mut fixture = Fixture::new();
        let executor = EnvironmentExecutor::new(None);

        fixture.run(&executor, "env:test", Some("test")).await.unwrap();
        assert_eq!(fixture.store.get(ENVIRONMENT_KEY), Some(&json!("test")));
        assert_eq!(fixture.environment.get("NODE_ENV"), Some("test"));

        let err = fixture
            .run(&executor, "env:staging", Some("staging"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("'staging' is not declared"));
    }

    #[tokio::test]
    async fn test_coverage_check() {
        let mut fixture = Fixture::new();
        std::fs::write(
            fixture.root.path().join("lcov.info"),
            "SF:a.js\nLF:10\nLH:7\nend_of_record\n",
        )
        .unwrap();
        let check = |lines| {
            CoverageCheckExecutor::new(CoverageCheckConfig {
                report: "lcov.info".to_string(),
                lines: Some(lines),
                functions: None,
                branches: None,
            })
        };

        fixture.run(&check(70.0), "check", None).await.unwrap();
        let err = fixture.run(&check(80.0), "check", None).await.unwrap_err();
        assert!(err.to_string().contains("lines coverage 70.00%"));
    }
}
