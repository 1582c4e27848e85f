//! Environment profiles
//!
//! A profile is a named set of variables, optionally extended by a dotenv
//! secrets file. Applying one makes the variables visible to every command
//! spawned afterwards and records a marker in the config store.

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::Value;
use tracing::{debug, warn};

use crate::config_store::ConfigStore;
use crate::configs::pipeline::EnvironmentConfig;
use crate::types::{PipewrightError, PipewrightResult};

/// Store key holding the name of the applied profile
pub const ENVIRONMENT_KEY: &str = "environment";

/// Variables passed to spawned commands on top of the inherited process environment
#[derive(Debug, Clone, Default)]
pub struct Environment {
    profile: Option<String>,
    vars: BTreeMap<String, String>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn profile(&self) -> Option<&str> {
        self.profile.as_deref()
    }

    pub fn vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Apply a profile: merge its variables (file first, then inline vars) and
    /// publish them to the store as `environment` and `env.<VAR>`.
    pub fn apply(
        &mut self,
        profile: &EnvironmentConfig,
        root: &Path,
        store: &mut ConfigStore,
    ) -> PipewrightResult<()> {
        let mut applied = BTreeMap::new();

        if let Some(env_file) = &profile.env_file {
            let path = root.join(env_file);
            if path.exists() {
                let content = std::fs::read_to_string(&path).map_err(|e| {
                    PipewrightError::Config(format!(
                        "Failed to read env file {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                applied.extend(parse_env_file(&content).map_err(|e| {
                    PipewrightError::Config(format!("{}: {}", path.display(), e))
                })?);
            } else {
                warn!(
                    profile = %profile.name,
                    path = %path.display(),
                    "env file not found, skipping"
                );
            }
        }

        if let Some(vars) = &profile.vars {
            applied.extend(vars.clone());
        }

        for (name, value) in &applied {
            store.set(format!("env.{}", name), Value::String(value.clone()));
        }
        store.set(ENVIRONMENT_KEY, Value::String(profile.name.clone()));

        debug!(profile = %profile.name, vars = applied.len(), "environment applied");
        self.vars.extend(applied);
        self.profile = Some(profile.name.clone());
        Ok(())
    }
}

/// Parse dotenv-style `KEY=value` lines.
///
/// Blank lines and `#` comments are skipped, an optional `export ` prefix is
/// accepted and matching surrounding quotes are stripped.
pub fn parse_env_file(content: &str) -> Result<BTreeMap<String, String>, String> {
    let mut vars = BTreeMap::new();

    for (index, raw_line) in content.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);

        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| format!("line {}: expected KEY=value", index + 1))?;
        let key = key.trim();
        if key.is_empty() || key.contains(char::is_whitespace) {
            return Err(format!("line {}: invalid variable name '{}'", index + 1, key));
        }

        let value = value.trim();
        let value = ['"', '\'']
            .iter()
            .find_map(|quote| {
                value
                    .strip_prefix(*quote)
                    .and_then(|v| v.strip_suffix(*quote))
            })
            .unwrap_or(value);

        vars.insert(key.to_string(), value.to_string());
    }

    Ok(vars)
}
