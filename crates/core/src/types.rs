use thiserror::Error;

/// The main error type for Pipewright operations
#[derive(Debug, Error)]
pub enum PipewrightError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown task '{name}'{}", describe_referrer(.referenced_by))]
    UnknownTask {
        name: String,
        referenced_by: Option<String>,
    },

    #[error("Cyclic alias detected: {cycle}")]
    CyclicAlias { cycle: String },

    #[error("Task '{task}' failed: {message}")]
    Execution { task: String, message: String },

    #[error("Integration error: {0}")]
    Integration(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("File watch error: {0}")]
    Watch(#[from] notify::Error),
}

impl PipewrightError {
    /// Whether the error is discovered before any task runs
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::UnknownTask { .. } | Self::CyclicAlias { .. } | Self::Yaml(_)
        )
    }

    /// The message recorded for a failed task, without repeating the task name
    pub fn failure_message(&self) -> String {
        match self {
            Self::Execution { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

fn describe_referrer(referenced_by: &Option<String>) -> String {
    referenced_by
        .as_ref()
        .map(|alias| format!(" (referenced by '{}')", alias))
        .unwrap_or_default()
}

/// Result type alias for Pipewright operations
pub type PipewrightResult<T> = Result<T, PipewrightError>;
