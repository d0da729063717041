use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("YAML error: {0}")]
    YamlEmit(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Plugin registry error in {path}: {message}")]
    PluginRegistry { path: PathBuf, message: String },

    #[error("Invalid agent definition: {0}")]
    Definition(#[from] DefinitionError),

    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    #[error("Plugin not found: {0}")]
    PluginNotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Agent {key} finished with status {status}")]
    AgentFailed { key: String, status: String },
}

impl SetupError {
    pub fn yaml(path: impl Into<PathBuf>, source: serde_yaml::Error) -> Self {
        Self::Yaml {
            path: path.into(),
            source,
        }
    }

    pub fn registry(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::PluginRegistry {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Violations of the agent definition invariants.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("agent name cannot be empty")]
    EmptyName,

    #[error("max_iterations must be at least 1 (got {0})")]
    MaxIterations(i64),

    #[error("timeout_seconds must be greater than 0 (got {0})")]
    Timeout(i64),
}

/// Failures resolving a module entry point to something callable.
#[derive(Error, Debug)]
pub enum ModuleLoadError {
    #[error("Agent module not found: {0}")]
    NotFound(String),

    #[error("Failed to load agent module {path}: {source}")]
    Library {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[error("Agent module {0} must export an 'execute' function")]
    MissingExecute(String),
}

pub type Result<T> = std::result::Result<T, SetupError>;
