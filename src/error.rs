//! Structured error types for configuration operations.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Error classes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Key is reserved or not a valid identifier.
    Name,
    /// Value (or factory argument) has a kind outside the permitted set.
    Type,
    /// Assignment or merge would create a reference cycle.
    Recursion,
    /// `update` source is neither a node nor a mapping.
    Value,
    /// A configuration file could not be read.
    Io,
    /// JSON, YAML or settings-script text could not be parsed.
    Parse,
}

/// Errors raised by the configuration engine.
///
/// Every variant is raised before the target node is touched, so a failed
/// operation leaves the node's visible state as it was.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("attribute key not allowed to start with '_': {0}")]
    ReservedName(String),

    #[error("invalid attribute name {0:?}")]
    InvalidName(String),

    #[error("unsupported value type: {0}")]
    UnsupportedType(String),

    #[error("expected a mapping, got {0}")]
    NotAMapping(String),

    #[error("cannot assign recursively ({context})")]
    RecursiveAssignment { context: String },

    #[error("cannot update from {0}")]
    InvalidUpdateSource(String),

    #[error("unable to load configuration file `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("settings script error at {line}:{column}: {message}")]
    Script {
        line: usize,
        column: usize,
        message: String,
    },
}

impl ConfigError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConfigError::ReservedName(_) | ConfigError::InvalidName(_) => ErrorKind::Name,
            ConfigError::UnsupportedType(_) | ConfigError::NotAMapping(_) => ErrorKind::Type,
            ConfigError::RecursiveAssignment { .. } => ErrorKind::Recursion,
            ConfigError::InvalidUpdateSource(_) => ErrorKind::Value,
            ConfigError::Io { .. } => ErrorKind::Io,
            ConfigError::Json(_) | ConfigError::Yaml(_) | ConfigError::Script { .. } => {
                ErrorKind::Parse
            }
        }
    }

    pub(crate) fn recursive(key: &str) -> Self {
        ConfigError::RecursiveAssignment {
            context: format!("key `{key}`"),
        }
    }

    pub(crate) fn recursive_update() -> Self {
        ConfigError::RecursiveAssignment {
            context: "update".to_string(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn script(line: usize, column: usize, message: impl Into<String>) -> Self {
        ConfigError::Script {
            line,
            column,
            message: message.into(),
        }
    }
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
