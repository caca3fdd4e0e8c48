//! Error types for adaptor operations

use serde_json::Value;
use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias used by every operation
pub type Result<T> = std::result::Result<T, AdaptorError>;

/// Errors that can halt a pipeline run
#[derive(Debug, Error)]
pub enum AdaptorError {
    /// Local filesystem access failed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The remote system answered, but reported errors in its payload
    #[error("{system} reported {} error(s): {}", errors.len(), summarize(errors))]
    Remote { system: String, errors: Vec<Value> },

    /// The request to the remote system could not be completed
    #[error("request to {system} failed: {source}")]
    Http {
        system: String,
        #[source]
        source: reqwest::Error,
    },

    /// Malformed input rejected by a parser
    #[error("failed to parse {what}: {source}")]
    Parse {
        what: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A state reference could not be parsed or resolved
    #[error("invalid reference '{path}': {reason}")]
    Reference { path: String, reason: String },

    /// Missing or malformed configuration
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A blocking task panicked or was cancelled
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl AdaptorError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AdaptorError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn remote(system: impl Into<String>, errors: Vec<Value>) -> Self {
        AdaptorError::Remote {
            system: system.into(),
            errors,
        }
    }

    pub fn http(system: impl Into<String>, source: reqwest::Error) -> Self {
        AdaptorError::Http {
            system: system.into(),
            source,
        }
    }

    pub fn parse<E>(what: impl Into<String>, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        AdaptorError::Parse {
            what: what.into(),
            source: source.into(),
        }
    }

    pub fn reference(path: impl Into<String>, reason: impl Into<String>) -> Self {
        AdaptorError::Reference {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether this failure came from a remote system (payload or transport)
    pub fn is_remote(&self) -> bool {
        matches!(self, AdaptorError::Remote { .. } | AdaptorError::Http { .. })
    }
}

fn summarize(errors: &[Value]) -> String {
    errors
        .iter()
        .map(|e| match e.get("message").and_then(Value::as_str) {
            Some(message) => message.to_string(),
            None => e.to_string(),
        })
        .collect::<Vec<_>>()
        .join("; ")
}
