//! Typed error hierarchy for the telephone experiment.
//!
//! Only lookup failures (`ContextError`) and configuration failures
//! (`ConfigError`) are meant to reach the caller. `GenerationError` is
//! absorbed by [`crate::generation::generate_or_fallback`] and evaluator
//! parse failures never produce an error at all.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from the context registry.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("Context '{name}' not found. Available contexts: {}", .available.join(", "))]
    NotFound {
        name: String,
        available: Vec<String>,
    },
}

/// Fatal configuration errors, raised before any generation call is made.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("max_iterations must be at least 1, got {0}")]
    InvalidMaxIterations(u32),

    #[error("{field} must be a finite, non-negative number, got {value}")]
    InvalidTemperature { field: &'static str, value: f64 },

    #[error("timeout_secs must be at least 1")]
    InvalidTimeout,

    #[error("Unknown generator backend '{0}'. Valid values: fallback, command, http")]
    UnknownBackend(String),

    #[error("Generator backend could not be initialised: {0}")]
    BackendInit(#[source] GenerationError),

    #[error("Failed to read config file at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Failures of a single text-generation call.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Failed to spawn generator process '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Generator I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generator exited with non-zero code {exit_code}: {stderr}")]
    NonZeroExit { exit_code: i32, stderr: String },

    #[error("Generation timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend returned status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Backend returned an empty completion")]
    EmptyResponse,
}

/// Errors from rendering a conversation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConversationError {
    #[error("Telephone conversation has no exchanges to render")]
    Empty,
}

/// Errors from writing experiment reports.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write report file at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize results: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_not_found_lists_available_names() {
        let err = ContextError::NotFound {
            name: "martian".to_string(),
            available: vec!["isolation".to_string(), "embodied_positive".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("'martian'"));
        assert!(msg.contains("isolation, embodied_positive"));
    }

    #[test]
    fn config_error_max_iterations_carries_value() {
        let err = ConfigError::InvalidMaxIterations(0);
        match &err {
            ConfigError::InvalidMaxIterations(n) => assert_eq!(*n, 0),
            _ => panic!("Expected InvalidMaxIterations"),
        }
        assert!(err.to_string().contains("at least 1"));
    }

    #[test]
    fn generation_error_spawn_failed_is_matchable() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such program");
        let err = GenerationError::Spawn {
            command: "missing-llm".to_string(),
            source: io_err,
        };
        match &err {
            GenerationError::Spawn { command, source } => {
                assert_eq!(command, "missing-llm");
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            _ => panic!("Expected Spawn variant"),
        }
    }

    #[test]
    fn generation_error_timeout_mentions_seconds() {
        let err = GenerationError::Timeout { secs: 30 };
        assert!(err.to_string().contains("30s"));
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&ConversationError::Empty);
        assert_std_error(&ConfigError::InvalidTimeout);
        assert_std_error(&GenerationError::EmptyResponse);
        assert_std_error(&ContextError::NotFound {
            name: "x".into(),
            available: vec![],
        });
    }
}
