// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error types for agentmeter.
//!
//! Only errors raised by an instrumented callable ever reach the caller. The
//! remaining categories (configuration, extraction, sink transport) are contained
//! inside the instrumentation layer and surface as log events instead.

use thiserror::Error;

/// Errors returned by an agent invocation.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("User cancelled operation")]
    UserCancelled,
}

/// Errors that can occur during tool execution.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),
}

/// Errors that can occur while loading telemetry configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("IO error reading config: {0}")]
    IoError(String),

    #[error("YAML parsing error: {0}")]
    YamlError(String),

    #[error("JSON parsing error: {0}")]
    JsonError(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(err.to_string()),
            _ => Self::IoError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::YamlError(err.to_string())
    }
}

/// Errors raised while handing measurements to a metrics backend.
///
/// The sink adapter logs and discards these.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Backend rejected submission: {message}")]
    Rejected {
        message: String,
        status_code: Option<u16>,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Client not configured: {0}")]
    NotConfigured(String),
}

impl SinkError {
    /// Check if retrying the submission could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Rejected { status_code, .. } => {
                matches!(status_code, Some(408) | Some(429) | Some(500..=599))
            }
            _ => false,
        }
    }
}

impl From<std::io::Error> for SinkError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<reqwest::Error> for SinkError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::Rejected {
                message: err.to_string(),
                status_code: Some(status.as_u16()),
            },
            None => Self::Transport(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for SinkError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Errors raised by attribute extractors when a value lacks the expected shape.
///
/// The wrapper swallows these and records no attributes for the call.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Could not serialize value for inspection: {0}")]
    Serialize(String),

    #[error("Unexpected shape: {0}")]
    Shape(String),
}

impl From<serde_json::Error> for ExtractionError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialize(err.to_string())
    }
}

/// Result type alias using anyhow for flexible error handling.
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_error_retryable() {
        assert!(SinkError::Transport("connection refused".to_string()).is_retryable());
        assert!(SinkError::Rejected {
            message: "slow down".to_string(),
            status_code: Some(429),
        }
        .is_retryable());
        assert!(!SinkError::Rejected {
            message: "forbidden".to_string(),
            status_code: Some(403),
        }
        .is_retryable());
        assert!(!SinkError::NotConfigured("no api key".to_string()).is_retryable());
    }

    #[test]
    fn test_config_error_from_json() {
        let result: std::result::Result<serde_json::Value, _> = serde_json::from_str("invalid json");
        let config_err: ConfigError = result.unwrap_err().into();
        assert!(matches!(config_err, ConfigError::JsonError(_)));
    }

    #[test]
    fn test_config_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let config_err: ConfigError = io_err.into();
        assert!(matches!(config_err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_agent_error_from_tool() {
        let agent_err: AgentError = ToolError::NotFound("search".to_string()).into();
        assert!(matches!(agent_err, AgentError::Tool(_)));
        assert_eq!(agent_err.to_string(), "Tool error: Tool not found: search");
    }
}
