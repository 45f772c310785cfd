//! Error types and handling for Switchboard Core

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Result type alias for Switchboard operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Switchboard Core
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Provider (LLM backend) errors
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Tool registry and execution errors
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    /// The selected provider could not be initialized or has been shut down
    #[error("Provider unavailable: {provider_id} ({reason})")]
    ProviderUnavailable { provider_id: String, reason: String },

    /// The caller aborted the turn
    #[error("Request cancelled")]
    Cancelled,

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for field '{field}': {value}")]
    InvalidValue { field: String, value: String },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid configuration format")]
    InvalidFormat,
}

/// Provider client errors
#[derive(Error, Debug, Clone)]
pub enum LlmError {
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    #[error("API error: {} - {body}", display_status(.status))]
    Api { status: Option<u16>, body: String },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Provider call timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("Invalid provider response: {message}")]
    InvalidResponse { message: String },
}

fn display_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => code.to_string(),
        None => "unknown status".to_string(),
    }
}

/// Tool registry and execution errors
#[derive(Error, Debug, Clone)]
pub enum ToolError {
    #[error("Tool not found: {name}")]
    NotFound { name: String },

    #[error("Tool execution failed: {name} - {message}")]
    ExecutionFailed { name: String, message: String },

    #[error("Invalid tool parameters: {message}")]
    InvalidParameters { message: String },

    #[error("Tool timeout: {name}")]
    Timeout { name: String },

    #[error("Tool name already registered: {name}")]
    NameConflict { name: String },
}

/// Provider initialization errors.
///
/// Cloneable because a single in-flight initialization result is shared by
/// every caller that raced on the same provider id.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InitError {
    #[error("no credential configured for provider '{provider_id}'")]
    MissingCredential { provider_id: String },

    #[error("connectivity probe failed for provider '{provider_id}': {message}")]
    ProbeFailed { provider_id: String, message: String },

    #[error("unknown provider '{provider_id}'")]
    UnknownProvider { provider_id: String },

    #[error("failed to build client for provider '{provider_id}': {message}")]
    Client { provider_id: String, message: String },

    #[error("client manager is shut down")]
    ShutDown,
}

/// Stable, caller-facing error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ToolNotFound,
    ToolExecutionError,
    ProviderUnavailable,
    ProviderError,
    NetworkError,
    Timeout,
    MalformedToolArguments,
    NameConflict,
    ConfigError,
    Cancelled,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ToolNotFound => "tool_not_found",
            ErrorKind::ToolExecutionError => "tool_execution_error",
            ErrorKind::ProviderUnavailable => "provider_unavailable",
            ErrorKind::ProviderError => "provider_error",
            ErrorKind::NetworkError => "network_error",
            ErrorKind::Timeout => "timeout",
            ErrorKind::MalformedToolArguments => "malformed_tool_arguments",
            ErrorKind::NameConflict => "name_conflict",
            ErrorKind::ConfigError => "config_error",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `{errorKind, message}` pair handed back to the external caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Failure {
    pub error_kind: ErrorKind,
    pub message: String,
}

impl LlmError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LlmError::Network { .. } => ErrorKind::NetworkError,
            LlmError::Timeout { .. } => ErrorKind::Timeout,
            LlmError::Authentication { .. }
            | LlmError::Api { .. }
            | LlmError::InvalidResponse { .. } => ErrorKind::ProviderError,
        }
    }
}

impl ToolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ToolError::NotFound { .. } => ErrorKind::ToolNotFound,
            ToolError::ExecutionFailed { .. } => ErrorKind::ToolExecutionError,
            ToolError::InvalidParameters { .. } => ErrorKind::MalformedToolArguments,
            ToolError::Timeout { .. } => ErrorKind::Timeout,
            ToolError::NameConflict { .. } => ErrorKind::NameConflict,
        }
    }
}

impl Error {
    /// Classify this error for the caller
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) => ErrorKind::ConfigError,
            Error::Llm(e) => e.kind(),
            Error::Tool(e) => e.kind(),
            Error::ProviderUnavailable { .. } => ErrorKind::ProviderUnavailable,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Http(e) if e.is_timeout() => ErrorKind::Timeout,
            Error::Http(_) => ErrorKind::NetworkError,
            Error::Io(_) | Error::Serialization(_) => ErrorKind::Internal,
        }
    }

    /// Render the error as the `{errorKind, message}` pair the caller consumes
    pub fn to_failure(&self) -> Failure {
        Failure {
            error_kind: self.kind(),
            message: self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_error_kinds() {
        let api = Error::from(LlmError::Api {
            status: Some(429),
            body: "slow down".to_string(),
        });
        assert_eq!(api.kind(), ErrorKind::ProviderError);
        assert!(api.to_string().contains("429"));
        assert!(api.to_string().contains("slow down"));

        let timeout = Error::from(LlmError::Timeout {
            after: Duration::from_secs(3),
        });
        assert_eq!(timeout.kind(), ErrorKind::Timeout);

        let network = Error::from(LlmError::Network {
            message: "connection reset".to_string(),
        });
        assert_eq!(network.kind(), ErrorKind::NetworkError);
    }

    #[test]
    fn test_failure_serializes_with_camel_case_keys() {
        let err = Error::ProviderUnavailable {
            provider_id: "qwen".to_string(),
            reason: "no credential".to_string(),
        };
        let failure = err.to_failure();
        assert_eq!(failure.error_kind, ErrorKind::ProviderUnavailable);

        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["errorKind"], "provider_unavailable");
        assert!(json["message"].as_str().unwrap().contains("qwen"));
    }

    #[test]
    fn test_api_error_without_status() {
        let err = LlmError::Api {
            status: None,
            body: "bad".to_string(),
        };
        assert_eq!(err.to_string(), "API error: unknown status - bad");
    }
}
