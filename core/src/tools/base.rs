//! Base tool traits and structures

use crate::error::{ErrorKind, ToolError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named capability with a parameter schema and an executor
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the name of the tool
    fn name(&self) -> &str;

    /// Get the description of the tool
    fn description(&self) -> &str;

    /// Get the JSON schema for the tool's parameters
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool and return its output text
    async fn execute(&self, call: &ToolCall) -> Result<String, ToolError>;

    /// Get examples of how to use this tool
    fn examples(&self) -> Vec<ToolExample> {
        Vec::new()
    }
}

/// A model-issued request to invoke a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this tool call
    pub id: String,

    /// Name of the tool to call
    pub name: String,

    /// Arguments to pass to the tool (a JSON object when well-formed)
    pub arguments: serde_json::Value,
}

/// Result of a tool execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// ID of the tool call this is a result for
    pub tool_call_id: String,

    /// Name of the tool that was called
    pub name: String,

    /// Whether the execution was successful
    pub success: bool,

    /// Output text, or the rendered error
    pub content: String,

    /// Error classification when `success` is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,

    /// Execution duration in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// Example usage of a tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolExample {
    /// Description of what this example does
    pub description: String,

    /// Example arguments
    pub arguments: serde_json::Value,

    /// Expected result description
    pub expected_result: String,
}

impl ToolCall {
    /// Create a new tool call with a generated id
    pub fn new<S: Into<String>>(name: S, arguments: serde_json::Value) -> Self {
        Self {
            id: format!("call_{}", Uuid::new_v4().simple()),
            name: name.into(),
            arguments,
        }
    }

    /// Replace the generated id
    pub fn with_id<S: Into<String>>(mut self, id: S) -> Self {
        self.id = id.into();
        self
    }

    /// Get a required argument by key
    pub fn get_parameter<T>(&self, key: &str) -> Result<T, ToolError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let value = self
            .arguments
            .get(key)
            .ok_or_else(|| ToolError::InvalidParameters {
                message: format!("Missing parameter: {}", key),
            })?;

        serde_json::from_value(value.clone()).map_err(|_| ToolError::InvalidParameters {
            message: format!("Invalid parameter type for: {}", key),
        })
    }

    /// Get an optional argument; absent and `null` both map to `None`
    pub fn get_optional_parameter<T>(&self, key: &str) -> Result<Option<T>, ToolError>
    where
        T: for<'de> Deserialize<'de>,
    {
        match self.arguments.get(key) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(_) => self.get_parameter(key).map(Some),
        }
    }

    /// Get an argument with a default
    pub fn get_parameter_or<T>(&self, key: &str, default: T) -> T
    where
        T: for<'de> Deserialize<'de>,
    {
        self.get_parameter(key).unwrap_or(default)
    }
}

impl ToolResult {
    /// Create a successful result
    pub fn success<S: Into<String>>(call: &ToolCall, output: S) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            success: true,
            content: output.into(),
            error_kind: None,
            duration_ms: None,
        }
    }

    /// Create an error result
    pub fn error(call: &ToolCall, error: &ToolError) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            success: false,
            content: format!("Error: {}", error),
            error_kind: Some(error.kind()),
            duration_ms: None,
        }
    }

    /// Set execution duration
    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }
}
