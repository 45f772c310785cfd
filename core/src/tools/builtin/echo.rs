//! Echo tool

use crate::error::ToolError;
use crate::tools::{Tool, ToolCall, ToolExample};
use async_trait::async_trait;
use serde_json::json;

/// Returns its input unchanged. Useful for checking a provider's tool wiring.
pub struct EchoTool;

impl EchoTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EchoTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo the given text back verbatim."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "description": "Text to echo back"
                }
            },
            "required": ["text"]
        })
    }

    async fn execute(&self, call: &ToolCall) -> Result<String, ToolError> {
        call.get_parameter("text")
    }

    fn examples(&self) -> Vec<ToolExample> {
        vec![ToolExample {
            description: "Echo a greeting".to_string(),
            arguments: json!({"text": "hello"}),
            expected_result: "hello".to_string(),
        }]
    }
}
