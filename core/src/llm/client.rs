//! Provider client trait and response structures

use crate::error::LlmError;
use crate::tools::ToolCall;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::message::Conversation;

/// One backend model provider behind a uniform `generate` operation
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Provider id this client was built for (e.g. "claude")
    fn provider_id(&self) -> &str;

    /// Get the model name
    fn model_name(&self) -> &str;

    /// Models this client can serve
    fn supported_models(&self) -> Vec<String> {
        vec![self.model_name().to_string()]
    }

    /// Run one completion over the conversation.
    ///
    /// `tools` is the provider-neutral schema list; `None` means the request
    /// carries no tool declarations at all.
    async fn generate(
        &self,
        conversation: &Conversation,
        tools: Option<&[ToolDefinition]>,
        options: &GenerateOptions,
    ) -> Result<Generation, LlmError>;

    /// Connectivity check run before the client is handed out
    async fn probe(&self) -> Result<(), LlmError> {
        Ok(())
    }

    /// Release transport resources
    async fn close(&self) -> Result<(), LlmError> {
        Ok(())
    }
}

/// Result of a single `generate` call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    /// Text the model produced (may be empty when it only calls tools)
    pub text: String,

    /// Tool calls requested by the model, in the order it issued them
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,

    /// Usage statistics
    pub usage: Option<Usage>,

    /// Finish reason
    pub finish_reason: Option<FinishReason>,
}

impl Generation {
    /// A plain text answer
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self {
            text: text.into(),
            finish_reason: Some(FinishReason::Stop),
            ..Self::default()
        }
    }

    /// An answer requesting tool calls
    pub fn with_tool_calls<S: Into<String>>(text: S, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            text: text.into(),
            tool_calls,
            finish_reason: Some(FinishReason::ToolCalls),
            ..Self::default()
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Usage statistics for a request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Number of tokens in the prompt
    pub prompt_tokens: u32,

    /// Number of tokens in the completion
    pub completion_tokens: u32,

    /// Total number of tokens
    pub total_tokens: u32,
}

impl std::ops::AddAssign for Usage {
    fn add_assign(&mut self, other: Self) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// Reason why generation finished
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Generation completed naturally
    Stop,

    /// Hit the maximum token limit
    Length,

    /// Model decided to call a tool
    ToolCalls,

    /// Content was filtered
    ContentFilter,

    /// Other reason
    Other(String),
}

/// Provider-neutral tool schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Name of the tool
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON schema for the tool parameters, snake_case property names
    pub parameters: serde_json::Value,
}

/// Per-call options for `generate`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateOptions {
    /// Tool choice strategy
    pub tool_choice: ToolChoice,

    /// Override the provider's configured max tokens
    pub max_tokens: Option<u32>,

    /// Override the provider's configured temperature
    pub temperature: Option<f32>,
}

impl GenerateOptions {
    /// Let the model decide whether to call tools
    pub fn auto() -> Self {
        Self::default()
    }

    /// Forbid tool calls
    pub fn no_tools() -> Self {
        Self {
            tool_choice: ToolChoice::None,
            ..Self::default()
        }
    }
}

/// Tool choice strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    /// Let the model decide
    #[default]
    Auto,

    /// Never use tools
    None,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_usage_accumulates() {
        let mut total = Usage::default();
        total += Usage {
            prompt_tokens: 10,
            completion_tokens: 2,
            total_tokens: 12,
        };
        total += Usage {
            prompt_tokens: 20,
            completion_tokens: 3,
            total_tokens: 23,
        };
        assert_eq!(total.total_tokens, 35);
        assert_eq!(total.prompt_tokens, 30);
    }

    #[test]
    fn test_generation_constructors() {
        assert!(!Generation::text("hi").has_tool_calls());

        let call = ToolCall::new("echo", json!({"text": "x"}));
        let generation = Generation::with_tool_calls("", vec![call]);
        assert!(generation.has_tool_calls());
        assert_eq!(generation.finish_reason, Some(FinishReason::ToolCalls));
    }

    #[test]
    fn test_options_presets() {
        assert_eq!(GenerateOptions::auto().tool_choice, ToolChoice::Auto);
        assert_eq!(GenerateOptions::no_tools().tool_choice, ToolChoice::None);
    }
}
