//! Anthropic Claude client implementation

use crate::config::{ArgumentCase, ModelParams, ProviderSettings};
use crate::error::{InitError, LlmError};
use crate::llm::casing::{arguments_from_wire, arguments_to_wire, schema_to_wire};
use crate::llm::{
    Conversation, FinishReason, GenerateOptions, Generation, Message, MessageRole,
    ProviderClient, ToolChoice, ToolDefinition, Usage,
};
use crate::tools::ToolCall;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Anthropic Claude client
pub struct AnthropicClient {
    provider_id: String,
    client: Client,
    base_url: String,
    model: String,
    models: Vec<String>,
    params: ModelParams,
    argument_case: ArgumentCase,
}

impl AnthropicClient {
    /// Create a new Anthropic client
    pub fn new(settings: &ProviderSettings, api_key: &str) -> Result<Self, InitError> {
        let client_error = |message: String| InitError::Client {
            provider_id: settings.id.clone(),
            message,
        };

        let mut headers = HeaderMap::new();
        let mut insert = |name: &str, value: &str| -> Result<(), InitError> {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| client_error(format!("invalid header name '{}': {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| client_error(format!("invalid header value for '{}': {}", name, e)))?;
            headers.insert(name, value);
            Ok(())
        };
        insert("x-api-key", api_key)?;
        insert("anthropic-version", ANTHROPIC_VERSION)?;
        for (name, value) in &settings.headers {
            insert(name, value)?;
        }

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| client_error(e.to_string()))?;

        Ok(Self {
            provider_id: settings.id.clone(),
            client,
            base_url: settings.base_url().trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            models: settings.supported_models(),
            params: settings.params.clone(),
            argument_case: settings.argument_case,
        })
    }

    fn build_request(
        &self,
        conversation: &Conversation,
        tools: Option<&[ToolDefinition]>,
        options: &GenerateOptions,
    ) -> AnthropicRequest {
        let declares_tools = tools.is_some_and(|t| !t.is_empty());
        let (system, messages) = self.convert_messages(conversation, declares_tools);

        let tools = tools.filter(|t| !t.is_empty()).map(|defs| {
            defs.iter()
                .map(|def| AnthropicTool {
                    name: def.name.clone(),
                    description: def.description.clone(),
                    input_schema: schema_to_wire(&def.parameters, self.argument_case),
                })
                .collect::<Vec<_>>()
        });

        let tool_choice = tools.as_ref().map(|_| match options.tool_choice {
            ToolChoice::Auto => AnthropicToolChoice { kind: "auto" },
            ToolChoice::None => AnthropicToolChoice { kind: "none" },
        });

        AnthropicRequest {
            model: self.model.clone(),
            max_tokens: options
                .max_tokens
                .or(self.params.max_tokens)
                .unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: options.temperature.or(self.params.temperature),
            top_p: self.params.top_p,
            system,
            messages,
            tools,
            tool_choice,
            stop_sequences: self.params.stop_sequences.clone(),
        }
    }

    /// Map the conversation onto the Messages API shape.
    ///
    /// System messages are lifted into the top-level `system` field. Runs of
    /// tool messages fold into a single user turn of `tool_result` blocks.
    /// When the request declares no tools the API rejects `tool_use` blocks,
    /// so an earlier round trip is replayed as plain text instead.
    fn convert_messages(
        &self,
        conversation: &Conversation,
        declares_tools: bool,
    ) -> (Option<String>, Vec<AnthropicMessage>) {
        let mut system_parts = Vec::new();
        let mut messages: Vec<AnthropicMessage> = Vec::new();
        let mut in_tool_run = false;

        for message in conversation.iter() {
            let is_tool = message.role == MessageRole::Tool;
            match message.role {
                MessageRole::System => system_parts.push(message.content.clone()),
                MessageRole::User => messages.push(AnthropicMessage::text("user", &message.content)),
                MessageRole::Assistant => {
                    let converted = self.convert_assistant(message, declares_tools);
                    // The API rejects empty assistant turns
                    if !converted.content.is_empty() {
                        messages.push(converted);
                    }
                }
                MessageRole::Tool => {
                    let block = tool_result_block(message, declares_tools);
                    match messages.last_mut() {
                        Some(last) if in_tool_run => last.content.push(block),
                        _ => messages.push(AnthropicMessage {
                            role: "user",
                            content: vec![block],
                        }),
                    }
                }
            }
            in_tool_run = is_tool;
        }

        let system = (!system_parts.is_empty()).then(|| system_parts.join("\n\n"));
        (system, messages)
    }

    fn convert_assistant(&self, message: &Message, declares_tools: bool) -> AnthropicMessage {
        let mut content = Vec::new();
        if !message.content.is_empty() {
            content.push(ContentBlock::Text {
                text: message.content.clone(),
            });
        }

        for call in &message.tool_calls {
            let input = arguments_to_wire(&call.arguments, self.argument_case);
            if declares_tools {
                content.push(ContentBlock::ToolUse {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    input,
                });
            } else {
                content.push(ContentBlock::Text {
                    text: format!("[called tool {} with {}]", call.name, input),
                });
            }
        }

        AnthropicMessage {
            role: "assistant",
            content,
        }
    }

    fn convert_response(&self, response: AnthropicResponse) -> Generation {
        let mut text_parts = Vec::new();
        let mut tool_calls = Vec::new();

        for block in response.content {
            match block {
                ResponseBlock::Text { text } => text_parts.push(text),
                ResponseBlock::ToolUse { id, name, input } => {
                    tool_calls.push(ToolCall {
                        id,
                        name,
                        arguments: arguments_from_wire(input, self.argument_case),
                    });
                }
                ResponseBlock::Other => {}
            }
        }

        let usage = response.usage.map(|u| Usage {
            prompt_tokens: u.input_tokens,
            completion_tokens: u.output_tokens,
            total_tokens: u.input_tokens + u.output_tokens,
        });

        let finish_reason = response.stop_reason.map(|reason| match reason.as_str() {
            "end_turn" | "stop_sequence" => FinishReason::Stop,
            "max_tokens" => FinishReason::Length,
            "tool_use" => FinishReason::ToolCalls,
            _ => FinishReason::Other(reason),
        });

        Generation {
            text: text_parts.join("\n"),
            tool_calls,
            usage,
            finish_reason,
        }
    }
}

fn tool_result_block(message: &Message, declares_tools: bool) -> ContentBlock {
    let tool_name = message.tool_name.as_deref().unwrap_or("tool");
    match (&message.tool_call_id, declares_tools) {
        (Some(id), true) => ContentBlock::ToolResult {
            tool_use_id: id.clone(),
            content: message.content.clone(),
        },
        _ => ContentBlock::Text {
            text: format!("[result of tool {}]\n{}", tool_name, message.content),
        },
    }
}

fn map_send_error(e: reqwest::Error) -> LlmError {
    LlmError::Network {
        message: e.to_string(),
    }
}

fn map_status_error(status: u16, body: String) -> LlmError {
    match status {
        401 | 403 => LlmError::Authentication { message: body },
        _ => LlmError::Api {
            status: Some(status),
            body,
        },
    }
}

#[async_trait]
impl ProviderClient for AnthropicClient {
    fn provider_id(&self) -> &str {
        &self.provider_id
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn supported_models(&self) -> Vec<String> {
        self.models.clone()
    }

    async fn generate(
        &self,
        conversation: &Conversation,
        tools: Option<&[ToolDefinition]>,
        options: &GenerateOptions,
    ) -> Result<Generation, LlmError> {
        let request = self.build_request(conversation, tools, options);
        debug!(
            provider = %self.provider_id,
            messages = request.messages.len(),
            tools = request.tools.as_ref().map_or(0, Vec::len),
            "Sending Anthropic request"
        );

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(map_send_error)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(map_status_error(status, body));
        }

        let anthropic_response: AnthropicResponse =
            response
                .json()
                .await
                .map_err(|e| LlmError::InvalidResponse {
                    message: format!("Failed to parse response: {}", e),
                })?;

        Ok(self.convert_response(anthropic_response))
    }

    async fn probe(&self) -> Result<(), LlmError> {
        let response = self
            .client
            .get(format!("{}/v1/models", self.base_url))
            .send()
            .await
            .map_err(map_send_error)?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            Err(map_status_error(status, body))
        }
    }
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<AnthropicTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<AnthropicToolChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: Vec<ContentBlock>,
}

impl AnthropicMessage {
    fn text(role: &'static str, text: &str) -> Self {
        Self {
            role,
            content: vec![ContentBlock::Text {
                text: text.to_string(),
            }],
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    ToolUse { id: String, name: String, input: Value },
    ToolResult { tool_use_id: String, content: String },
}

#[derive(Debug, Serialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: Value,
}

#[derive(Debug, Serialize)]
struct AnthropicToolChoice {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ResponseBlock>,
    stop_reason: Option<String>,
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}
