//! OpenAI-compatible client (DeepSeek, Qwen) using the async-openai library

use crate::config::{ArgumentCase, ModelParams, ProviderSettings};
use crate::error::{InitError, LlmError};
use crate::llm::casing::{arguments_from_wire, arguments_to_wire, schema_to_wire};
use crate::llm::{
    Conversation, FinishReason, GenerateOptions, Generation, Message, MessageRole,
    ProviderClient, ToolChoice, ToolDefinition, Usage,
};
use crate::tools::ToolCall;
use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessage,
        ChatCompletionRequestAssistantMessageContent, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessage, ChatCompletionRequestToolMessage,
        ChatCompletionRequestToolMessageContent, ChatCompletionRequestUserMessage,
        ChatCompletionTool, ChatCompletionToolChoiceOption, ChatCompletionToolType,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
        FunctionCall, FunctionObject, Stop,
    },
    Client,
};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use tracing::debug;

/// Client for any provider speaking the OpenAI chat-completions protocol
pub struct OpenAiCompatClient {
    provider_id: String,
    client: Client<OpenAIConfig>,
    model: String,
    models: Vec<String>,
    params: ModelParams,
    argument_case: ArgumentCase,
}

impl OpenAiCompatClient {
    /// Create a new client from provider settings and a resolved key
    pub fn new(settings: &ProviderSettings, api_key: &str) -> Result<Self, InitError> {
        let client_error = |message: String| InitError::Client {
            provider_id: settings.id.clone(),
            message,
        };

        let openai_config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(settings.base_url().trim_end_matches('/'));

        let mut headers = HeaderMap::new();
        for (name, value) in &settings.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| client_error(format!("invalid header name '{}': {}", name, e)))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|e| client_error(format!("invalid header value for '{}': {}", name, e)))?;
            headers.insert(header_name, header_value);
        }

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| client_error(e.to_string()))?;

        Ok(Self {
            provider_id: settings.id.clone(),
            client: Client::with_config(openai_config).with_http_client(http_client),
            model: settings.model.clone(),
            models: settings.supported_models(),
            params: settings.params.clone(),
            argument_case: settings.argument_case,
        })
    }

    /// Convert the conversation to async-openai request messages
    fn convert_messages(&self, conversation: &Conversation) -> Vec<ChatCompletionRequestMessage> {
        conversation
            .iter()
            .map(|message| match message.role {
                MessageRole::System => {
                    ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                        content: message.content.clone().into(),
                        name: None,
                    })
                }
                MessageRole::User => {
                    ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                        content: message.content.clone().into(),
                        name: None,
                    })
                }
                MessageRole::Assistant => self.convert_assistant(message),
                MessageRole::Tool => self.convert_tool(message),
            })
            .collect()
    }

    fn convert_assistant(&self, message: &Message) -> ChatCompletionRequestMessage {
        let tool_calls: Vec<ChatCompletionMessageToolCall> = message
            .tool_calls
            .iter()
            .map(|call| ChatCompletionMessageToolCall {
                id: call.id.clone(),
                r#type: ChatCompletionToolType::Function,
                function: FunctionCall {
                    name: call.name.clone(),
                    arguments: arguments_to_wire(&call.arguments, self.argument_case).to_string(),
                },
            })
            .collect();

        ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
            content: (!message.content.is_empty()).then(|| {
                ChatCompletionRequestAssistantMessageContent::Text(message.content.clone())
            }),
            tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
            ..Default::default()
        })
    }

    fn convert_tool(&self, message: &Message) -> ChatCompletionRequestMessage {
        match &message.tool_call_id {
            Some(id) => ChatCompletionRequestMessage::Tool(ChatCompletionRequestToolMessage {
                content: ChatCompletionRequestToolMessageContent::Text(message.content.clone()),
                tool_call_id: id.clone(),
            }),
            // Without a call id the wire has no way to correlate; degrade to user text
            None => ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: format!(
                    "[result of tool {}]\n{}",
                    message.tool_name.as_deref().unwrap_or("tool"),
                    message.content
                )
                .into(),
                name: None,
            }),
        }
    }

    /// Convert tool definitions to async-openai format
    fn convert_tools(&self, tools: &[ToolDefinition]) -> Vec<ChatCompletionTool> {
        tools
            .iter()
            .map(|tool| ChatCompletionTool {
                r#type: ChatCompletionToolType::Function,
                function: FunctionObject {
                    name: tool.name.clone(),
                    description: Some(tool.description.clone()),
                    parameters: Some(schema_to_wire(&tool.parameters, self.argument_case)),
                    strict: None,
                },
            })
            .collect()
    }

    fn build_request(
        &self,
        conversation: &Conversation,
        tools: Option<&[ToolDefinition]>,
        options: &GenerateOptions,
    ) -> Result<CreateChatCompletionRequest, LlmError> {
        let mut request_builder = CreateChatCompletionRequestArgs::default();
        request_builder.model(&self.model);
        request_builder.messages(self.convert_messages(conversation));

        if let Some(tools) = tools.filter(|t| !t.is_empty()) {
            request_builder.tools(self.convert_tools(tools));
            request_builder.tool_choice(match options.tool_choice {
                ToolChoice::Auto => ChatCompletionToolChoiceOption::Auto,
                ToolChoice::None => ChatCompletionToolChoiceOption::None,
            });
        }

        if let Some(max_tokens) = options.max_tokens.or(self.params.max_tokens) {
            request_builder.max_tokens(max_tokens);
        }
        if let Some(temperature) = options.temperature.or(self.params.temperature) {
            request_builder.temperature(temperature);
        }
        if let Some(top_p) = self.params.top_p {
            request_builder.top_p(top_p);
        }
        if let Some(stop) = &self.params.stop_sequences {
            request_builder.stop(Stop::StringArray(stop.clone()));
        }

        request_builder
            .build()
            .map_err(|e| LlmError::InvalidResponse {
                message: format!("Failed to build request: {}", e),
            })
    }

    /// Convert async-openai response to a Generation
    fn convert_response(
        &self,
        response: CreateChatCompletionResponse,
    ) -> Result<Generation, LlmError> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse {
                message: "No choices in response".to_string(),
            })?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tool_call| ToolCall {
                id: tool_call.id,
                name: tool_call.function.name,
                arguments: arguments_from_wire(
                    parse_arguments(&tool_call.function.arguments),
                    self.argument_case,
                ),
            })
            .collect();

        let usage = response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        let finish_reason = choice.finish_reason.map(|reason| match reason {
            async_openai::types::FinishReason::Stop => FinishReason::Stop,
            async_openai::types::FinishReason::Length => FinishReason::Length,
            async_openai::types::FinishReason::ToolCalls => FinishReason::ToolCalls,
            async_openai::types::FinishReason::ContentFilter => FinishReason::ContentFilter,
            async_openai::types::FinishReason::FunctionCall => FinishReason::ToolCalls,
        });

        Ok(Generation {
            text: choice.message.content.unwrap_or_default(),
            tool_calls,
            usage,
            finish_reason,
        })
    }
}

/// Arguments arrive as a JSON string. Anything that is not valid JSON is
/// kept as a raw string so the orchestrator can report it as malformed.
fn parse_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(Default::default());
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn map_openai_error(error: OpenAIError) -> LlmError {
    match error {
        OpenAIError::Reqwest(e) => LlmError::Network {
            message: e.to_string(),
        },
        OpenAIError::ApiError(api) => {
            let code = api.code.clone().unwrap_or_default();
            if code == "invalid_api_key" || api.r#type.as_deref() == Some("authentication_error") {
                LlmError::Authentication {
                    message: api.message,
                }
            } else {
                // async-openai does not surface the HTTP status
                LlmError::Api {
                    status: None,
                    body: api.message,
                }
            }
        }
        OpenAIError::JSONDeserialize(e) => LlmError::InvalidResponse {
            message: e.to_string(),
        },
        other => LlmError::InvalidResponse {
            message: other.to_string(),
        },
    }
}

#[async_trait]
impl ProviderClient for OpenAiCompatClient {
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
        let request = self.build_request(conversation, tools, options)?;
        debug!(
            provider = %self.provider_id,
            messages = request.messages.len(),
            tools = request.tools.as_ref().map_or(0, Vec::len),
            "Sending chat completion request"
        );

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(map_openai_error)?;

        let generation = self.convert_response(response)?;
        if generation.has_tool_calls() {
            debug!(
                provider = %self.provider_id,
                tool_calls = generation.tool_calls.len(),
                "Response contains tool calls"
            );
        }
        Ok(generation)
    }

    async fn probe(&self) -> Result<(), LlmError> {
        self.client
            .models()
            .list()
            .await
            .map(|_| ())
            .map_err(map_openai_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Protocol;
    use crate::tools::ToolResult;
    use serde_json::json;

    fn client(case: ArgumentCase) -> OpenAiCompatClient {
        let settings = ProviderSettings::new("deepseek", Protocol::OpenAICompat, "deepseek-chat")
            .with_argument_case(case);
        OpenAiCompatClient::new(&settings, "sk-test").unwrap()
    }

    fn thinking_def() -> ToolDefinition {
        ToolDefinition {
            name: "sequentialthinking".to_string(),
            description: "Think".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {"next_thought_needed": {"type": "boolean"}},
                "required": ["next_thought_needed"]
            }),
        }
    }

    #[test]
    fn test_request_with_tools_uses_auto_choice() {
        let client = client(ArgumentCase::Snake);
        let conversation = Conversation::new().with(Message::user("hi"));
        let defs = [thinking_def()];
        let request = client
            .build_request(&conversation, Some(&defs), &GenerateOptions::auto())
            .unwrap();

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["tools"][0]["function"]["name"], "sequentialthinking");
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[test]
    fn test_followup_request_has_no_tools() {
        let client = client(ArgumentCase::Snake);
        let call = ToolCall::new("echo", json!({"text": "x"})).with_id("call_1");
        let conversation = Conversation::new()
            .with(Message::user("hi"))
            .with(Message::assistant_tool_calls("", vec![call.clone()]))
            .with(Message::tool_result(&ToolResult::success(&call, "x")));

        let request = client
            .build_request(&conversation, None, &GenerateOptions::no_tools())
            .unwrap();
        let body = serde_json::to_value(&request).unwrap();

        assert!(body.get("tools").map_or(true, Value::is_null));
        assert_eq!(body["messages"][1]["tool_calls"][0]["id"], "call_1");
        assert_eq!(body["messages"][2]["role"], "tool");
        assert_eq!(body["messages"][2]["tool_call_id"], "call_1");
    }

    #[test]
    fn test_camel_case_schema_and_arguments() {
        let client = client(ArgumentCase::Camel);
        let defs = [thinking_def()];
        let tools = client.convert_tools(&defs);
        let parameters = tools[0].function.parameters.clone().unwrap();
        assert_eq!(parameters["required"], json!(["nextThoughtNeeded"]));

        let args = arguments_from_wire(parse_arguments(r#"{"nextThoughtNeeded": true}"#), ArgumentCase::Camel);
        assert_eq!(args, json!({"next_thought_needed": true}));
    }

    #[test]
    fn test_parse_arguments() {
        assert_eq!(parse_arguments(""), json!({}));
        assert_eq!(parse_arguments(r#"{"a": 1}"#), json!({"a": 1}));
        assert_eq!(parse_arguments("{broken"), json!("{broken"));
    }

    #[test]
    fn test_convert_response_with_tool_calls() {
        let response: CreateChatCompletionResponse = serde_json::from_value(json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 0,
            "model": "deepseek-chat",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "read_file", "arguments": "{\"filename\":\"notes.txt\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }))
        .unwrap();

        let generation = client(ArgumentCase::Snake).convert_response(response).unwrap();
        assert_eq!(generation.text, "");
        assert_eq!(generation.tool_calls.len(), 1);
        assert_eq!(generation.tool_calls[0].id, "call_1");
        assert_eq!(generation.tool_calls[0].arguments, json!({"filename": "notes.txt"}));
        assert_eq!(generation.finish_reason, Some(FinishReason::ToolCalls));
    }
}
