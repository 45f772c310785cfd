//! Run one tool round trip offline with a custom system preamble.
//!
//! The provider here is a stand-in that asks for the `echo` tool once and
//! then reports what it saw, so the example needs no credentials.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use switchboard_core::error::{InitError, LlmError};
use switchboard_core::llm::{GenerateOptions, ToolDefinition};
use switchboard_core::tools::builtin;
use switchboard_core::{
    ChatRequest, ClientFactory, ClientManager, Conversation, Dispatcher, Generation, Message,
    MessageRole, OrchestratorConfig, ProviderClient, ProviderSettings, ToolCall,
    ToolCallOrchestrator, ToolsConfig,
};

struct LocalEcho;

#[async_trait]
impl ProviderClient for LocalEcho {
    fn provider_id(&self) -> &str {
        "local"
    }

    fn model_name(&self) -> &str {
        "local-echo"
    }

    async fn generate(
        &self,
        conversation: &Conversation,
        tools: Option<&[ToolDefinition]>,
        _options: &GenerateOptions,
    ) -> Result<Generation, LlmError> {
        let preamble = conversation
            .iter()
            .find(|m| m.role == MessageRole::System)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        println!("system preamble sent:\n{preamble}\n");

        match conversation.last() {
            Some(last) if last.role == MessageRole::Tool => {
                Ok(Generation::text(format!("The echo tool said: {}", last.content)))
            }
            _ if tools.is_some() => Ok(Generation::with_tool_calls(
                "",
                vec![ToolCall::new("echo", json!({"text": "hello from a tool"}))],
            )),
            _ => Ok(Generation::text("No tools offered.")),
        }
    }
}

struct LocalFactory;

#[async_trait]
impl ClientFactory for LocalFactory {
    async fn create(
        &self,
        _settings: &ProviderSettings,
    ) -> Result<Arc<dyn ProviderClient>, InitError> {
        Ok(Arc::new(LocalEcho))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    switchboard_core::init_tracing();

    let settings = ProviderSettings::new(
        "local",
        switchboard_core::Protocol::OpenAICompat,
        "local-echo",
    )
    .with_api_key("unused");
    let clients = ClientManager::new(vec![settings], None, Arc::new(LocalFactory));

    let config = OrchestratorConfig::default()
        .with_system_preamble("You are a terse assistant. Use tools when they help.");
    let orchestrator = ToolCallOrchestrator::new(
        Arc::new(builtin::default_registry(&ToolsConfig::default())),
        config,
    );
    let dispatcher = Dispatcher::new(Arc::new(clients), orchestrator);

    let conversation = Conversation::new().with(Message::user("Say hello through a tool"));
    let reply = dispatcher.chat(ChatRequest::new(conversation)).await?;
    println!("{}", reply.final_text);

    dispatcher.clients().shutdown_all().await;
    Ok(())
}
