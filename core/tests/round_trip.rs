//! End-to-end round trips through the dispatcher with scripted providers

use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use switchboard_core::error::{InitError, LlmError};
use switchboard_core::llm::{GenerateOptions, ToolDefinition};
use switchboard_core::tools::builtin;
use switchboard_core::{
    ArgumentCase, ChatRequest, ClientFactory, ClientManager, Conversation, Dispatcher, ErrorKind,
    Generation, Message, MessageRole, OrchestratorConfig, Protocol, ProviderClient,
    ProviderSelector, ProviderSettings, ToolCall, ToolCallOrchestrator, ToolsConfig,
};

/// Shared script and request log for every client a factory builds
#[derive(Default)]
struct Script {
    responses: Mutex<VecDeque<Generation>>,
    seen: Mutex<Vec<Conversation>>,
}

struct ScriptedClient {
    id: String,
    script: Arc<Script>,
    probes: Arc<AtomicUsize>,
}

#[async_trait]
impl ProviderClient for ScriptedClient {
    fn provider_id(&self) -> &str {
        &self.id
    }

    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn generate(
        &self,
        conversation: &Conversation,
        _tools: Option<&[ToolDefinition]>,
        _options: &GenerateOptions,
    ) -> Result<Generation, LlmError> {
        self.script.seen.lock().unwrap().push(conversation.clone());
        self.script
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LlmError::InvalidResponse {
                message: "script exhausted".to_string(),
            })
    }

    async fn probe(&self) -> Result<(), LlmError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        // Slow probe so concurrent first callers overlap
        tokio::time::sleep(Duration::from_millis(30)).await;
        Ok(())
    }
}

#[derive(Default)]
struct ScriptedFactory {
    script: Arc<Script>,
    constructions: Arc<AtomicUsize>,
    probes: Arc<AtomicUsize>,
}

#[async_trait]
impl ClientFactory for ScriptedFactory {
    async fn create(
        &self,
        settings: &ProviderSettings,
    ) -> Result<Arc<dyn ProviderClient>, InitError> {
        settings
            .resolve_api_key()
            .ok_or_else(|| InitError::MissingCredential {
                provider_id: settings.id.clone(),
            })?;
        self.constructions.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(ScriptedClient {
            id: settings.id.clone(),
            script: self.script.clone(),
            probes: self.probes.clone(),
        }))
    }
}

fn providers() -> Vec<ProviderSettings> {
    let mut qwen = ProviderSettings::new("qwen", Protocol::OpenAICompat, "qwen-plus");
    qwen.api_key = Some("env:SWITCHBOARD_ROUND_TRIP_NO_KEY".to_string());
    vec![
        ProviderSettings::new("claude", Protocol::Anthropic, "claude-test").with_api_key("sk-c"),
        ProviderSettings::new("deepseek", Protocol::OpenAICompat, "deepseek-chat")
            .with_api_key("sk-d")
            .with_argument_case(ArgumentCase::Camel),
        qwen,
    ]
}

fn dispatcher(factory: ScriptedFactory, tools: ToolsConfig) -> Dispatcher {
    let clients = ClientManager::new(providers(), Some("claude".to_string()), Arc::new(factory));
    let orchestrator = ToolCallOrchestrator::new(
        Arc::new(builtin::default_registry(&tools)),
        OrchestratorConfig::default(),
    );
    Dispatcher::new(Arc::new(clients), orchestrator)
}

#[tokio::test]
async fn read_file_round_trip() {
    let workspace = tempfile::tempdir().unwrap();
    std::fs::write(workspace.path().join("notes.txt"), "hello world").unwrap();

    let factory = ScriptedFactory::default();
    let script = factory.script.clone();
    script.responses.lock().unwrap().extend([
        Generation::with_tool_calls(
            "",
            vec![ToolCall::new("read_file", json!({"filename": "notes.txt"})).with_id("call_1")],
        ),
        Generation::text("The file contains: hello world."),
    ]);

    let tools = ToolsConfig {
        workspace_root: Some(workspace.path().to_path_buf()),
        ..ToolsConfig::default()
    };
    let dispatcher = dispatcher(factory, tools);

    let conversation = Conversation::new().with(Message::user("Read file notes.txt"));
    let outcome = dispatcher
        .dispatch(ChatRequest::new(conversation))
        .await
        .unwrap();

    assert_eq!(outcome.final_text, "The file contains: hello world.");
    assert_eq!(outcome.provider_calls, 2);
    assert_eq!(outcome.tool_results.len(), 1);
    assert!(outcome.tool_results[0].success);

    // The follow-up request carries the tool message right after the
    // assistant's tool-call message.
    let seen = script.seen.lock().unwrap();
    let followup = seen[1].messages();
    let tool_message = followup.last().unwrap();
    assert_eq!(tool_message.role, MessageRole::Tool);
    assert_eq!(tool_message.tool_name.as_deref(), Some("read_file"));
    assert_eq!(tool_message.tool_call_id.as_deref(), Some("call_1"));
    assert_eq!(tool_message.content, "hello world");
    assert!(followup[followup.len() - 2].has_tool_calls());
}

#[tokio::test]
async fn provider_without_credential_is_unavailable() {
    let factory = ScriptedFactory::default();
    let script = factory.script.clone();
    let constructions = factory.constructions.clone();
    let dispatcher = dispatcher(factory, ToolsConfig::default());

    let conversation = Conversation::new().with(Message::user("hi"));
    let err = dispatcher
        .chat(ChatRequest::new(conversation).with_provider(ProviderSelector::named("qwen")))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ProviderUnavailable);
    assert_eq!(err.to_failure().error_kind, ErrorKind::ProviderUnavailable);
    assert_eq!(constructions.load(Ordering::SeqCst), 0);
    assert!(script.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn simultaneous_first_requests_probe_once() {
    let factory = ScriptedFactory::default();
    let probes = factory.probes.clone();
    let constructions = factory.constructions.clone();
    factory
        .script
        .responses
        .lock()
        .unwrap()
        .extend([Generation::text("first"), Generation::text("second")]);
    let dispatcher = Arc::new(dispatcher(factory, ToolsConfig::default()));

    let run = |text: &'static str| {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            let conversation = Conversation::new().with(Message::user(text));
            dispatcher.chat(ChatRequest::new(conversation)).await
        })
    };
    let (a, b) = tokio::join!(run("one"), run("two"));

    let mut answers = vec![a.unwrap().unwrap().final_text, b.unwrap().unwrap().final_text];
    answers.sort();
    assert_eq!(answers, vec!["first", "second"]);
    assert_eq!(probes.load(Ordering::SeqCst), 1);
    assert_eq!(constructions.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unknown_tool_and_sibling_in_one_batch() {
    let factory = ScriptedFactory::default();
    factory.script.responses.lock().unwrap().extend([
        Generation::with_tool_calls(
            "",
            vec![
                ToolCall::new("launch_rockets", json!({})).with_id("a"),
                ToolCall::new("echo", json!({"text": "still here"})).with_id("b"),
            ],
        ),
        Generation::text("One tool was missing."),
    ]);
    let dispatcher = dispatcher(factory, ToolsConfig::default());

    let reply = dispatcher
        .chat(ChatRequest::new(Conversation::new().with(Message::user("go"))))
        .await
        .unwrap();

    assert_eq!(reply.tool_results.len(), 2);
    assert_eq!(reply.tool_results[0].error_kind, Some(ErrorKind::ToolNotFound));
    assert_eq!(reply.tool_results[1].content, "still here");
    assert_eq!(reply.final_text, "One tool was missing.");
}

#[tokio::test]
async fn shutdown_twice_then_no_reconstruction() {
    let factory = ScriptedFactory::default();
    let constructions = factory.constructions.clone();
    factory
        .script
        .responses
        .lock()
        .unwrap()
        .push_back(Generation::text("ok"));
    let dispatcher = dispatcher(factory, ToolsConfig::default());

    dispatcher
        .chat(ChatRequest::new(Conversation::new().with(Message::user("hi"))))
        .await
        .unwrap();

    let first = dispatcher.clients().shutdown_all().await;
    let second = dispatcher.clients().shutdown_all().await;
    assert_eq!(first.closed, vec!["claude"]);
    assert!(second.already_shut_down);

    let err = dispatcher
        .chat(ChatRequest::new(Conversation::new().with(Message::user("again"))))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProviderUnavailable);
    assert_eq!(constructions.load(Ordering::SeqCst), 1);
}

#[test]
fn camel_case_provider_arguments_reach_tools_in_snake_case() {
    use switchboard_core::llm::casing::{arguments_from_wire, schema_to_wire};
    use switchboard_core::Tool;

    let settings = &providers()[1];
    assert_eq!(settings.argument_case, ArgumentCase::Camel);

    let schema = builtin::EchoTool.parameters_schema();
    let wire = schema_to_wire(&schema, settings.argument_case);
    assert!(wire["properties"].get("text").is_some());

    let arguments = arguments_from_wire(json!({"maxResults": 3, "filePath": "a.txt"}), settings.argument_case);
    assert_eq!(arguments, json!({"max_results": 3, "file_path": "a.txt"}));
}

#[test]
fn merged_registry_keeps_first_registration() {
    use switchboard_core::ToolRegistry;

    let tools = ToolsConfig::default();
    let merged = ToolRegistry::merge([builtin::static_tools(&tools), builtin::default_registry(&tools)]);
    assert_eq!(
        merged.names(),
        vec!["echo", "read_file", "fetch_url", "sequentialthinking"]
    );
}
