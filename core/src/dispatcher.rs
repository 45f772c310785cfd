//! Request entry point: pick a provider, then run the turn

use crate::config::SwitchboardConfig;
use crate::error::{Error, Result};
use crate::lifecycle::ClientManager;
use crate::llm::Conversation;
use crate::orchestrator::{ToolCallOrchestrator, TurnOutcome};
use crate::tools::{builtin, ToolResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Which provider a request should go to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderSelector {
    /// The manager's default provider
    #[default]
    Default,
    /// A provider by id
    Named(String),
}

impl ProviderSelector {
    pub fn named<S: Into<String>>(id: S) -> Self {
        Self::Named(id.into())
    }
}

impl From<Option<String>> for ProviderSelector {
    fn from(id: Option<String>) -> Self {
        id.map_or(Self::Default, Self::Named)
    }
}

/// One chat turn as submitted by a caller
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub conversation: Conversation,
    pub provider: ProviderSelector,
    pub cancel: Option<CancellationToken>,
}

impl ChatRequest {
    pub fn new(conversation: Conversation) -> Self {
        Self {
            conversation,
            ..Self::default()
        }
    }

    pub fn with_provider(mut self, provider: ProviderSelector) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// What the caller gets back from a successful turn
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub final_text: String,
    pub provider_id: String,
    pub model: String,
    pub tool_results: Vec<ToolResult>,
    pub provider_calls: usize,
}

impl ChatReply {
    fn from_outcome(outcome: TurnOutcome, provider_id: String, model: String) -> Self {
        Self {
            final_text: outcome.final_text,
            provider_id,
            model,
            tool_results: outcome.tool_results,
            provider_calls: outcome.provider_calls,
        }
    }
}

/// Routes requests to a provider client and hands them to the orchestrator
pub struct Dispatcher {
    clients: Arc<ClientManager>,
    orchestrator: ToolCallOrchestrator,
}

impl Dispatcher {
    pub fn new(clients: Arc<ClientManager>, orchestrator: ToolCallOrchestrator) -> Self {
        Self {
            clients,
            orchestrator,
        }
    }

    /// Assemble the built-in tools, the HTTP provider clients and the
    /// orchestrator from a resolved configuration. The configuration is
    /// validated first.
    pub fn from_config(config: &SwitchboardConfig) -> Result<Self> {
        config.validate()?;
        let registry = builtin::default_registry(&config.tools);
        Ok(Self::new(
            Arc::new(ClientManager::from_config(config)),
            ToolCallOrchestrator::new(Arc::new(registry), config.orchestrator.clone()),
        ))
    }

    pub fn clients(&self) -> &Arc<ClientManager> {
        &self.clients
    }

    pub fn orchestrator(&self) -> &ToolCallOrchestrator {
        &self.orchestrator
    }

    /// Resolve the selector to a provider id
    pub fn resolve(&self, selector: &ProviderSelector) -> Result<String> {
        match selector {
            ProviderSelector::Named(id) => Ok(id.clone()),
            ProviderSelector::Default => self
                .clients
                .default_provider()
                .map(str::to_string)
                .ok_or_else(|| Error::ProviderUnavailable {
                    provider_id: "default".to_string(),
                    reason: "no providers configured".to_string(),
                }),
        }
    }

    /// Dispatch a turn and return the orchestrator's outcome as is
    pub async fn dispatch(&self, request: ChatRequest) -> Result<TurnOutcome> {
        self.run(request).await.map(|(_, _, outcome)| outcome)
    }

    /// Dispatch a turn and return the caller-facing reply
    pub async fn chat(&self, request: ChatRequest) -> Result<ChatReply> {
        let (provider_id, model, outcome) = self.run(request).await?;
        Ok(ChatReply::from_outcome(outcome, provider_id, model))
    }

    async fn run(&self, request: ChatRequest) -> Result<(String, String, TurnOutcome)> {
        let provider_id = self.resolve(&request.provider)?;

        let client = self.clients.get_or_init(&provider_id).await.map_err(|e| {
            warn!(provider = %provider_id, reason = %e, "Dispatch refused");
            Error::ProviderUnavailable {
                provider_id: provider_id.clone(),
                reason: e.to_string(),
            }
        })?;

        let model = client.model_name().to_string();
        debug!(provider = %provider_id, model = %model, "Dispatching turn");

        let cancel = request.cancel.unwrap_or_default();
        let outcome = self
            .orchestrator
            .run_cancellable(client.as_ref(), request.conversation, &cancel)
            .await?;

        Ok((provider_id, model, outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Protocol, ProviderSettings};
    use crate::error::{ErrorKind, InitError, LlmError};
    use crate::lifecycle::ClientFactory;
    use crate::llm::{GenerateOptions, Generation, Message, ProviderClient, ToolDefinition};
    use crate::orchestrator::OrchestratorConfig;
    use crate::tools::ToolRegistry;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoProvider {
        id: String,
        generates: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ProviderClient for EchoProvider {
        fn provider_id(&self) -> &str {
            &self.id
        }

        fn model_name(&self) -> &str {
            "echo-model"
        }

        async fn generate(
            &self,
            conversation: &Conversation,
            _tools: Option<&[ToolDefinition]>,
            _options: &GenerateOptions,
        ) -> std::result::Result<Generation, LlmError> {
            self.generates.fetch_add(1, Ordering::SeqCst);
            let last = conversation.last().map(|m| m.content.clone()).unwrap_or_default();
            Ok(Generation::text(format!("{} says: {}", self.id, last)))
        }
    }

    #[derive(Default)]
    struct EnvFactory {
        generates: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ClientFactory for EnvFactory {
        async fn create(
            &self,
            settings: &ProviderSettings,
        ) -> std::result::Result<Arc<dyn ProviderClient>, InitError> {
            settings
                .resolve_api_key()
                .ok_or_else(|| InitError::MissingCredential {
                    provider_id: settings.id.clone(),
                })?;
            Ok(Arc::new(EchoProvider {
                id: settings.id.clone(),
                generates: self.generates.clone(),
            }))
        }
    }

    fn dispatcher(factory: EnvFactory) -> Dispatcher {
        let mut qwen = ProviderSettings::new("qwen", Protocol::OpenAICompat, "qwen-plus");
        qwen.api_key = Some("env:SWITCHBOARD_DISPATCH_TEST_UNSET".to_string());
        let providers = vec![
            ProviderSettings::new("deepseek", Protocol::OpenAICompat, "deepseek-chat")
                .with_api_key("sk-ds"),
            qwen,
        ];
        let clients = Arc::new(ClientManager::new(providers, None, Arc::new(factory)));
        let orchestrator =
            ToolCallOrchestrator::new(Arc::new(ToolRegistry::new()), OrchestratorConfig::default());
        Dispatcher::new(clients, orchestrator)
    }

    fn hello() -> Conversation {
        Conversation::new().with(Message::user("hello"))
    }

    #[tokio::test]
    async fn test_default_provider_is_used() {
        let reply = dispatcher(EnvFactory::default())
            .chat(ChatRequest::new(hello()))
            .await
            .unwrap();
        assert_eq!(reply.provider_id, "deepseek");
        assert_eq!(reply.model, "echo-model");
        assert_eq!(reply.final_text, "deepseek says: hello");
        assert_eq!(reply.provider_calls, 1);
    }

    #[tokio::test]
    async fn test_unavailable_provider_fails_fast() {
        let factory = EnvFactory::default();
        let generates = factory.generates.clone();
        let dispatcher = dispatcher(factory);

        let err = dispatcher
            .chat(ChatRequest::new(hello()).with_provider(ProviderSelector::named("qwen")))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ProviderUnavailable);
        assert_eq!(generates.load(Ordering::SeqCst), 0);
        let failure = err.to_failure();
        assert!(failure.message.contains("qwen"));
    }

    #[tokio::test]
    async fn test_unknown_provider_is_unavailable() {
        let err = dispatcher(EnvFactory::default())
            .chat(ChatRequest::new(hello()).with_provider(ProviderSelector::named("gemini")))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ProviderUnavailable { ref provider_id, .. } if provider_id == "gemini"));
    }

    #[tokio::test]
    async fn test_after_shutdown_dispatch_is_refused() {
        let dispatcher = dispatcher(EnvFactory::default());
        dispatcher.chat(ChatRequest::new(hello())).await.unwrap();
        dispatcher.clients().shutdown_all().await;

        let err = dispatcher.chat(ChatRequest::new(hello())).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProviderUnavailable);
    }

    #[tokio::test]
    async fn test_pre_cancelled_request() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = dispatcher(EnvFactory::default())
            .chat(ChatRequest::new(hello()).with_cancel(cancel))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn test_from_config_assembles_builtins() {
        let dispatcher = Dispatcher::from_config(&SwitchboardConfig::default()).unwrap();
        assert_eq!(dispatcher.clients().provider_ids(), vec!["claude", "deepseek", "qwen"]);
        assert!(dispatcher.orchestrator().registry().contains("read_file"));
        assert_eq!(
            dispatcher.resolve(&ProviderSelector::Default).unwrap(),
            "claude"
        );
    }

    #[test]
    fn test_from_config_rejects_inverted_tool_timeouts() {
        let mut config = SwitchboardConfig::default();
        config.orchestrator = OrchestratorConfig::default().with_timeouts(
            std::time::Duration::from_secs(60),
            std::time::Duration::from_secs(30),
            std::time::Duration::from_secs(30),
        );

        let err = Dispatcher::from_config(&config).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::ConfigError);
        assert!(err.to_string().contains("orchestrator.tool_timeout_ms"));
    }

    #[test]
    fn test_selector_from_option() {
        assert_eq!(ProviderSelector::from(None), ProviderSelector::Default);
        assert_eq!(
            ProviderSelector::from(Some("claude".to_string())),
            ProviderSelector::named("claude")
        );
    }
}
