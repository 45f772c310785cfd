//! Two-phase tool-calling round trip
//!
//! An initial completion is offered every registered tool. If the model asks
//! for tools they run concurrently, their results are appended to the
//! conversation, and one follow-up completion (with no tools offered)
//! produces the final answer.

pub mod config;
pub mod executor;
pub mod state;

pub use config::OrchestratorConfig;
pub use executor::execute_batch;
pub use state::{TurnFailure, TurnOutcome, TurnState};

use crate::error::{Error, LlmError};
use crate::llm::{Conversation, GenerateOptions, Generation, Message, ProviderClient, ToolDefinition};
use crate::tools::ToolRegistry;
use state::TurnTrace;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const DEFAULT_PREAMBLE: &str =
    "You are a helpful assistant. Call a tool only when it is needed to answer the user.";

/// Drives one turn against a single provider
#[derive(Debug, Clone)]
pub struct ToolCallOrchestrator {
    registry: Arc<ToolRegistry>,
    config: OrchestratorConfig,
}

impl ToolCallOrchestrator {
    pub fn new(registry: Arc<ToolRegistry>, config: OrchestratorConfig) -> Self {
        if let Err(e) = config.validate() {
            warn!(error = %e, "Orchestrator timeouts are inconsistent");
        }
        Self { registry, config }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Run a turn to completion
    pub async fn run(
        &self,
        client: &dyn ProviderClient,
        conversation: Conversation,
    ) -> Result<TurnOutcome, TurnFailure> {
        self.run_cancellable(client, conversation, &CancellationToken::new())
            .await
    }

    /// Run a turn, giving up with `Cancelled` as soon as `cancel` fires.
    ///
    /// Executors still in flight are dropped at their next suspension point.
    pub async fn run_cancellable(
        &self,
        client: &dyn ProviderClient,
        conversation: Conversation,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome, TurnFailure> {
        let mut trace = TurnTrace::default();

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            result = self.drive(client, conversation, &mut trace) => result,
        };

        result.map_err(|error| {
            warn!(
                provider = %client.provider_id(),
                error = %error,
                last_state = ?trace.states.last(),
                "Turn failed"
            );
            trace.fail(error)
        })
    }

    async fn drive(
        &self,
        client: &dyn ProviderClient,
        mut conversation: Conversation,
        trace: &mut TurnTrace,
    ) -> Result<TurnOutcome, Error> {
        let started = Instant::now();
        let definitions = self.registry.tool_definitions();

        trace.enter(TurnState::AwaitInitial);
        let initial = self
            .generate(
                client,
                &conversation,
                Some(&definitions),
                GenerateOptions::auto(),
                trace,
            )
            .await?;
        trace.enter(TurnState::ModelResponded);

        if !initial.has_tool_calls() {
            conversation.push(Message::assistant(initial.text.clone()));
            trace.enter(TurnState::Done);
            info!(
                provider = %client.provider_id(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Turn completed without tools"
            );
            return Ok(self.outcome(initial.text, conversation, Vec::new(), Vec::new(), trace));
        }

        trace.enter(TurnState::ExecutingTools);
        debug!(
            provider = %client.provider_id(),
            tool_calls = initial.tool_calls.len(),
            "Executing tool calls"
        );
        let tool_results = execute_batch(
            &self.registry,
            &initial.tool_calls,
            self.config.tool_timeout(),
            self.config.tool_batch_timeout(),
        )
        .await;

        conversation.push(Message::assistant_tool_calls(
            initial.text,
            initial.tool_calls,
        ));
        for result in &tool_results {
            conversation.push(Message::tool_result(result));
        }

        trace.enter(TurnState::AwaitFollowup);
        let followup = self
            .generate(client, &conversation, None, GenerateOptions::no_tools(), trace)
            .await?;

        if followup.has_tool_calls() {
            warn!(
                provider = %client.provider_id(),
                ignored = followup.tool_calls.len(),
                "Follow-up response requested tools; ignoring them"
            );
        }

        conversation.push(Message::assistant(followup.text.clone()));
        trace.enter(TurnState::Done);
        info!(
            provider = %client.provider_id(),
            tools = tool_results.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Turn completed"
        );

        Ok(self.outcome(
            followup.text,
            conversation,
            tool_results,
            followup.tool_calls,
            trace,
        ))
    }

    /// One bounded `generate` call with the preamble in front
    async fn generate(
        &self,
        client: &dyn ProviderClient,
        conversation: &Conversation,
        tools: Option<&[ToolDefinition]>,
        options: GenerateOptions,
        trace: &mut TurnTrace,
    ) -> Result<Generation, Error> {
        let mut request = conversation.clone();
        request.prepend(Message::system(self.preamble()));

        trace.provider_calls += 1;
        let timeout = self.config.generate_timeout();
        let started = Instant::now();

        let generation = tokio::time::timeout(timeout, client.generate(&request, tools, &options))
            .await
            .map_err(|_| LlmError::Timeout { after: timeout })??;

        if let Some(usage) = generation.usage {
            trace.usage += usage;
        }
        debug!(
            provider = %client.provider_id(),
            model = %client.model_name(),
            tool_calls = generation.tool_calls.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Provider responded"
        );
        Ok(generation)
    }

    /// System preamble naming the available tools
    pub fn preamble(&self) -> String {
        let intro = self
            .config
            .system_preamble
            .as_deref()
            .unwrap_or(DEFAULT_PREAMBLE);

        if self.registry.is_empty() {
            return intro.to_string();
        }
        format!(
            "{}\n\nAvailable tools: {}",
            intro,
            self.registry.names().join(", ")
        )
    }

    fn outcome(
        &self,
        final_text: String,
        conversation: Conversation,
        tool_results: Vec<crate::tools::ToolResult>,
        ignored_tool_calls: Vec<crate::tools::ToolCall>,
        trace: &TurnTrace,
    ) -> TurnOutcome {
        TurnOutcome {
            final_text,
            conversation,
            tool_results,
            provider_calls: trace.provider_calls,
            states: trace.states.clone(),
            usage: trace.usage,
            ignored_tool_calls,
        }
    }
}
