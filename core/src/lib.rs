//! # Switchboard Core
//!
//! Mediates a chat turn between a caller and one of several interchangeable
//! language-model providers, letting the model call tools mid-conversation.
//!
//! The pieces, leaves first: a [`ToolRegistry`] of named tools, a
//! [`ProviderClient`] per backend, the [`ClientManager`] that builds clients
//! lazily and tears them down once, the [`ToolCallOrchestrator`] that runs the
//! two-phase round trip, and the [`Dispatcher`] in front of it all.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod lifecycle;
pub mod llm;
pub mod orchestrator;
pub mod tools;

// Re-export commonly used types
pub use config::{ArgumentCase, ModelParams, Protocol, ProviderSettings, SwitchboardConfig, ToolsConfig};
pub use dispatcher::{ChatReply, ChatRequest, Dispatcher, ProviderSelector};
pub use error::{Error, ErrorKind, Failure, Result};
pub use lifecycle::{ClientFactory, ClientManager, HttpClientFactory, ProviderStatus, ShutdownReport};
pub use llm::{Conversation, Generation, Message, MessageRole, ProviderClient};
pub use orchestrator::{OrchestratorConfig, ToolCallOrchestrator, TurnOutcome, TurnState};
pub use tools::{Tool, ToolCall, ToolRegistry, ToolResult};

/// Current version of the switchboard-core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize tracing for the library
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}

/// Initialize tracing with a specific debug mode
pub fn init_tracing_with_debug(debug: bool) {
    let filter = if debug { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .init();
}
