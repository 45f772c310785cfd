//! Provider clients and the conversation model

pub mod casing;
pub mod client;
pub mod message;
pub mod providers;

pub use client::{
    FinishReason, GenerateOptions, Generation, ProviderClient, ToolChoice, ToolDefinition, Usage,
};
pub use message::{Conversation, Message, MessageRole};
pub use providers::{build_client, AnthropicClient, OpenAiCompatClient};
