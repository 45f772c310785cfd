//! Provider backends

pub mod anthropic;
pub mod openai;

pub use anthropic::AnthropicClient;
pub use openai::OpenAiCompatClient;

use crate::config::{Protocol, ProviderSettings};
use crate::error::InitError;
use crate::llm::ProviderClient;
use std::sync::Arc;

/// Build the client for `settings` by protocol. Does not touch the network.
pub fn build_client(settings: &ProviderSettings) -> Result<Arc<dyn ProviderClient>, InitError> {
    let api_key = settings
        .resolve_api_key()
        .ok_or_else(|| InitError::MissingCredential {
            provider_id: settings.id.clone(),
        })?;

    let client: Arc<dyn ProviderClient> = match settings.protocol {
        Protocol::Anthropic => Arc::new(AnthropicClient::new(settings, &api_key)?),
        Protocol::OpenAICompat => Arc::new(OpenAiCompatClient::new(settings, &api_key)?),
    };
    Ok(client)
}
