//! Provider client construction

use crate::config::ProviderSettings;
use crate::error::InitError;
use crate::llm::{build_client, ProviderClient};
use async_trait::async_trait;
use std::sync::Arc;

/// Builds a provider client from its settings.
///
/// The manager owns memoization and probing; a factory only constructs.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn create(&self, settings: &ProviderSettings) -> Result<Arc<dyn ProviderClient>, InitError>;
}

/// Factory for the real HTTP backends, chosen by protocol
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpClientFactory;

#[async_trait]
impl ClientFactory for HttpClientFactory {
    async fn create(&self, settings: &ProviderSettings) -> Result<Arc<dyn ProviderClient>, InitError> {
        build_client(settings)
    }
}
