//! Lazily initialised, single-flight provider clients with idempotent teardown

use super::factory::{ClientFactory, HttpClientFactory};
use crate::config::{ProviderSettings, SwitchboardConfig};
use crate::error::InitError;
use crate::llm::ProviderClient;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

type InitResult = Result<Arc<dyn ProviderClient>, InitError>;
type InitCell = Arc<OnceCell<InitResult>>;

/// What the manager currently knows about a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ProviderStatus {
    /// Not requested yet (or initialization still in flight)
    Uninitialized,
    /// A client is available
    Ready { model: String },
    /// Initialization failed or the manager was shut down
    Unavailable { reason: String },
}

/// One client that failed to close
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownFailure {
    pub provider_id: String,
    pub message: String,
}

/// Outcome of [`ClientManager::shutdown_all`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownReport {
    /// Providers whose client closed cleanly
    pub closed: Vec<String>,
    /// Providers whose client reported an error while closing
    pub failures: Vec<ShutdownFailure>,
    /// True when an earlier call already performed the shutdown
    pub already_shut_down: bool,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Holder of every provider client in the process.
///
/// Clients are built on first use. Concurrent first callers for the same id
/// share one in-flight construction, and its result (success or failure) is
/// kept for the life of the manager.
pub struct ClientManager {
    providers: Vec<ProviderSettings>,
    default_provider: Option<String>,
    factory: Arc<dyn ClientFactory>,
    cells: Mutex<HashMap<String, InitCell>>,
    shut_down: AtomicBool,
}

impl ClientManager {
    pub fn new(
        providers: Vec<ProviderSettings>,
        default_provider: Option<String>,
        factory: Arc<dyn ClientFactory>,
    ) -> Self {
        Self {
            providers,
            default_provider,
            factory,
            cells: Mutex::new(HashMap::new()),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Manager over the configured providers using the HTTP backends
    pub fn from_config(config: &SwitchboardConfig) -> Self {
        Self::new(
            config.providers.clone(),
            config.default_provider.clone(),
            Arc::new(HttpClientFactory),
        )
    }

    /// Configured provider ids, in configuration order
    pub fn provider_ids(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.id.as_str()).collect()
    }

    /// The configured default, or the first configured provider
    pub fn default_provider(&self) -> Option<&str> {
        self.default_provider
            .as_deref()
            .or_else(|| self.providers.first().map(|p| p.id.as_str()))
    }

    pub fn settings(&self, provider_id: &str) -> Option<&ProviderSettings> {
        self.providers.iter().find(|p| p.id == provider_id)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Construct a client and, when configured, probe it.
    ///
    /// Not memoized. [`get_or_init`](Self::get_or_init) is the entry point
    /// that guarantees one client per provider.
    pub async fn initialize(&self, settings: &ProviderSettings) -> InitResult {
        let started = Instant::now();
        let client = self.factory.create(settings).await?;

        if settings.probe_on_init {
            if let Err(e) = client.probe().await {
                if let Err(close_err) = client.close().await {
                    debug!(provider = %settings.id, error = %close_err, "Close after failed probe");
                }
                return Err(InitError::ProbeFailed {
                    provider_id: settings.id.clone(),
                    message: e.to_string(),
                });
            }
        }

        info!(
            provider = %settings.id,
            model = %client.model_name(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Provider client initialized"
        );
        Ok(client)
    }

    /// Return the provider's client, building it on first use
    pub async fn get_or_init(&self, provider_id: &str) -> InitResult {
        if self.is_shut_down() {
            return Err(InitError::ShutDown);
        }

        let settings = self
            .settings(provider_id)
            .ok_or_else(|| InitError::UnknownProvider {
                provider_id: provider_id.to_string(),
            })?;

        let cell = {
            let mut cells = self.cells.lock().await;
            // Re-checked under the lock: shutdown drains after setting the flag
            if self.is_shut_down() {
                return Err(InitError::ShutDown);
            }
            cells.entry(provider_id.to_string()).or_default().clone()
        };

        let result = cell
            .get_or_init(|| async {
                let result = self.initialize(settings).await;
                if let Err(e) = &result {
                    warn!(provider = %provider_id, error = %e, "Provider marked unavailable");
                }
                result
            })
            .await
            .clone();

        // A shutdown that raced this initialization never saw the new client
        if self.is_shut_down() {
            return Err(InitError::ShutDown);
        }
        result
    }

    /// Per-provider status, in configuration order
    pub async fn status(&self) -> Vec<(String, ProviderStatus)> {
        let shut_down = self.is_shut_down();
        let cells = self.cells.lock().await;

        self.providers
            .iter()
            .map(|settings| {
                let status = if shut_down {
                    ProviderStatus::Unavailable {
                        reason: InitError::ShutDown.to_string(),
                    }
                } else {
                    match cells.get(&settings.id).and_then(|cell| cell.get()) {
                        None => ProviderStatus::Uninitialized,
                        Some(Ok(client)) => ProviderStatus::Ready {
                            model: client.model_name().to_string(),
                        },
                        Some(Err(e)) => ProviderStatus::Unavailable {
                            reason: e.to_string(),
                        },
                    }
                };
                (settings.id.clone(), status)
            })
            .collect()
    }

    /// Close every initialized client, concurrently and independently.
    ///
    /// Safe to call repeatedly; only the first call does any work. Close
    /// errors are logged and reported, never returned.
    pub async fn shutdown_all(&self) -> ShutdownReport {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            debug!("Client manager already shut down");
            return ShutdownReport {
                already_shut_down: true,
                ..ShutdownReport::default()
            };
        }

        let cells: Vec<(String, InitCell)> = self.cells.lock().await.drain().collect();

        // Wait out constructions still in flight and seal cells nobody filled,
        // so every client that gets built is also closed.
        let settled = cells.into_iter().map(|(id, cell)| async move {
            let result = cell
                .get_or_init(|| async { Err(InitError::ShutDown) })
                .await
                .clone();
            (id, result)
        });
        let clients: Vec<(String, Arc<dyn ProviderClient>)> = futures::future::join_all(settled)
            .await
            .into_iter()
            .filter_map(|(id, result)| result.ok().map(|client| (id, client)))
            .collect();

        info!(clients = clients.len(), "Shutting down provider clients");

        let closes = clients.into_iter().map(|(id, client)| async move {
            let result = client.close().await;
            (id, result)
        });

        let mut report = ShutdownReport::default();
        for (provider_id, result) in futures::future::join_all(closes).await {
            match result {
                Ok(()) => report.closed.push(provider_id),
                Err(e) => {
                    warn!(provider = %provider_id, error = %e, "Failed to close provider client");
                    report.failures.push(ShutdownFailure {
                        provider_id,
                        message: e.to_string(),
                    });
                }
            }
        }
        report.closed.sort();
        report
    }
}

impl std::fmt::Debug for ClientManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientManager")
            .field("providers", &self.provider_ids())
            .field("default_provider", &self.default_provider())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Protocol;
    use crate::error::LlmError;
    use crate::llm::{Conversation, GenerateOptions, Generation, ToolDefinition};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    struct StubClient {
        id: String,
        probes: Arc<AtomicUsize>,
        fail_probe: bool,
        fail_close: bool,
        closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ProviderClient for StubClient {
        fn provider_id(&self) -> &str {
            &self.id
        }

        fn model_name(&self) -> &str {
            "stub-model"
        }

        async fn generate(
            &self,
            _conversation: &Conversation,
            _tools: Option<&[ToolDefinition]>,
            _options: &GenerateOptions,
        ) -> Result<Generation, LlmError> {
            Ok(Generation::text("ok"))
        }

        async fn probe(&self) -> Result<(), LlmError> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            if self.fail_probe {
                return Err(LlmError::Network {
                    message: "unreachable".to_string(),
                });
            }
            Ok(())
        }

        async fn close(&self) -> Result<(), LlmError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            if self.fail_close {
                return Err(LlmError::Network {
                    message: "close failed".to_string(),
                });
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingFactory {
        constructions: Arc<AtomicUsize>,
        probes: Arc<AtomicUsize>,
        closes: Arc<AtomicUsize>,
        fail_probe_for: Vec<&'static str>,
        fail_close_for: Vec<&'static str>,
    }

    #[async_trait]
    impl ClientFactory for CountingFactory {
        async fn create(
            &self,
            settings: &ProviderSettings,
        ) -> Result<Arc<dyn ProviderClient>, InitError> {
            self.constructions.fetch_add(1, Ordering::SeqCst);
            // Widen the race window
            tokio::time::sleep(Duration::from_millis(20)).await;
            if settings.resolve_api_key().is_none() {
                return Err(InitError::MissingCredential {
                    provider_id: settings.id.clone(),
                });
            }
            Ok(Arc::new(StubClient {
                id: settings.id.clone(),
                probes: self.probes.clone(),
                fail_probe: self.fail_probe_for.contains(&settings.id.as_str()),
                fail_close: self.fail_close_for.contains(&settings.id.as_str()),
                closes: self.closes.clone(),
            }))
        }
    }

    fn provider(id: &str) -> ProviderSettings {
        ProviderSettings::new(id, Protocol::OpenAICompat, "stub-model").with_api_key("sk")
    }

    fn manager(factory: CountingFactory, providers: Vec<ProviderSettings>) -> Arc<ClientManager> {
        Arc::new(ClientManager::new(providers, None, Arc::new(factory)))
    }

    #[tokio::test]
    async fn test_concurrent_first_use_builds_once() {
        let factory = CountingFactory::default();
        let constructions = factory.constructions.clone();
        let probes = factory.probes.clone();
        let manager = manager(factory, vec![provider("deepseek")]);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.get_or_init("deepseek").await })
            })
            .collect();

        let mut clients = Vec::new();
        for handle in handles {
            clients.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(constructions.load(Ordering::SeqCst), 1);
        assert_eq!(probes.load(Ordering::SeqCst), 1);
        assert!(clients.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[tokio::test]
    async fn test_failed_init_is_memoized() {
        let factory = CountingFactory::default();
        let constructions = factory.constructions.clone();
        let mut qwen = provider("qwen");
        qwen.api_key = Some("env:SWITCHBOARD_TEST_NO_SUCH_VAR".to_string());
        let manager = manager(factory, vec![qwen]);

        for _ in 0..3 {
            let err = manager.get_or_init("qwen").await.err().unwrap();
            assert!(matches!(err, InitError::MissingCredential { .. }));
        }
        assert_eq!(constructions.load(Ordering::SeqCst), 1);

        let status = manager.status().await;
        assert!(matches!(status[0].1, ProviderStatus::Unavailable { .. }));
    }

    #[tokio::test]
    async fn test_probe_failure_marks_unavailable() {
        let factory = CountingFactory {
            fail_probe_for: vec!["claude"],
            ..CountingFactory::default()
        };
        let manager = manager(factory, vec![provider("claude")]);

        let err = manager.get_or_init("claude").await.err().unwrap();
        assert!(matches!(err, InitError::ProbeFailed { ref provider_id, .. } if provider_id == "claude"));
    }

    #[tokio::test]
    async fn test_unknown_provider() {
        let manager = manager(CountingFactory::default(), vec![provider("claude")]);
        let err = manager.get_or_init("gemini").await.err().unwrap();
        assert!(matches!(err, InitError::UnknownProvider { .. }));
    }

    #[tokio::test]
    async fn test_status_progression() {
        let manager = manager(CountingFactory::default(), vec![provider("claude")]);
        assert_eq!(manager.status().await[0].1, ProviderStatus::Uninitialized);

        tokio_test::assert_ok!(manager.get_or_init("claude").await);
        assert_eq!(
            manager.status().await[0].1,
            ProviderStatus::Ready {
                model: "stub-model".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent_and_final() {
        let factory = CountingFactory::default();
        let constructions = factory.constructions.clone();
        let closes = factory.closes.clone();
        let manager = manager(factory, vec![provider("claude"), provider("deepseek")]);

        manager.get_or_init("claude").await.unwrap();
        manager.get_or_init("deepseek").await.unwrap();

        let first = manager.shutdown_all().await;
        assert_eq!(first.closed, vec!["claude", "deepseek"]);
        assert!(first.is_clean());
        assert!(!first.already_shut_down);

        let second = manager.shutdown_all().await;
        assert!(second.already_shut_down);
        assert!(second.closed.is_empty());
        assert_eq!(closes.load(Ordering::SeqCst), 2);

        let err = manager.get_or_init("claude").await.err().unwrap();
        assert_eq!(err, InitError::ShutDown);
        assert_eq!(constructions.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_close_failure_does_not_block_others() {
        let factory = CountingFactory {
            fail_close_for: vec!["claude"],
            ..CountingFactory::default()
        };
        let closes = factory.closes.clone();
        let manager = manager(factory, vec![provider("claude"), provider("qwen")]);
        manager.get_or_init("claude").await.unwrap();
        manager.get_or_init("qwen").await.unwrap();

        let report = manager.shutdown_all().await;
        assert_eq!(closes.load(Ordering::SeqCst), 2);
        assert_eq!(report.closed, vec!["qwen"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].provider_id, "claude");
    }

    #[test]
    fn test_default_provider_falls_back_to_first() {
        let manager = ClientManager::new(
            vec![provider("deepseek"), provider("qwen")],
            None,
            Arc::new(CountingFactory::default()),
        );
        assert_eq!(manager.default_provider(), Some("deepseek"));
        assert_eq!(manager.provider_ids(), vec!["deepseek", "qwen"]);
    }

    struct SlowFactory {
        inner: CountingFactory,
        delay: Duration,
    }

    #[async_trait]
    impl ClientFactory for SlowFactory {
        async fn create(
            &self,
            settings: &ProviderSettings,
        ) -> Result<Arc<dyn ProviderClient>, InitError> {
            tokio::time::sleep(self.delay).await;
            self.inner.create(settings).await
        }
    }

    #[tokio::test]
    async fn test_shutdown_closes_client_still_under_construction() {
        let inner = CountingFactory::default();
        let constructions = inner.constructions.clone();
        let closes = inner.closes.clone();
        let factory = SlowFactory {
            inner,
            delay: Duration::from_millis(100),
        };
        let manager = Arc::new(ClientManager::new(
            vec![provider("deepseek")],
            None,
            Arc::new(factory),
        ));

        let pending = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.get_or_init("deepseek").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let report = manager.shutdown_all().await;
        let result = pending.await.unwrap();

        assert_eq!(constructions.load(Ordering::SeqCst), 1);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert_eq!(report.closed, vec!["deepseek"]);
        assert!(matches!(result, Err(InitError::ShutDown)));
    }

    #[tokio::test]
    async fn test_shutdown_seals_untouched_cells() {
        let factory = CountingFactory::default();
        let constructions = factory.constructions.clone();
        let manager = manager(factory, vec![provider("claude")]);

        let report = manager.shutdown_all().await;
        assert!(report.closed.is_empty());
        assert!(matches!(
            manager.get_or_init("claude").await,
            Err(InitError::ShutDown)
        ));
        assert_eq!(constructions.load(Ordering::SeqCst), 0);
    }
}
