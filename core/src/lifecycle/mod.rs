//! Process-wide provider client lifecycle

pub mod factory;
pub mod manager;

pub use factory::{ClientFactory, HttpClientFactory};
pub use manager::{ClientManager, ProviderStatus, ShutdownFailure, ShutdownReport};
