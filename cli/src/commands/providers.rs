//! Provider listing command

use crate::config::CliConfigLoader;
use anyhow::Result;
use futures::future::join_all;
use switchboard_core::{ClientManager, ProviderStatus};
use tracing::info;

/// List configured providers; with `probe`, initialize each one first
pub async fn providers_command(config_loader: CliConfigLoader, probe: bool) -> Result<()> {
    let config = config_loader.load().await?;
    let manager = ClientManager::from_config(&config);

    if probe {
        info!("Probing {} providers", config.providers.len());
        join_all(manager.provider_ids().into_iter().map(|id| manager.get_or_init(id))).await;
    }

    let default = manager.default_provider().map(str::to_string);
    for (id, status) in manager.status().await {
        let Some(settings) = manager.settings(&id) else {
            continue;
        };
        let marker = if default.as_deref() == Some(id.as_str()) {
            "*"
        } else {
            " "
        };
        let credential = if settings.resolve_api_key().is_some() {
            "credential set"
        } else {
            "no credential"
        };

        println!("{} {} ({}, {})", marker, id, settings.protocol, settings.model);
        println!("    {}", settings.base_url());
        println!("    {}; {}", credential, describe(&status));
    }

    manager.shutdown_all().await;
    Ok(())
}

fn describe(status: &ProviderStatus) -> String {
    match status {
        ProviderStatus::Uninitialized => "not initialized".to_string(),
        ProviderStatus::Ready { model } => format!("ready ({})", model),
        ProviderStatus::Unavailable { reason } => format!("unavailable: {}", reason),
    }
}
