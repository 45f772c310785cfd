//! Tools listing command

use crate::config::CliConfigLoader;
use anyhow::Result;
use switchboard_core::tools::builtin;
use switchboard_core::Tool;
use tracing::info;

/// Show the tools a chat turn can call
pub async fn tools_command(config_loader: CliConfigLoader) -> Result<()> {
    info!("Listing available tools");

    let config = config_loader.load().await?;
    let registry = builtin::default_registry(&config.tools);

    println!("🛠️  Available Tools\n");

    for tool in registry.list() {
        println!("📦 {}", tool.name());
        // Show first line of description only for brevity
        let description = tool.description();
        let first_line = description.lines().next().unwrap_or(description);
        println!("   {}\n", first_line);
    }

    println!("{} tools registered", registry.len());

    Ok(())
}
