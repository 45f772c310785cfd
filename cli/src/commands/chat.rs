//! Single chat turn command

use crate::config::CliConfigLoader;
use anyhow::Result;
use std::process::ExitCode;
use switchboard_core::{ChatRequest, Conversation, Dispatcher, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Arguments for `switchboard chat`
#[derive(Debug, Clone)]
pub struct ChatArgs {
    pub message: String,
    /// Print the reply (or failure) as JSON
    pub json: bool,
}

/// Run one turn against the selected provider and print the answer.
///
/// Turn failures are printed as `error[<kind>]: <message>` and turned into a
/// non-zero exit code; configuration problems surface as `Err`.
pub async fn chat_command(args: ChatArgs, config_loader: CliConfigLoader) -> Result<ExitCode> {
    let config = config_loader.load().await?;
    let dispatcher = Dispatcher::from_config(&config)?;
    if let Some(provider) = dispatcher.clients().default_provider() {
        info!("🤖 Using provider: {}", provider);
    }

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling turn");
                cancel.cancel();
            }
        })
    };

    let conversation = Conversation::new().with(Message::user(args.message));
    let result = dispatcher
        .chat(ChatRequest::new(conversation).with_cancel(cancel))
        .await;
    interrupt.abort();

    let report = dispatcher.clients().shutdown_all().await;
    debug!(closed = ?report.closed, failures = report.failures.len(), "Shutdown complete");

    match result {
        Ok(reply) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&reply)?);
            } else {
                println!("{}", reply.final_text);
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            let failure = e.to_failure();
            if args.json {
                println!("{}", serde_json::to_string_pretty(&failure)?);
            } else {
                eprintln!("error[{}]: {}", failure.error_kind, failure.message);
            }
            Ok(ExitCode::FAILURE)
        }
    }
}
