use std::sync::Arc;

use stackdriver_hook::client::{LoggerOptions, LoggingClient};
use stackdriver_hook::hook::Hook;
use stackdriver_hook::init::{init_tracing_with_config, LayerConfig};
use stackdriver_hook::stackdriver::StackdriverClient;
use tracing::info;

/// Buffered delivery: configure from `STACKDRIVER_*` variables, log, then
/// close the client so the last batch is written before exit.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let client = Arc::new(StackdriverClient::from_env()?);
    let hook = Hook::new(client.clone(), "my-log", LoggerOptions::default()).with_labels(["animal"]);

    init_tracing_with_config(hook, LayerConfig::default())?;

    info!(animal = "walrus", number = 1, size = 10, "A walrus appears");

    client.close().await?;
    Ok(())
}
