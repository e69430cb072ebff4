use std::sync::Arc;
use std::time::Duration;

use stackdriver_hook::client::{LoggerOptions, LoggingClient, SyncContext};
use stackdriver_hook::hook::Hook;
use stackdriver_hook::http::HttpConfig;
use stackdriver_hook::init::{init_tracing_with_config, LayerConfig};
use stackdriver_hook::stackdriver::{ClientConfig, StackdriverClient};
use tracing::{error, warn};

/// Synchronous delivery: every event waits for Cloud Logging to
/// acknowledge it, bounded by a per-call timeout.
#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let project_id = std::env::var("STACKDRIVER_PROJECT_ID")?;
    let client = Arc::new(StackdriverClient::with_http(
        project_id,
        HttpConfig::from_env(),
        ClientConfig::default(),
    )?);

    let hook = Hook::new_sync(
        client.clone(),
        "payments",
        LoggerOptions::default().common_label("service", "payments"),
    )
    .with_labels(["customer_id"])
    .with_sync_context(SyncContext::background().with_timeout(Duration::from_secs(5)));

    init_tracing_with_config(hook, LayerConfig { enable_stdout: false })?;

    warn!(customer_id = 42, attempt = 3, "card declined");
    error!(customer_id = 42, "payment abandoned");

    client.close().await?;
    Ok(())
}
