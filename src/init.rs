use crate::hook::Hook;
use crate::layer::StackdriverLayer;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Layer installation settings.
///
/// **Fields**
/// - `enable_stdout`: when `true`, a `tracing_subscriber::fmt::Layer` is
///   stacked on top of [`StackdriverLayer`] so events are also printed to
///   the console.
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub enable_stdout: bool,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self { enable_stdout: true }
    }
}

/// Install `hook` as part of the global `tracing` subscriber.
///
/// **Parameters**
/// - `hook`: configured [`Hook`]; set its labels and sync context first,
///   it cannot be changed once installed.
/// - `config`: [`LayerConfig`] controlling console output.
///
/// **Returns**
/// - `Err(..)` if a global subscriber was already set.
pub fn init_tracing_with_config(hook: Hook, config: LayerConfig) -> Result<(), SetGlobalDefaultError> {
    let layer = StackdriverLayer::new(hook);

    // The two stacks have different types, so each is installed on its own.
    if config.enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer();
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)
    }
}

/// Install `hook` with [`LayerConfig::default`].
pub fn init_tracing(hook: Hook) -> Result<(), SetGlobalDefaultError> {
    init_tracing_with_config(hook, LayerConfig::default())
}

/// Build a buffered HTTP client and hook from the environment and install
/// it globally.
///
/// Reads the variables in [`crate::env`]; the log id defaults to `app`.
/// Returns the client so the caller can close it before exiting.
#[cfg(feature = "http")]
pub fn init_from_env(
    labels: &[&str],
    config: LayerConfig,
) -> Result<std::sync::Arc<crate::stackdriver::StackdriverClient>, Box<dyn std::error::Error + Send + Sync>> {
    use crate::client::LoggerOptions;
    use crate::env::{env_or, STACKDRIVER_LOG_ID_ENV};
    use crate::stackdriver::StackdriverClient;
    use std::sync::Arc;

    let client = Arc::new(StackdriverClient::from_env()?);
    let log_id = env_or(STACKDRIVER_LOG_ID_ENV, "app");
    let hook = Hook::new(client.clone(), &log_id, LoggerOptions::default()).with_labels(labels.iter().copied());

    init_tracing_with_config(hook, config)?;
    Ok(client)
}
