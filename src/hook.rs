use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::client::{LoggerOptions, LoggingClient, RemoteLogger, SyncContext};
use crate::entry::Entry;
use crate::error::LoggingError;
use crate::record::{Level, LogRecord};
use crate::severity::Severity;

/// Translates [`LogRecord`]s into Cloud Logging [`Entry`]s and hands them
/// to a [`RemoteLogger`], either buffered or synchronously.
///
/// Fields whose names are in the label set become entry labels (values
/// stringified); every other field goes into the JSON payload next to
/// `message`, unmodified.
///
/// ```no_run
/// # use std::sync::Arc;
/// # use stackdriver_hook::{client::LoggerOptions, hook::Hook, memory::MemoryClient};
/// let client = Arc::new(MemoryClient::new());
/// let hook = Hook::new(client, "my-log", LoggerOptions::default()).with_labels(["animal"]);
/// ```
///
/// Configuration takes `&mut self`: set labels and the sync context before
/// the hook is installed and starts seeing traffic.
pub struct Hook {
    client: Arc<dyn LoggingClient>,
    logger: Arc<dyn RemoteLogger>,
    labels: HashSet<String>,
    sync_ctx: SyncContext,
    sync: bool,
}

impl Hook {
    fn init(sync: bool, client: Arc<dyn LoggingClient>, log_id: &str, options: LoggerOptions) -> Self {
        let logger = client.logger(log_id, options);
        Hook {
            client,
            logger,
            labels: HashSet::new(),
            sync_ctx: SyncContext::background(),
            sync,
        }
    }

    /// Hook that relays entries through the client's buffered path.
    ///
    /// The client buffers entries; call its `flush` or `close` before the
    /// program exits or the tail of the log is lost.
    pub fn new(client: Arc<dyn LoggingClient>, log_id: &str, options: LoggerOptions) -> Self {
        Self::init(false, client, log_id, options)
    }

    /// Hook that waits for the service to acknowledge every entry.
    ///
    /// Each log call pays a full round trip; prefer [`Hook::new`] unless
    /// losing the tail of the log on a crash is unacceptable. Use
    /// [`Hook::set_sync_context`] to bound or cancel those calls.
    pub fn new_sync(client: Arc<dyn LoggingClient>, log_id: &str, options: LoggerOptions) -> Self {
        Self::init(true, client, log_id, options)
    }

    /// Context applied to every synchronous send. Ignored in buffered mode.
    pub fn set_sync_context(&mut self, ctx: SyncContext) {
        self.sync_ctx = ctx;
    }

    /// Builder form of [`Hook::set_sync_context`].
    pub fn with_sync_context(mut self, ctx: SyncContext) -> Self {
        self.set_sync_context(ctx);
        self
    }

    /// Replace the label set. Passing nothing clears it.
    pub fn set_labels<I, S>(&mut self, labels: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
    }

    /// Builder form of [`Hook::set_labels`].
    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_labels(labels);
        self
    }

    /// Field names currently promoted to labels.
    pub fn labels(&self) -> &HashSet<String> {
        &self.labels
    }

    /// Whether entries are sent synchronously.
    pub fn is_sync(&self) -> bool {
        self.sync
    }

    /// Context used for synchronous sends.
    pub fn sync_context(&self) -> &SyncContext {
        &self.sync_ctx
    }

    /// The client this hook's logger came from, e.g. to flush it on shutdown.
    pub fn client(&self) -> &Arc<dyn LoggingClient> {
        &self.client
    }

    /// Levels this hook wants to receive: all of them.
    pub fn levels(&self) -> &'static [Level] {
        &Level::ALL
    }

    /// Build the remote entry for `record` without sending it.
    pub fn entry_for(&self, record: &LogRecord) -> Entry {
        let mut payload = serde_json::Map::new();
        let mut labels = BTreeMap::new();

        payload.insert("message".to_string(), serde_json::Value::String(record.message.clone()));

        for (name, value) in &record.fields {
            if self.labels.contains(name) {
                labels.insert(name.clone(), label_value(value));
            } else {
                payload.insert(name.clone(), value.clone());
            }
        }

        Entry {
            timestamp: record.timestamp,
            severity: Severity::from(record.level),
            payload,
            labels,
        }
    }

    /// Send `record` to the remote log.
    ///
    /// In synchronous mode the delivery error, if any, is returned as-is.
    /// In buffered mode this always returns `Ok(())`.
    pub fn fire(&self, record: &LogRecord) -> Result<(), LoggingError> {
        let entry = self.entry_for(record);

        if self.sync {
            return self.logger.log_sync(&self.sync_ctx, entry);
        }
        self.logger.log(entry);
        Ok(())
    }
}

// Strings go through verbatim; everything else uses its JSON text form.
fn label_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
