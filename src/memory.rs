use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};

use crate::client::{LoggerOptions, LoggingClient, RemoteLogger, SyncContext};
use crate::entry::Entry;
use crate::error::LoggingError;

/// Which delivery path an entry took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Buffered,
    Synchronous,
}

#[derive(Default)]
struct Store {
    entries: Vec<(String, Delivery, Entry)>,
    sync_failure: Option<String>,
}

/// A client that keeps every entry in memory.
///
/// Useful for tests and for measuring the overhead of the hook without any
/// network I/O.
#[derive(Clone, Default)]
pub struct MemoryClient {
    store: Arc<Mutex<Store>>,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later synchronous delivery fail with
    /// [`LoggingError::Rejected`] carrying `message`.
    pub fn fail_sync_with(&self, message: impl Into<String>) {
        self.lock().sync_failure = Some(message.into());
    }

    /// Entries written to `log_id`, in arrival order.
    pub fn entries(&self, log_id: &str) -> Vec<(Delivery, Entry)> {
        self.lock()
            .entries
            .iter()
            .filter(|(id, _, _)| id == log_id)
            .map(|(_, delivery, entry)| (*delivery, entry.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl LoggingClient for MemoryClient {
    fn logger(&self, log_id: &str, _options: LoggerOptions) -> Arc<dyn RemoteLogger> {
        Arc::new(MemoryLogger {
            log_id: log_id.to_string(),
            client: self.clone(),
        })
    }
}

struct MemoryLogger {
    log_id: String,
    client: MemoryClient,
}

impl RemoteLogger for MemoryLogger {
    fn log(&self, entry: Entry) {
        self.client
            .lock()
            .entries
            .push((self.log_id.clone(), Delivery::Buffered, entry));
    }

    fn log_sync(&self, ctx: &SyncContext, entry: Entry) -> Result<(), LoggingError> {
        ctx.check()?;

        let mut store = self.client.lock();
        if let Some(message) = &store.sync_failure {
            return Err(LoggingError::Rejected(message.clone()));
        }
        store.entries.push((self.log_id.clone(), Delivery::Synchronous, entry));
        Ok(())
    }
}
