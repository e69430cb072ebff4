use async_trait::async_trait;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::entry::{Entry, MonitoredResource};
use crate::error::LoggingError;

/// A remote logging client that hands out named loggers.
///
/// The client may be shared by any number of hooks. Hooks never flush or
/// close it; that is the application's job, typically right before exit so
/// that buffered entries are not lost.
#[async_trait]
pub trait LoggingClient: Send + Sync {
    /// Obtain a logger writing to `log_id`. `options` are interpreted by the
    /// client alone.
    fn logger(&self, log_id: &str, options: LoggerOptions) -> Arc<dyn RemoteLogger>;

    /// Block until every buffered entry has been handed to the service.
    ///
    /// Default implementation is a no-op.
    async fn flush(&self) -> Result<(), LoggingError> {
        Ok(())
    }

    /// Flush and release the client's resources.
    ///
    /// Default implementation is a no-op.
    async fn close(&self) -> Result<(), LoggingError> {
        Ok(())
    }
}

/// A named log on the remote service.
pub trait RemoteLogger: Send + Sync {
    /// Enqueue `entry` for buffered delivery.
    ///
    /// Must not block beyond an in-memory enqueue. Failures are reported
    /// through the client's own error handler, never to the caller.
    fn log(&self, entry: Entry);

    /// Deliver `entry` and wait for the service to acknowledge it.
    ///
    /// Blocks the calling thread for one round trip, bounded by `ctx`.
    fn log_sync(&self, ctx: &SyncContext, entry: Entry) -> Result<(), LoggingError>;
}

/// Per-logger settings forwarded untouched from the hook to the client.
#[derive(Debug, Clone)]
pub struct LoggerOptions {
    /// Labels attached to every entry written by this logger.
    pub common_labels: BTreeMap<String, String>,
    /// Resource entries are attributed to; `global` when unset.
    pub resource: Option<MonitoredResource>,
    /// Maximum number of entries queued before new ones are dropped.
    pub buffer: usize,
    /// Entries per `entries:write` call.
    pub batch_size: usize,
    /// Longest time an entry waits in a partial batch.
    pub flush_interval: Duration,
}

impl Default for LoggerOptions {
    fn default() -> Self {
        Self {
            common_labels: BTreeMap::new(),
            resource: None,
            buffer: 1024,
            batch_size: 128,
            flush_interval: Duration::from_secs(1),
        }
    }
}

impl LoggerOptions {
    pub fn common_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.common_labels.insert(key.into(), value.into());
        self
    }

    pub fn resource(mut self, resource: MonitoredResource) -> Self {
        self.resource = Some(resource);
        self
    }

    pub fn buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer;
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn flush_interval(mut self, flush_interval: Duration) -> Self {
        self.flush_interval = flush_interval;
        self
    }
}

/// Cancellation and deadline applied to each synchronous delivery.
///
/// [`SyncContext::background`] never cancels and has no deadline. A
/// deadline is absolute: once it has passed, every later call fails. A
/// timeout is relative and restarts with each call.
#[derive(Debug, Clone, Default)]
pub struct SyncContext {
    deadline: Option<Instant>,
    timeout: Option<Duration>,
    cancel: Option<CancellationToken>,
}

impl SyncContext {
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Deadline for a call starting at `now`: the earlier of the absolute
    /// deadline and `now + timeout`.
    pub fn effective_deadline(&self, now: Instant) -> Option<Instant> {
        let relative = self.timeout.map(|timeout| now + timeout);
        match (self.deadline, relative) {
            (Some(absolute), Some(relative)) => Some(absolute.min(relative)),
            (absolute, relative) => absolute.or(relative),
        }
    }

    /// Fail fast when the context is already cancelled or past its deadline.
    pub fn check(&self) -> Result<(), LoggingError> {
        if self.cancel.as_ref().is_some_and(|token| token.is_cancelled()) {
            return Err(LoggingError::Cancelled);
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(LoggingError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Drive `fut` to completion unless the context is cancelled or its
    /// deadline passes first.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, LoggingError>
    where
        F: Future<Output = Result<T, LoggingError>>,
    {
        self.check()?;

        let deadline = self.effective_deadline(Instant::now());
        let cancel = self.cancel.clone();

        let cancelled = async move {
            match cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };
        let expired = async move {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            res = fut => res,
            _ = cancelled => Err(LoggingError::Cancelled),
            _ = expired => Err(LoggingError::DeadlineExceeded),
        }
    }
}
