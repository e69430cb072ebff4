use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use tracing::instrument::WithSubscriber;
use tracing::subscriber::NoSubscriber;

use crate::client::{LoggerOptions, LoggingClient, RemoteLogger, SyncContext};
use crate::entry::{log_name, Entry, MonitoredResource, WriteRequest};
use crate::error::LoggingError;
use crate::transport::Transport;

/// Callback receiving failures that cannot be returned to a caller:
/// buffered writes that failed and entries dropped on a full queue.
pub type ErrorHandler = Arc<dyn Fn(&LoggingError) + Send + Sync>;

/// Client-wide settings for [`StackdriverClient`].
#[derive(Clone)]
pub struct ClientConfig {
    pub on_error: ErrorHandler,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            on_error: Arc::new(|e: &LoggingError| eprintln!("cloud logging error: {}", e)),
        }
    }
}

impl ClientConfig {
    pub fn on_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(&LoggingError) + Send + Sync + 'static,
    {
        self.on_error = Arc::new(handler);
        self
    }
}

/// Delivery counters of one logger.
#[derive(Debug, Default)]
pub struct LoggerStats {
    /// Accepted into the queue.
    pub enqueued: AtomicU64,
    /// Rejected because the queue was full or the client closed.
    pub dropped: AtomicU64,
    /// Acknowledged by the transport.
    pub written: AtomicU64,
    /// Lost to a failed write.
    pub failed: AtomicU64,
}

enum Command {
    Write(Entry),
    Flush(oneshot::Sender<Result<(), LoggingError>>),
    Shutdown(oneshot::Sender<Result<(), LoggingError>>),
}

struct Shared {
    project_id: String,
    transport: Arc<dyn Transport>,
    runtime: Handle,
    on_error: ErrorHandler,
    loggers: Mutex<Vec<mpsc::Sender<Command>>>,
    closed: AtomicBool,
}

/// Buffered Cloud Logging client.
///
/// Every logger gets its own background task pulling entries from a bounded
/// channel, batching them and writing each batch through the
/// [`Transport`]. Nothing is retried: failed batches are reported through
/// [`ClientConfig::on_error`] and dropped.
///
/// Workers run on the tokio runtime the client was created in. Call
/// [`LoggingClient::close`] before the runtime shuts down, or buffered
/// entries are lost.
#[derive(Clone)]
pub struct StackdriverClient {
    shared: Arc<Shared>,
}

impl StackdriverClient {
    /// Create a client for `project_id`.
    ///
    /// **Returns**
    /// - `Err(LoggingError::NoRuntime)` when called outside a tokio runtime.
    pub fn new(
        project_id: impl Into<String>,
        transport: Arc<dyn Transport>,
        config: ClientConfig,
    ) -> Result<Self, LoggingError> {
        let runtime = Handle::try_current().map_err(|_| LoggingError::NoRuntime)?;
        Ok(StackdriverClient {
            shared: Arc::new(Shared {
                project_id: project_id.into(),
                transport,
                runtime,
                on_error: config.on_error,
                loggers: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
            }),
        })
    }

    pub fn project_id(&self) -> &str {
        &self.shared.project_id
    }

    /// Same as [`LoggingClient::logger`] but keeps the concrete type, so the
    /// caller can read [`StackdriverLogger::stats`].
    pub fn stackdriver_logger(&self, log_id: &str, options: LoggerOptions) -> Arc<StackdriverLogger> {
        // Enforce minimal thresholds to avoid degenerate configs.
        let buffer = options.buffer.max(16);
        let batch_size = options.batch_size.max(1);
        let flush_interval = options.flush_interval.max(Duration::from_millis(10));

        let template = Arc::new(RequestTemplate {
            log_name: log_name(&self.shared.project_id, log_id),
            resource: options.resource.unwrap_or_default(),
            labels: options.common_labels,
        });
        let stats = Arc::new(LoggerStats::default());
        let (tx, rx) = mpsc::channel::<Command>(buffer);

        // A closed client hands out loggers whose queue is already closed.
        if !self.shared.closed.load(Ordering::Acquire) {
            self.lock_loggers().push(tx.clone());
            let worker = run_worker(
                rx,
                Arc::clone(&template),
                Arc::clone(&self.shared),
                Arc::clone(&stats),
                batch_size,
                flush_interval,
            );
            self.shared.runtime.spawn(quiet(worker));
        }

        Arc::new(StackdriverLogger {
            sender: tx,
            template,
            shared: Arc::clone(&self.shared),
            stats,
        })
    }

    fn lock_loggers(&self) -> std::sync::MutexGuard<'_, Vec<mpsc::Sender<Command>>> {
        self.shared.loggers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Send a control command to every worker and wait for each reply.
    // Returns the first write error any worker reported.
    async fn broadcast<F>(&self, senders: Vec<mpsc::Sender<Command>>, make: F) -> Result<(), LoggingError>
    where
        F: Fn(oneshot::Sender<Result<(), LoggingError>>) -> Command,
    {
        let mut first_err = None;
        for sender in senders {
            let (tx, rx) = oneshot::channel();
            if sender.send(make(tx)).await.is_err() {
                continue;
            }
            if let Ok(Err(e)) = rx.await {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

#[async_trait]
impl LoggingClient for StackdriverClient {
    fn logger(&self, log_id: &str, options: LoggerOptions) -> Arc<dyn RemoteLogger> {
        self.stackdriver_logger(log_id, options)
    }

    async fn flush(&self) -> Result<(), LoggingError> {
        let senders = self.lock_loggers().clone();
        self.broadcast(senders, Command::Flush).await
    }

    async fn close(&self) -> Result<(), LoggingError> {
        self.shared.closed.store(true, Ordering::Release);
        let senders = std::mem::take(&mut *self.lock_loggers());
        self.broadcast(senders, Command::Shutdown).await
    }
}

struct RequestTemplate {
    log_name: String,
    resource: MonitoredResource,
    labels: BTreeMap<String, String>,
}

impl RequestTemplate {
    fn request(&self, entries: Vec<Entry>) -> WriteRequest {
        WriteRequest {
            log_name: self.log_name.clone(),
            resource: self.resource.clone(),
            labels: self.labels.clone(),
            entries,
        }
    }
}

/// Logger handed out by [`StackdriverClient`].
pub struct StackdriverLogger {
    sender: mpsc::Sender<Command>,
    template: Arc<RequestTemplate>,
    shared: Arc<Shared>,
    stats: Arc<LoggerStats>,
}

impl StackdriverLogger {
    pub fn log_name(&self) -> &str {
        &self.template.log_name
    }

    pub fn stats(&self) -> &LoggerStats {
        &self.stats
    }
}

impl RemoteLogger for StackdriverLogger {
    fn log(&self, entry: Entry) {
        let err = match self.sender.try_send(Command::Write(entry)) {
            Ok(()) => {
                self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                return;
            }
            Err(TrySendError::Full(_)) => LoggingError::BufferFull,
            Err(TrySendError::Closed(_)) => LoggingError::Closed,
        };
        self.stats.dropped.fetch_add(1, Ordering::Relaxed);
        (self.shared.on_error)(&err);
    }

    fn log_sync(&self, ctx: &SyncContext, entry: Entry) -> Result<(), LoggingError> {
        ctx.check()?;
        if self.shared.closed.load(Ordering::Acquire) {
            return Err(LoggingError::Closed);
        }

        // Blocking below would starve a current-thread runtime of the very
        // task it waits for.
        let inside_runtime = match Handle::try_current() {
            Ok(current) if current.runtime_flavor() == RuntimeFlavor::CurrentThread => {
                return Err(LoggingError::UnsupportedRuntime);
            }
            Ok(_) => true,
            Err(_) => false,
        };

        let request = self.template.request(vec![entry]);
        let transport = Arc::clone(&self.shared.transport);
        let ctx = ctx.clone();
        let (tx, rx) = std::sync::mpsc::sync_channel(1);

        self.shared.runtime.spawn(quiet(async move {
            let res = ctx.run(transport.write_entries(&request)).await;
            let _ = tx.send(res);
        }));

        let received = if inside_runtime {
            tokio::task::block_in_place(|| rx.recv())
        } else {
            rx.recv()
        };
        // The task only disappears without replying if the runtime is gone.
        let res = received.map_err(|_| LoggingError::Closed)?;

        match &res {
            Ok(()) => self.stats.written.fetch_add(1, Ordering::Relaxed),
            Err(_) => self.stats.failed.fetch_add(1, Ordering::Relaxed),
        };
        res
    }
}

// Delivery runs with no subscriber: the transport's own `tracing` events
// (hyper, reqwest) must not come back into the layer and be shipped again.
fn quiet<F>(fut: F) -> tracing::instrument::WithDispatch<F> {
    fut.with_subscriber(NoSubscriber::default())
}

async fn run_worker(
    mut rx: mpsc::Receiver<Command>,
    template: Arc<RequestTemplate>,
    shared: Arc<Shared>,
    stats: Arc<LoggerStats>,
    batch_size: usize,
    flush_interval: Duration,
) {
    let mut batch = Vec::with_capacity(batch_size);
    let mut ticker = interval_at(Instant::now() + flush_interval, flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            command = rx.recv() => match command {
                Some(Command::Write(entry)) => {
                    batch.push(entry);
                    if batch.len() >= batch_size {
                        let _ = write_batch(&template, &shared, &stats, &mut batch).await;
                    }
                }
                Some(Command::Flush(done)) => {
                    let res = write_batch(&template, &shared, &stats, &mut batch).await;
                    let _ = done.send(res);
                }
                Some(Command::Shutdown(done)) => {
                    rx.close();
                    let mut waiting = Vec::new();
                    while let Ok(command) = rx.try_recv() {
                        match command {
                            Command::Write(entry) => batch.push(entry),
                            Command::Flush(other) | Command::Shutdown(other) => waiting.push(other),
                        }
                    }
                    let res = write_batch(&template, &shared, &stats, &mut batch).await;
                    // The write error, if any, went to `on_error` and to the closing caller.
                    for other in waiting {
                        let _ = other.send(Ok(()));
                    }
                    let _ = done.send(res);
                    break;
                }
                None => {
                    let _ = write_batch(&template, &shared, &stats, &mut batch).await;
                    break;
                }
            },
            _ = ticker.tick() => {
                if !batch.is_empty() {
                    let _ = write_batch(&template, &shared, &stats, &mut batch).await;
                }
            }
        }
    }
}

async fn write_batch(
    template: &RequestTemplate,
    shared: &Shared,
    stats: &LoggerStats,
    batch: &mut Vec<Entry>,
) -> Result<(), LoggingError> {
    if batch.is_empty() {
        return Ok(());
    }

    let count = batch.len() as u64;
    let request = template.request(batch.drain(..).collect());

    match shared.transport.write_entries(&request).await {
        Ok(()) => {
            stats.written.fetch_add(count, Ordering::Relaxed);
            Ok(())
        }
        Err(e) => {
            stats.failed.fetch_add(count, Ordering::Relaxed);
            (shared.on_error)(&e);
            Err(e)
        }
    }
}
