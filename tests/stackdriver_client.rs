//! Buffered and synchronous delivery through `StackdriverClient` with a
//! recording transport standing in for the Cloud Logging API.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use stackdriver_hook::client::{LoggerOptions, LoggingClient, RemoteLogger, SyncContext};
use stackdriver_hook::entry::{Entry, MonitoredResource, WriteRequest};
use stackdriver_hook::error::LoggingError;
use stackdriver_hook::hook::Hook;
use stackdriver_hook::record::{Level, LogRecord};
use stackdriver_hook::severity::Severity;
use stackdriver_hook::stackdriver::{ClientConfig, StackdriverClient};
use stackdriver_hook::transport::Transport;

#[derive(Default)]
struct RecordingTransport {
    requests: Mutex<Vec<WriteRequest>>,
    fail_status: Option<u16>,
    delay: Option<Duration>,
}

impl RecordingTransport {
    fn failing(status: u16) -> Self {
        Self { fail_status: Some(status), ..Default::default() }
    }

    fn slow(delay: Duration) -> Self {
        Self { delay: Some(delay), ..Default::default() }
    }

    fn batch_sizes(&self) -> Vec<usize> {
        self.requests.lock().unwrap().iter().map(|r| r.entries.len()).collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn write_entries(&self, request: &WriteRequest) -> Result<(), LoggingError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(status) = self.fail_status {
            return Err(LoggingError::Http { status, body: "unavailable".to_string() });
        }
        self.requests.lock().unwrap().push(request.clone());
        Ok(())
    }
}

fn collecting_config() -> (ClientConfig, Arc<Mutex<Vec<String>>>) {
    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&errors);
    let config = ClientConfig::default().on_error(move |e| sink.lock().unwrap().push(e.to_string()));
    (config, errors)
}

fn entry(message: &str) -> Entry {
    let mut payload = serde_json::Map::new();
    payload.insert("message".to_string(), json!(message));
    Entry {
        timestamp: Utc::now(),
        severity: Severity::Info,
        payload,
        labels: Default::default(),
    }
}

fn walrus() -> LogRecord {
    LogRecord::new(Level::Info, "A walrus appears")
        .with_field("animal", "walrus")
        .with_field("number", 1)
        .with_field("size", 10)
}

#[tokio::test]
async fn buffered_entries_are_batched_and_flushed() {
    let transport = Arc::new(RecordingTransport::default());
    let client = StackdriverClient::new("my-project", transport.clone(), ClientConfig::default()).unwrap();
    let logger = client.stackdriver_logger(
        "my-log",
        LoggerOptions::default()
            .batch_size(2)
            .flush_interval(Duration::from_secs(3600)),
    );

    for i in 0..5 {
        logger.log(entry(&format!("entry {}", i)));
    }
    client.flush().await.unwrap();

    assert_eq!(transport.batch_sizes(), vec![2, 2, 1]);
    assert_eq!(logger.stats().enqueued.load(Ordering::Relaxed), 5);
    assert_eq!(logger.stats().written.load(Ordering::Relaxed), 5);
}

#[tokio::test]
async fn walrus_reaches_the_transport_unlabelled() {
    let transport = Arc::new(RecordingTransport::default());
    let client = Arc::new(StackdriverClient::new("my-project", transport.clone(), ClientConfig::default()).unwrap());
    let hook = Hook::new(client.clone(), "my-log", LoggerOptions::default());

    assert!(hook.fire(&walrus()).is_ok());
    client.flush().await.unwrap();

    let requests = transport.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.log_name, "projects/my-project/logs/my-log");
    let entry = &request.entries[0];
    assert_eq!(entry.severity, Severity::Info);
    assert!(entry.labels.is_empty());
    assert_eq!(
        json!(entry.payload),
        json!({"message": "A walrus appears", "animal": "walrus", "number": 1, "size": 10})
    );
}

#[tokio::test]
async fn logger_options_shape_the_request() {
    let transport = Arc::new(RecordingTransport::default());
    let client = Arc::new(StackdriverClient::new("p", transport.clone(), ClientConfig::default()).unwrap());
    let options = LoggerOptions::default()
        .common_label("env", "prod")
        .resource(MonitoredResource::new("gce_instance").with_label("instance_id", "42"));
    let hook = Hook::new(client.clone(), "my-log", options).with_labels(["animal"]);

    hook.fire(&walrus()).unwrap();
    client.flush().await.unwrap();

    let requests = transport.requests.lock().unwrap();
    let value = serde_json::to_value(&requests[0]).unwrap();
    assert_eq!(value["resource"], json!({"type": "gce_instance", "labels": {"instance_id": "42"}}));
    assert_eq!(value["labels"], json!({"env": "prod"}));
    assert_eq!(value["entries"][0]["labels"], json!({"animal": "walrus"}));
    assert_eq!(value["entries"][0]["severity"], json!("INFO"));
}

#[tokio::test]
async fn buffered_failures_go_to_the_error_handler() {
    let transport = Arc::new(RecordingTransport::failing(503));
    let (config, errors) = collecting_config();
    let client = Arc::new(StackdriverClient::new("p", transport, config).unwrap());
    let hook = Hook::new(client.clone(), "my-log", LoggerOptions::default());

    assert!(hook.fire(&walrus()).is_ok());
    let flushed = client.flush().await;

    assert!(matches!(flushed, Err(LoggingError::Http { status: 503, .. })));
    let errors = errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("503"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn full_queue_drops_entries() {
    let transport = Arc::new(RecordingTransport::slow(Duration::from_millis(200)));
    let (config, errors) = collecting_config();
    let client = StackdriverClient::new("p", transport, config).unwrap();
    let logger = client.stackdriver_logger("my-log", LoggerOptions::default().buffer(16).batch_size(1));
    for i in 0..40 {
        logger.log(entry(&format!("entry {}", i)));
    }

    let stats = logger.stats();
    let enqueued = stats.enqueued.load(Ordering::Relaxed);
    let dropped = stats.dropped.load(Ordering::Relaxed);
    assert_eq!(enqueued + dropped, 40);
    assert!(dropped >= 1);
    assert!(errors.lock().unwrap().iter().all(|e| e.contains("buffer is full")));
}

#[tokio::test]
async fn closed_client_rejects_writes() {
    let transport = Arc::new(RecordingTransport::default());
    let (config, errors) = collecting_config();
    let client = Arc::new(StackdriverClient::new("p", transport.clone(), config).unwrap());
    let hook = Hook::new(client.clone(), "my-log", LoggerOptions::default());

    hook.fire(&walrus()).unwrap();
    client.close().await.unwrap();
    assert_eq!(transport.batch_sizes(), vec![1]);

    // Buffered mode still reports success to the caller.
    assert!(hook.fire(&walrus()).is_ok());
    assert_eq!(errors.lock().unwrap().clone(), vec!["logging client is closed".to_string()]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sync_delivery_waits_for_the_transport() {
    let transport = Arc::new(RecordingTransport::default());
    let client = Arc::new(StackdriverClient::new("p", transport.clone(), ClientConfig::default()).unwrap());
    let hook = Hook::new_sync(client.clone(), "my-log", LoggerOptions::default()).with_labels(["number"]);

    hook.fire(&walrus()).unwrap();

    let requests = transport.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].entries[0].labels["number"], "1");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sync_delivery_returns_transport_error() {
    let transport = Arc::new(RecordingTransport::failing(403));
    let (config, errors) = collecting_config();
    let client = Arc::new(StackdriverClient::new("p", transport, config).unwrap());
    let hook = Hook::new_sync(client.clone(), "my-log", LoggerOptions::default());

    let err = hook.fire(&walrus()).unwrap_err();

    assert!(matches!(err, LoggingError::Http { status: 403, ref body } if body == "unavailable"));
    assert!(errors.lock().unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sync_delivery_honours_timeout() {
    let transport = Arc::new(RecordingTransport::slow(Duration::from_secs(5)));
    let client = Arc::new(StackdriverClient::new("p", transport, ClientConfig::default()).unwrap());
    let hook = Hook::new_sync(client.clone(), "my-log", LoggerOptions::default())
        .with_sync_context(SyncContext::background().with_timeout(Duration::from_millis(50)));

    let err = hook.fire(&walrus()).unwrap_err();
    assert!(matches!(err, LoggingError::DeadlineExceeded));
}

#[tokio::test]
async fn sync_delivery_refuses_current_thread_runtime() {
    let transport = Arc::new(RecordingTransport::default());
    let client = Arc::new(StackdriverClient::new("p", transport.clone(), ClientConfig::default()).unwrap());
    let logger = client.logger("my-log", LoggerOptions::default());
    let res = logger.log_sync(&SyncContext::background(), entry("blocked"));

    assert!(matches!(res, Err(LoggingError::UnsupportedRuntime)));
    assert!(transport.batch_sizes().is_empty());
}
