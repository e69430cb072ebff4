use std::error::Error;

/// Errors produced while handing entries to a remote logging client.
///
/// Only the synchronous delivery path ever returns these to the caller of
/// [`crate::hook::Hook::fire`]; buffered failures go to the client's error
/// handler instead.
#[derive(thiserror::Error, Debug)]
pub enum LoggingError {
    #[error("synchronous delivery cancelled")]
    Cancelled,

    #[error("synchronous delivery deadline exceeded")]
    DeadlineExceeded,

    #[error("logging client is closed")]
    Closed,

    #[error("log buffer is full, entry dropped")]
    BufferFull,

    #[error("no tokio runtime available to drive the logging client")]
    NoRuntime,

    #[error("synchronous delivery cannot block a current-thread tokio runtime")]
    UnsupportedRuntime,

    #[error("missing configuration: {0}")]
    MissingConfig(&'static str),

    #[error("entry rejected: {0}")]
    Rejected(String),

    #[error("Cloud Logging write failed with status {status}: {body}")]
    Http { status: u16, body: String },

    #[error("failed to serialize entries: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn Error + Send + Sync>),
}
