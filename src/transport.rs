use async_trait::async_trait;

use crate::entry::WriteRequest;
use crate::error::LoggingError;

/// Asynchronous carrier for [`WriteRequest`]s produced by
/// [`crate::stackdriver::StackdriverClient`].
///
/// Implementations move a request to a concrete endpoint (the Cloud Logging
/// REST API, a local emulator, a test double). The client calls
/// `write_entries` from its background workers for buffered entries and
/// from a spawned task for synchronous ones.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Write one batch of entries.
    ///
    /// **Returns**
    /// - `Ok(())` if the service accepted the whole request.
    /// - `Err(..)` otherwise. The client does not retry; buffered failures
    ///   go to its error handler, synchronous ones to the caller.
    async fn write_entries(&self, request: &WriteRequest) -> Result<(), LoggingError>;
}
