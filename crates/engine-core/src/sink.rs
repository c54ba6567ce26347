use async_trait::async_trait;
use model::records::{destination::RawDestination, row::Row};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SinkError {
    #[error("Upload queue is closed")]
    Closed,

    #[error("Invalid RAW destination '{0}': database and table must be non-empty")]
    InvalidDestination(RawDestination),
}

/// Accepts rows bound for a RAW destination.
///
/// Implementations may buffer; acceptance does not mean the row has been
/// uploaded yet. `add` may wait while earlier rows are being flushed.
#[async_trait]
pub trait UploadSink: Send + Sync {
    async fn add(&self, destination: &RawDestination, row: Row) -> Result<(), SinkError>;
}
