use engine_core::retry::RetryPolicy;
use std::time::Duration;

/// Largest number of rows sent in one RAW insert request.
pub const MAX_ROWS_PER_REQUEST: usize = 10_000;

/// Flush policy for the upload queue.
#[derive(Clone, Debug)]
pub struct QueueConfig {
    /// Buffered rows that force a flush on the next `add`.
    pub max_queue_size: usize,

    /// Maximum time between two flushes.
    pub upload_interval: Duration,

    /// Rows per insert request.
    pub max_rows_per_request: usize,

    /// Retry policy for transient upload failures
    pub retry: RetryPolicy,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 50_000,
            upload_interval: Duration::from_secs(30),
            max_rows_per_request: MAX_ROWS_PER_REQUEST,
            retry: RetryPolicy::for_uploads(),
        }
    }
}

impl QueueConfig {
    pub fn with_max_queue_size(mut self, size: usize) -> Self {
        self.max_queue_size = size.max(1);
        self
    }

    pub fn with_upload_interval(mut self, interval: Duration) -> Self {
        self.upload_interval = interval;
        self
    }

    pub fn with_max_rows_per_request(mut self, rows: usize) -> Self {
        self.max_rows_per_request = rows.clamp(1, MAX_ROWS_PER_REQUEST);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}
