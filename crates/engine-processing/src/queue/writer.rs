use crate::{error::UploadError, retry::classify_connector_error};
use connectors::cdf::RawWriter;
use engine_core::{metrics::Metrics, retry::RetryPolicy};
use model::records::{destination::RawDestination, row::Row};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteResult {
    pub rows_written: usize,
    pub duration: std::time::Duration,
}

/// Sends one chunk of rows to RAW, retrying transient failures.
pub struct ChunkWriter {
    writer: Arc<dyn RawWriter>,
    retry: RetryPolicy,
    metrics: Metrics,
}

impl ChunkWriter {
    pub fn new(writer: Arc<dyn RawWriter>, retry: RetryPolicy, metrics: Metrics) -> Self {
        Self {
            writer,
            retry,
            metrics,
        }
    }

    pub async fn write_chunk(
        &self,
        destination: &RawDestination,
        rows: &[Row],
    ) -> Result<WriteResult, UploadError> {
        let start = std::time::Instant::now();
        let mut attempts = 0u64;

        let result = self
            .retry
            .run(
                || {
                    attempts += 1;
                    self.writer.insert_rows(destination, rows)
                },
                classify_connector_error,
            )
            .await;

        if attempts > 1 {
            self.metrics.increment_retries(attempts - 1);
        }
        result.map_err(|e| UploadError::from_retry(destination, rows.len(), e))?;

        let duration = start.elapsed();
        info!(
            destination = %destination,
            rows = rows.len(),
            duration_ms = duration.as_millis() as u64,
            "Rows uploaded to RAW"
        );

        Ok(WriteResult {
            rows_written: rows.len(),
            duration,
        })
    }
}
