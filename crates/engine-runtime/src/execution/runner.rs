use crate::error::RunError;
use connectors::source::CrmConnector;
use engine_config::settings::{QueryJob, RecordErrorPolicy};
use engine_core::{metrics::Metrics, sink::UploadSink};
use futures::StreamExt;
use model::{
    core::identifiers::JobId,
    records::{
        destination::RawDestination,
        row::{Record, Row},
    },
};
use std::{
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What one query run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub job: JobId,
    pub destination: RawDestination,
    pub records_read: u64,
    pub rows_submitted: u64,
    pub records_skipped: u64,
    /// The run stopped early because shutdown was requested.
    pub cancelled: bool,
    pub elapsed: Duration,
}

/// Formats a record as compact JSON, only when the event is actually logged.
struct RecordJson<'a>(&'a Record);

impl fmt::Display for RecordJson<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self.0).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

/// Streams the results of one query into the upload sink.
pub struct ExtractionRunner {
    crm: Arc<dyn CrmConnector>,
    sink: Arc<dyn UploadSink>,
    on_record_error: RecordErrorPolicy,
    metrics: Metrics,
    cancel: CancellationToken,
}

impl ExtractionRunner {
    pub fn new(
        crm: Arc<dyn CrmConnector>,
        sink: Arc<dyn UploadSink>,
        on_record_error: RecordErrorPolicy,
        metrics: Metrics,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            crm,
            sink,
            on_record_error,
            metrics,
            cancel,
        }
    }

    pub async fn run(&self, job: &QueryJob) -> Result<RunSummary, RunError> {
        let start = Instant::now();
        info!(job = %job.id, destination = %job.destination, query = %job.query, "Starting extraction");

        let mut summary = RunSummary {
            job: job.id.clone(),
            destination: job.destination.clone(),
            records_read: 0,
            rows_submitted: 0,
            records_skipped: 0,
            cancelled: false,
            elapsed: Duration::ZERO,
        };

        let session = self.crm.connect().await.map_err(|e| {
            error!(job = %job.id, error = %e, "Login failed");
            RunError::Auth(e)
        })?;
        let mut records = session.query_all(&job.query);

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    warn!(job = %job.id, rows = summary.rows_submitted, "Shutdown requested, stopping extraction");
                    summary.cancelled = true;
                    break;
                }
                next = records.next() => next,
            };

            let record = match next {
                None => break,
                Some(Ok(record)) => record,
                Some(Err(e)) => {
                    error!(job = %job.id, rows = summary.rows_submitted, error = %e, "Query failed");
                    return Err(RunError::Query(e));
                }
            };

            let position = summary.records_read;
            summary.records_read += 1;
            self.metrics.increment_records_read(1);
            debug!(job = %job.id, record = %RecordJson(&record), "Record received");

            match Row::from_record(record) {
                Ok(row) => {
                    self.sink.add(&job.destination, row).await.map_err(|e| {
                        error!(job = %job.id, error = %e, "Row rejected by upload queue");
                        RunError::Sink(e)
                    })?;
                    summary.rows_submitted += 1;
                    self.metrics.increment_rows_submitted(1);
                }
                Err(source) => match self.on_record_error {
                    RecordErrorPolicy::Abort => {
                        error!(job = %job.id, position, error = %source, "Invalid record, aborting");
                        return Err(RunError::Record { position, source });
                    }
                    RecordErrorPolicy::Skip => {
                        warn!(job = %job.id, position, error = %source, "Invalid record, skipping");
                        summary.records_skipped += 1;
                        self.metrics.increment_records_skipped(1);
                    }
                },
            }
        }

        summary.elapsed = start.elapsed();
        info!(
            job = %job.id,
            destination = %job.destination,
            rows = summary.rows_submitted,
            skipped = summary.records_skipped,
            cancelled = summary.cancelled,
            duration_ms = summary.elapsed.as_millis() as u64,
            "Extraction finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_is_logged_as_json() {
        let record = json!({"Id": "003A", "Email": "alice@acme.com"})
            .as_object()
            .cloned()
            .unwrap();
        assert_eq!(
            RecordJson(&record).to_string(),
            r#"{"Email":"alice@acme.com","Id":"003A"}"#
        );
    }
}
