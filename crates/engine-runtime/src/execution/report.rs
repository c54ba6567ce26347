use crate::execution::workers::{JobOutcome, JobStatus};
use engine_core::metrics::MetricsSnapshot;
use engine_processing::queue::UploadReport;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStatus {
    Succeeded,
    /// A job did not complete or some rows could not be uploaded.
    Failed,
    /// Shutdown was requested; whatever was extracted has been uploaded.
    Cancelled,
}

/// Result of a whole extraction: every job plus the final upload totals.
#[derive(Debug)]
pub struct ExtractionReport {
    pub jobs: Vec<JobOutcome>,
    pub upload: UploadReport,
    pub metrics: MetricsSnapshot,
    pub elapsed: Duration,
}

impl JobOutcome {
    fn was_interrupted(&self) -> bool {
        match &self.status {
            JobStatus::Completed(summary) => summary.cancelled,
            JobStatus::NotStarted => true,
            JobStatus::Failed(_) | JobStatus::Crashed(_) => false,
        }
    }
}

impl ExtractionReport {
    /// Any failure wins over cancellation; a run is only `Cancelled` when some
    /// job was stopped or never started because of a shutdown request.
    pub fn status(&self) -> ExtractionStatus {
        if self.failed_jobs().next().is_some() || !self.upload.is_clean() {
            ExtractionStatus::Failed
        } else if self.jobs.iter().any(JobOutcome::was_interrupted) {
            ExtractionStatus::Cancelled
        } else {
            ExtractionStatus::Succeeded
        }
    }

    pub fn failed_jobs(&self) -> impl Iterator<Item = &JobOutcome> {
        self.jobs
            .iter()
            .filter(|o| matches!(o.status, JobStatus::Failed(_) | JobStatus::Crashed(_)))
    }

    pub fn rows_submitted(&self) -> u64 {
        self.jobs
            .iter()
            .filter_map(|o| match &o.status {
                JobStatus::Completed(summary) => Some(summary.rows_submitted),
                _ => None,
            })
            .sum()
    }

    pub fn log_summary(&self) {
        for outcome in &self.jobs {
            match &outcome.status {
                JobStatus::Completed(summary) => info!(
                    job = %outcome.job.id,
                    destination = %summary.destination,
                    rows = summary.rows_submitted,
                    skipped = summary.records_skipped,
                    cancelled = summary.cancelled,
                    "Job completed"
                ),
                JobStatus::Failed(err) => error!(
                    job = %outcome.job.id,
                    destination = %outcome.job.destination,
                    error = %err,
                    "Job failed"
                ),
                JobStatus::NotStarted => warn!(job = %outcome.job.id, "Job not started"),
                JobStatus::Crashed(reason) => {
                    error!(job = %outcome.job.id, reason = %reason, "Job crashed")
                }
            }
        }

        info!(
            status = ?self.status(),
            records_read = self.metrics.records_read,
            rows_submitted = self.metrics.rows_submitted,
            records_skipped = self.metrics.records_skipped,
            rows_uploaded = self.upload.rows_uploaded,
            rows_failed = self.upload.rows_failed,
            retries = self.metrics.retry_count,
            duration_ms = self.elapsed.as_millis() as u64,
            "Extraction finished"
        );
    }
}
