use crate::{
    error::RunError,
    execution::runner::{ExtractionRunner, RunSummary},
};
use engine_config::settings::QueryJob;
use futures::FutureExt;
use std::{any::Any, panic::AssertUnwindSafe, sync::Arc};
use tokio::{sync::Semaphore, task::JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span, warn};

#[derive(Debug)]
pub enum JobStatus {
    Completed(RunSummary),
    Failed(RunError),
    /// Shutdown was requested before the job got a worker.
    NotStarted,
    /// The worker task panicked or was aborted.
    Crashed(String),
}

#[derive(Debug)]
pub struct JobOutcome {
    pub job: QueryJob,
    pub status: JobStatus,
}

/// Runs every job with at most `parallelism` runners active at once.
/// Outcomes are returned in job order.
pub async fn run_jobs(
    runner: Arc<ExtractionRunner>,
    jobs: Vec<QueryJob>,
    parallelism: usize,
    cancel: CancellationToken,
) -> Vec<JobOutcome> {
    let parallelism = parallelism.max(1);
    info!(jobs = jobs.len(), parallelism, "Launching workers");

    let permits = Arc::new(Semaphore::new(parallelism));
    let mut statuses: Vec<Option<JobStatus>> = jobs.iter().map(|_| None).collect();
    let mut workers = JoinSet::new();

    for (idx, job) in jobs.iter().enumerate() {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            permit = Arc::clone(&permits).acquire_owned() => permit.ok(),
        };
        let Some(permit) = permit else {
            warn!(job = %job.id, "Shutdown requested, job not started");
            statuses[idx] = Some(JobStatus::NotStarted);
            continue;
        };

        let runner = Arc::clone(&runner);
        let job = job.clone();
        let span = info_span!("job", id = %job.id);
        workers.spawn(
            async move {
                let _permit = permit;
                let status = match AssertUnwindSafe(runner.run(&job)).catch_unwind().await {
                    Ok(Ok(summary)) => JobStatus::Completed(summary),
                    Ok(Err(err)) => JobStatus::Failed(err),
                    Err(panic) => {
                        let reason = panic_message(panic.as_ref());
                        error!(reason = %reason, "Runner panicked");
                        JobStatus::Crashed(reason)
                    }
                };
                (idx, status)
            }
            .instrument(span),
        );
    }

    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok((idx, status)) => statuses[idx] = Some(status),
            Err(err) => error!(error = %err, "Worker task failed"),
        }
    }

    jobs.into_iter()
        .zip(statuses)
        .map(|(job, status)| JobOutcome {
            job,
            status: status.unwrap_or_else(|| {
                JobStatus::Crashed("worker ended without reporting a result".to_string())
            }),
        })
        .collect()
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}
