use super::fakes::{FakeCrm, RecordingSink, Step};
use crate::execution::{
    runner::ExtractionRunner,
    workers::{JobStatus, run_jobs},
};
use engine_config::settings::{QueryJob, RecordErrorPolicy};
use engine_core::metrics::Metrics;
use model::{core::identifiers::JobId, records::destination::RawDestination};
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn job(idx: usize, query: &str, table: &str) -> QueryJob {
    QueryJob {
        id: JobId::for_index(idx),
        query: query.to_string(),
        destination: RawDestination::new("sfdc", table),
    }
}

fn crm() -> FakeCrm {
    FakeCrm::default()
        .with_query(
            "SELECT Id FROM Contact",
            vec![
                Step::Record(json!({"Id": "003A"})),
                Step::Record(json!({"Id": "003B"})),
            ],
        )
        .with_query(
            "SELECT Id FROM Account",
            vec![Step::Record(json!({"Id": "001A"}))],
        )
        .with_query(
            "SELECT Id FROM Lead",
            vec![Step::Record(json!({"Name": "missing id"}))],
        )
}

fn runner(sink: Arc<RecordingSink>, cancel: CancellationToken) -> Arc<ExtractionRunner> {
    Arc::new(ExtractionRunner::new(
        Arc::new(crm()),
        sink,
        RecordErrorPolicy::Abort,
        Metrics::new(),
        cancel,
    ))
}

#[tokio::test]
async fn reports_every_job_in_order() {
    let sink = Arc::new(RecordingSink::default());
    let jobs = vec![
        job(0, "SELECT Id FROM Contact", "contacts"),
        job(1, "SELECT Id FROM Lead", "leads"),
        job(2, "SELECT Id FROM Account", "accounts"),
    ];

    let outcomes = run_jobs(
        runner(sink.clone(), CancellationToken::new()),
        jobs,
        2,
        CancellationToken::new(),
    )
    .await;

    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[0].job.id.as_str(), "job-0");
    assert!(matches!(&outcomes[0].status, JobStatus::Completed(s) if s.rows_submitted == 2));
    assert!(matches!(outcomes[1].status, JobStatus::Failed(_)));
    assert!(matches!(&outcomes[2].status, JobStatus::Completed(s) if s.rows_submitted == 1));

    let mut keys = sink.keys();
    keys.sort();
    assert_eq!(keys, ["001A", "003A", "003B"]);
}

#[tokio::test]
async fn single_worker_runs_jobs_sequentially() {
    let sink = Arc::new(RecordingSink::default());
    let jobs = vec![
        job(0, "SELECT Id FROM Contact", "contacts"),
        job(1, "SELECT Id FROM Account", "accounts"),
    ];

    run_jobs(
        runner(sink.clone(), CancellationToken::new()),
        jobs,
        1,
        CancellationToken::new(),
    )
    .await;

    assert_eq!(sink.keys(), ["003A", "003B", "001A"]);
}

#[tokio::test]
async fn cancelled_before_start_runs_nothing() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let sink = Arc::new(RecordingSink::default());

    let outcomes = run_jobs(
        runner(sink.clone(), cancel.clone()),
        vec![job(0, "SELECT Id FROM Contact", "contacts")],
        4,
        cancel,
    )
    .await;

    assert!(matches!(outcomes[0].status, JobStatus::NotStarted));
    assert!(sink.keys().is_empty());
}

#[tokio::test]
async fn panicking_runner_keeps_the_panic_message() {
    let runner = Arc::new(ExtractionRunner::new(
        Arc::new(FakeCrm::default().panicking_on_login("session cache poisoned")),
        Arc::new(RecordingSink::default()),
        RecordErrorPolicy::Abort,
        Metrics::new(),
        CancellationToken::new(),
    ));

    let outcomes = run_jobs(
        runner,
        vec![job(0, "SELECT Id FROM Contact", "contacts")],
        1,
        CancellationToken::new(),
    )
    .await;

    assert!(matches!(
        &outcomes[0].status,
        JobStatus::Crashed(reason) if reason.contains("session cache poisoned")
    ));
}
