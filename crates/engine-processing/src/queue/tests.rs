use super::*;
use connectors::error::ConnectorError;
use engine_core::retry::RetryPolicy;
use reqwest::StatusCode;
use serde_json::json;
use std::{collections::VecDeque, sync::Mutex as StdMutex, time::Duration};

#[derive(Default)]
struct RecordingWriter {
    calls: StdMutex<Vec<(RawDestination, Vec<Row>)>>,
    failures: StdMutex<VecDeque<ConnectorError>>,
}

impl RecordingWriter {
    fn failing_with(errors: Vec<ConnectorError>) -> Arc<Self> {
        Arc::new(Self {
            calls: StdMutex::new(Vec::new()),
            failures: StdMutex::new(errors.into()),
        })
    }

    fn keys(&self) -> Vec<Vec<String>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, rows)| rows.iter().map(|r| r.key.clone()).collect())
            .collect()
    }
}

#[async_trait]
impl RawWriter for RecordingWriter {
    async fn insert_rows(
        &self,
        destination: &RawDestination,
        rows: &[Row],
    ) -> Result<(), ConnectorError> {
        let failure = self.failures.lock().unwrap().pop_front();
        if let Some(err) = failure {
            return Err(err);
        }
        self.calls
            .lock()
            .unwrap()
            .push((destination.clone(), rows.to_vec()));
        Ok(())
    }
}

fn api_error(status: StatusCode) -> ConnectorError {
    ConnectorError::Api {
        service: "CDF",
        status,
        code: None,
        message: "test".into(),
    }
}

fn row(key: &str, name: &str) -> Row {
    let columns = json!({"Id": key, "Name": name})
        .as_object()
        .cloned()
        .unwrap();
    Row::new(key, columns).unwrap()
}

fn contacts() -> RawDestination {
    RawDestination::new("sfdc", "contacts")
}

fn config(max_queue_size: usize) -> QueueConfig {
    QueueConfig::default()
        .with_max_queue_size(max_queue_size)
        .with_upload_interval(Duration::from_secs(3600))
        .with_retry(RetryPolicy::immediate(3))
}

#[tokio::test]
async fn flushes_when_queue_is_full() {
    let writer = Arc::new(RecordingWriter::default());
    let queue = RawUploadQueue::start(writer.clone(), config(2), Metrics::new());

    queue.add(&contacts(), row("003A", "Alice")).await.unwrap();
    assert!(writer.keys().is_empty());
    queue.add(&contacts(), row("003B", "Bob")).await.unwrap();

    assert_eq!(writer.keys(), vec![vec!["003A", "003B"]]);
    assert_eq!(queue.pending().await, 0);
    queue.close().await;
}

#[tokio::test(start_paused = true)]
async fn flushes_on_interval() {
    let writer = Arc::new(RecordingWriter::default());
    let cfg = config(1000).with_upload_interval(Duration::from_secs(30));
    let queue = RawUploadQueue::start(writer.clone(), cfg, Metrics::new());

    queue.add(&contacts(), row("003A", "Alice")).await.unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(writer.keys().is_empty());

    tokio::time::sleep(Duration::from_secs(25)).await;
    assert_eq!(writer.keys(), vec![vec!["003A"]]);
    queue.close().await;
}

#[tokio::test]
async fn close_uploads_remaining_rows_and_rejects_new_ones() {
    let writer = Arc::new(RecordingWriter::default());
    let queue = RawUploadQueue::start(writer.clone(), config(1000), Metrics::new());

    queue.add(&contacts(), row("003A", "Alice")).await.unwrap();
    queue.add(&contacts(), row("003B", "Bob")).await.unwrap();
    let report = queue.close().await;

    assert_eq!(
        report,
        UploadReport {
            rows_uploaded: 2,
            rows_failed: 0,
            requests: 1
        }
    );
    assert_eq!(
        queue.add(&contacts(), row("003C", "Carol")).await,
        Err(SinkError::Closed)
    );
    assert_eq!(queue.close().await, report);
}

#[tokio::test]
async fn splits_large_flushes_into_requests() {
    let writer = Arc::new(RecordingWriter::default());
    let cfg = config(1000).with_max_rows_per_request(2);
    let queue = RawUploadQueue::start(writer.clone(), cfg, Metrics::new());

    for i in 0..5 {
        queue
            .add(&contacts(), row(&format!("003{i}"), "x"))
            .await
            .unwrap();
    }
    let report = queue.close().await;

    let sizes: Vec<_> = writer.keys().iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![2, 2, 1]);
    assert_eq!(report.requests, 3);
    assert_eq!(report.rows_uploaded, 5);
}

#[tokio::test]
async fn last_row_wins_for_duplicate_keys() {
    let writer = Arc::new(RecordingWriter::default());
    let queue = RawUploadQueue::start(writer.clone(), config(1000), Metrics::new());

    queue.add(&contacts(), row("003A", "Alice")).await.unwrap();
    queue.add(&contacts(), row("003B", "Bob")).await.unwrap();
    queue.add(&contacts(), row("003A", "Alicia")).await.unwrap();
    queue.close().await;

    let calls = writer.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    let rows = &calls[0].1;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].columns["Name"], "Alicia");
}

#[tokio::test]
async fn uploads_per_destination() {
    let writer = Arc::new(RecordingWriter::default());
    let queue = RawUploadQueue::start(writer.clone(), config(1000), Metrics::new());
    let accounts = RawDestination::new("sfdc", "accounts");

    queue.add(&contacts(), row("003A", "Alice")).await.unwrap();
    queue.add(&accounts, row("001A", "Acme")).await.unwrap();
    queue.add(&contacts(), row("003B", "Bob")).await.unwrap();
    queue.close().await;

    let calls = writer.calls.lock().unwrap();
    assert_eq!(calls.len(), 2);
    for (destination, rows) in calls.iter() {
        let keys: Vec<_> = rows.iter().map(|r| r.key.as_str()).collect();
        if *destination == accounts {
            assert_eq!(keys, ["001A"]);
        } else {
            assert_eq!(keys, ["003A", "003B"]);
        }
    }
}

#[tokio::test]
async fn retries_transient_failures() {
    let writer = RecordingWriter::failing_with(vec![
        api_error(StatusCode::SERVICE_UNAVAILABLE),
        api_error(StatusCode::TOO_MANY_REQUESTS),
    ]);
    let metrics = Metrics::new();
    let queue = RawUploadQueue::start(writer.clone(), config(1000), metrics.clone());

    queue.add(&contacts(), row("003A", "Alice")).await.unwrap();
    let report = queue.close().await;

    assert!(report.is_clean());
    assert_eq!(report.rows_uploaded, 1);
    assert_eq!(metrics.snapshot().retry_count, 2);
    assert_eq!(writer.keys(), vec![vec!["003A"]]);
}

#[tokio::test]
async fn counts_rejected_rows_and_keeps_going() {
    let writer = RecordingWriter::failing_with(vec![api_error(StatusCode::BAD_REQUEST)]);
    let metrics = Metrics::new();
    let queue = RawUploadQueue::start(writer.clone(), config(2), metrics.clone());

    queue.add(&contacts(), row("003A", "Alice")).await.unwrap();
    queue.add(&contacts(), row("003B", "Bob")).await.unwrap();
    queue.add(&contacts(), row("003C", "Carol")).await.unwrap();
    let report = queue.close().await;

    assert!(!report.is_clean());
    assert_eq!(report.rows_failed, 2);
    assert_eq!(report.rows_uploaded, 1);
    assert_eq!(metrics.snapshot().rows_failed, 2);
    assert_eq!(writer.keys(), vec![vec!["003C"]]);
}

#[tokio::test]
async fn gives_up_after_configured_attempts() {
    let writer = RecordingWriter::failing_with(vec![
        api_error(StatusCode::BAD_GATEWAY),
        api_error(StatusCode::BAD_GATEWAY),
        api_error(StatusCode::BAD_GATEWAY),
    ]);
    let queue = RawUploadQueue::start(writer.clone(), config(1000), Metrics::new());

    queue.add(&contacts(), row("003A", "Alice")).await.unwrap();
    let report = queue.close().await;

    assert_eq!(report.rows_failed, 1);
    assert!(writer.keys().is_empty());
}

#[tokio::test]
async fn rejects_invalid_destination() {
    let writer = Arc::new(RecordingWriter::default());
    let queue = RawUploadQueue::start(writer, config(1000), Metrics::new());

    let err = queue
        .add(&RawDestination::new("sfdc", " "), row("003A", "Alice"))
        .await
        .unwrap_err();
    assert!(matches!(err, SinkError::InvalidDestination(_)));
    queue.close().await;
}
