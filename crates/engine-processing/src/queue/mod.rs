//! Buffered uploads to CDF RAW.
//!
//! Rows are collected per destination and flushed when the buffer reaches
//! `max_queue_size`, every `upload_interval`, and once more on close.

use crate::queue::{
    buffer::RowBuffer,
    config::QueueConfig,
    writer::ChunkWriter,
};
use async_trait::async_trait;
use connectors::cdf::RawWriter;
use engine_core::{
    metrics::Metrics,
    sink::{SinkError, UploadSink},
};
use model::records::{destination::RawDestination, row::Row};
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub mod buffer;
pub mod config;
pub mod writer;

/// Totals for everything the queue tried to upload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadReport {
    pub rows_uploaded: u64,
    pub rows_failed: u64,
    pub requests: u64,
}

impl UploadReport {
    pub fn is_clean(&self) -> bool {
        self.rows_failed == 0
    }
}

#[derive(Debug, Clone, Copy)]
enum FlushReason {
    Size,
    Interval,
    Close,
    Manual,
}

impl FlushReason {
    fn as_str(&self) -> &'static str {
        match self {
            FlushReason::Size => "size",
            FlushReason::Interval => "interval",
            FlushReason::Close => "close",
            FlushReason::Manual => "manual",
        }
    }
}

struct QueueInner {
    config: QueueConfig,
    writer: ChunkWriter,
    buffer: Mutex<RowBuffer>,
    /// Held for the whole duration of a flush so flushes never overlap and
    /// rows of a destination are uploaded in submission order.
    uploads: Mutex<UploadReport>,
    metrics: Metrics,
}

impl QueueInner {
    async fn flush(&self, reason: FlushReason) -> UploadReport {
        let mut report = self.uploads.lock().await;

        let batches = {
            let mut buffer = self.buffer.lock().await;
            if buffer.is_empty() {
                return *report;
            }
            buffer.drain()
        };

        let total: usize = batches.iter().map(|(_, rows)| rows.len()).sum();
        info!(reason = reason.as_str(), rows = total, "Flushing upload queue");

        for (destination, rows) in batches {
            for chunk in rows.chunks(self.config.max_rows_per_request) {
                report.requests += 1;
                match self.writer.write_chunk(&destination, chunk).await {
                    Ok(result) => {
                        report.rows_uploaded += result.rows_written as u64;
                        self.metrics.increment_rows_uploaded(result.rows_written as u64);
                        self.metrics.increment_batches(1);
                    }
                    Err(err) => {
                        error!(destination = %destination, rows = chunk.len(), error = %err, "Upload failed, rows dropped");
                        report.rows_failed += chunk.len() as u64;
                        self.metrics.increment_rows_failed(chunk.len() as u64);
                    }
                }
            }
        }

        *report
    }
}

/// Upload queue for CDF RAW with size- and time-based flushing.
///
/// Created with [`RawUploadQueue::start`], which also starts the interval
/// flusher; [`RawUploadQueue::close`] stops it and uploads whatever is left.
pub struct RawUploadQueue {
    inner: Arc<QueueInner>,
    stop: CancellationToken,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl RawUploadQueue {
    pub fn start(writer: Arc<dyn RawWriter>, config: QueueConfig, metrics: Metrics) -> Self {
        info!(
            max_queue_size = config.max_queue_size,
            upload_interval_secs = config.upload_interval.as_secs(),
            "Starting upload queue"
        );

        let inner = Arc::new(QueueInner {
            writer: ChunkWriter::new(writer, config.retry.clone(), metrics.clone()),
            config,
            buffer: Mutex::new(RowBuffer::default()),
            uploads: Mutex::new(UploadReport::default()),
            metrics,
        });

        let stop = CancellationToken::new();
        let ticker = tokio::spawn(run_ticker(Arc::clone(&inner), stop.clone()));

        Self {
            inner,
            stop,
            ticker: Mutex::new(Some(ticker)),
        }
    }

    /// Uploads everything buffered so far.
    pub async fn flush(&self) -> UploadReport {
        self.inner.flush(FlushReason::Manual).await
    }

    /// Rows currently waiting for the next flush.
    pub async fn pending(&self) -> usize {
        self.inner.buffer.lock().await.len()
    }

    /// Rejects further rows, stops the interval flusher and performs the
    /// final flush. Calling it again returns the same report.
    pub async fn close(&self) -> UploadReport {
        self.inner.buffer.lock().await.close();
        self.stop.cancel();

        let ticker = self.ticker.lock().await.take();
        if let Some(ticker) = ticker
            && let Err(err) = ticker.await
        {
            warn!(error = %err, "Interval flusher ended abnormally");
        }

        let report = self.inner.flush(FlushReason::Close).await;
        info!(
            rows_uploaded = report.rows_uploaded,
            rows_failed = report.rows_failed,
            requests = report.requests,
            "Upload queue closed"
        );
        report
    }
}

#[async_trait]
impl UploadSink for RawUploadQueue {
    async fn add(&self, destination: &RawDestination, row: Row) -> Result<(), SinkError> {
        if !destination.is_valid() {
            return Err(SinkError::InvalidDestination(destination.clone()));
        }

        let full = {
            let mut buffer = self.inner.buffer.lock().await;
            if buffer.is_closed() {
                return Err(SinkError::Closed);
            }
            buffer.push(destination, row);
            buffer.len() >= self.inner.config.max_queue_size
        };

        if full {
            debug!(destination = %destination, "Upload queue full, flushing");
            self.inner.flush(FlushReason::Size).await;
        }
        Ok(())
    }
}

async fn run_ticker(inner: Arc<QueueInner>, stop: CancellationToken) {
    let period = inner.config.upload_interval.max(Duration::from_millis(1));
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {
                inner.flush(FlushReason::Interval).await;
            }
        }
    }
    debug!("Interval flusher stopped");
}

#[cfg(test)]
mod tests;
