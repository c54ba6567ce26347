use connectors::error::ConnectorError;
use engine_core::retry::RetryError;
use model::records::destination::RawDestination;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Failed to upload {rows} rows to '{destination}': {source}")]
    Write {
        destination: RawDestination,
        rows: usize,
        #[source]
        source: ConnectorError,
    },

    #[error("Gave up uploading {rows} rows to '{destination}' after {attempts} attempts: {source}")]
    RetriesExhausted {
        destination: RawDestination,
        rows: usize,
        attempts: usize,
        #[source]
        source: ConnectorError,
    },
}

impl UploadError {
    pub(crate) fn from_retry(
        destination: &RawDestination,
        rows: usize,
        err: RetryError<ConnectorError>,
    ) -> Self {
        match err {
            RetryError::Fatal(source) => UploadError::Write {
                destination: destination.clone(),
                rows,
                source,
            },
            RetryError::AttemptsExceeded { attempts, last } => UploadError::RetriesExhausted {
                destination: destination.clone(),
                rows,
                attempts,
                source: last,
            },
        }
    }
}
