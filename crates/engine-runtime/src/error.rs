use connectors::error::ConnectorError;
use engine_core::sink::SinkError;
use model::records::row::RowError;
use thiserror::Error;

/// Why a single query run stopped before exhausting its results.
#[derive(Debug, Error)]
pub enum RunError {
    /// The CRM rejected the login; nothing was submitted.
    #[error("Authentication failed: {0}")]
    Auth(#[source] ConnectorError),

    /// The query or one of its result pages failed.
    #[error("Query failed: {0}")]
    Query(#[source] ConnectorError),

    /// A record could not be turned into a row.
    #[error("Record #{position} is not a valid row: {source}")]
    Record {
        position: u64,
        #[source]
        source: RowError,
    },

    /// The upload sink refused a row.
    #[error("Upload sink rejected a row: {0}")]
    Sink(#[from] SinkError),
}

/// Errors that prevent an extraction from starting at all.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Invalid setting {field}: {message}")]
    InvalidSetting {
        field: &'static str,
        message: String,
    },
}
