use crate::error::ConnectorError;
use async_trait::async_trait;
use model::records::{destination::RawDestination, row::Row};

pub mod auth;
pub mod raw;

#[cfg(test)]
mod stub;

pub use auth::{ClientCredentials, TokenProvider};
pub use raw::CdfRawClient;

/// Destination side of an extraction: persists keyed rows into a RAW table.
///
/// Inserting a row whose key already exists overwrites it.
#[async_trait]
pub trait RawWriter: Send + Sync {
    async fn insert_rows(
        &self,
        destination: &RawDestination,
        rows: &[Row],
    ) -> Result<(), ConnectorError>;
}
