use crate::error::ConnectorError;
use async_trait::async_trait;
use futures::stream::BoxStream;
use model::records::row::Record;
use std::sync::Arc;

/// Lazy, finite, non-restartable sequence of query results.
pub type RecordStream = BoxStream<'static, Result<Record, ConnectorError>>;

/// Entry point to a CRM org: authenticates and hands out query sessions.
#[async_trait]
pub trait CrmConnector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn QuerySession>, ConnectorError>;
}

/// An authenticated CRM session able to run queries.
pub trait QuerySession: Send + Sync {
    /// Runs `soql` and yields every matching record, following result pages
    /// as the stream is polled.
    fn query_all(&self, soql: &str) -> RecordStream;
}
