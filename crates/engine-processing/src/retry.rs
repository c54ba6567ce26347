use connectors::error::ConnectorError;
use engine_core::retry::RetryDisposition;

pub fn classify_connector_error(err: &ConnectorError) -> RetryDisposition {
    if err.is_transient() {
        RetryDisposition::Retry
    } else {
        RetryDisposition::Stop
    }
}
