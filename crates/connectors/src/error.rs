use reqwest::StatusCode;
use thiserror::Error;

/// Errors raised by the Salesforce and CDF HTTP connectors.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Transport-level failure (DNS, TLS, connection reset, timeout).
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote API answered with a non-success status.
    #[error("{service} API error ({status}){}: {message}", .code.as_ref().map(|c| format!(" [{c}]")).unwrap_or_default())]
    Api {
        service: &'static str,
        status: StatusCode,
        code: Option<String>,
        message: String,
    },

    /// Salesforce rejected the login (SOAP fault).
    #[error("Salesforce login failed [{code}]: {message}")]
    LoginFault { code: String, message: String },

    /// A response body did not have the expected shape.
    #[error("Unexpected {service} response: {message}")]
    Protocol {
        service: &'static str,
        message: String,
    },

    #[error("Invalid XML in response: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("Invalid JSON in response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(String),
}

impl ConnectorError {
    pub(crate) fn protocol(service: &'static str, message: impl Into<String>) -> Self {
        ConnectorError::Protocol {
            service,
            message: message.into(),
        }
    }

    /// Whether repeating the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ConnectorError::Http(err) => err.is_timeout() || err.is_connect() || err.is_request(),
            ConnectorError::Api { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            ConnectorError::LoginFault { .. }
            | ConnectorError::Protocol { .. }
            | ConnectorError::Xml(_)
            | ConnectorError::Json(_)
            | ConnectorError::Url(_) => false,
        }
    }
}
