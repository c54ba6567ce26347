//! Row inserts into CDF RAW.

use super::{RawWriter, auth::TokenProvider};
use crate::error::ConnectorError;
use async_trait::async_trait;
use model::records::{destination::RawDestination, row::Row};
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

const SERVICE: &str = "CDF";

#[derive(Serialize)]
struct InsertRequest<'a> {
    items: &'a [Row],
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    code: u16,
    message: String,
}

/// Writes rows to `{host}/api/v1/projects/{project}/raw/...`.
#[derive(Debug, Clone)]
pub struct CdfRawClient {
    http: Client,
    host: Url,
    project: String,
    tokens: Arc<TokenProvider>,
}

impl CdfRawClient {
    pub fn new(http: Client, host: Url, project: impl Into<String>, tokens: Arc<TokenProvider>) -> Self {
        Self {
            http,
            host,
            project: project.into(),
            tokens,
        }
    }

    /// Rows endpoint for a destination; the database and table are created on
    /// demand (`ensureParent=true`).
    pub fn rows_url(&self, destination: &RawDestination) -> Result<Url, ConnectorError> {
        let mut url = self.host.clone();
        url.path_segments_mut()
            .map_err(|_| ConnectorError::Url(format!("{}: cannot be a base URL", self.host)))?
            .pop_if_empty()
            .extend([
                "api",
                "v1",
                "projects",
                self.project.as_str(),
                "raw",
                "dbs",
                destination.database.as_str(),
                "tables",
                destination.table.as_str(),
                "rows",
            ]);
        url.query_pairs_mut().append_pair("ensureParent", "true");
        Ok(url)
    }

    async fn post_rows(&self, url: Url, rows: &[Row]) -> Result<StatusCode, ConnectorError> {
        let token = self.tokens.token().await?;
        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(&InsertRequest { items: rows })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() || status == StatusCode::UNAUTHORIZED {
            return Ok(status);
        }
        let body = response.text().await?;
        Err(api_error(status, &body))
    }
}

#[async_trait]
impl RawWriter for CdfRawClient {
    async fn insert_rows(
        &self,
        destination: &RawDestination,
        rows: &[Row],
    ) -> Result<(), ConnectorError> {
        if rows.is_empty() {
            return Ok(());
        }
        let url = self.rows_url(destination)?;
        debug!(destination = %destination, rows = rows.len(), "Inserting rows into RAW");

        if self.post_rows(url.clone(), rows).await? == StatusCode::UNAUTHORIZED {
            // The cached token may have been revoked; retry once with a fresh one.
            warn!("CDF rejected the access token, refreshing");
            self.tokens.invalidate().await;
            let status = self.post_rows(url, rows).await?;
            if status == StatusCode::UNAUTHORIZED {
                return Err(ConnectorError::Api {
                    service: SERVICE,
                    status,
                    code: None,
                    message: "access token rejected".into(),
                });
            }
        }
        Ok(())
    }
}

/// CDF reports errors as `{"error": {"code": ..., "message": ...}}`.
fn api_error(status: StatusCode, body: &str) -> ConnectorError {
    let (code, message) = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => (
            Some(envelope.error.code.to_string()),
            envelope.error.message,
        ),
        Err(_) => (None, body.to_string()),
    };
    ConnectorError::Api {
        service: SERVICE,
        status,
        code,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdf::{
        auth::ClientCredentials,
        stub::{self, StubCdf},
    };
    use serde_json::json;

    fn client(host: &str) -> CdfRawClient {
        let http = stub::http();
        let tokens = TokenProvider::new(
            http.clone(),
            ClientCredentials {
                client_id: "id".into(),
                client_secret: "secret".into(),
                token_url: Url::parse(host).unwrap().join("/token").unwrap(),
                scopes: vec![],
            },
        );
        CdfRawClient::new(http, Url::parse(host).unwrap(), "acme-prod", Arc::new(tokens))
    }

    #[test]
    fn builds_rows_url() {
        let url = client("https://api.cognitedata.com")
            .rows_url(&RawDestination::new("salesforce", "contacts"))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.cognitedata.com/api/v1/projects/acme-prod/raw/dbs/salesforce/tables/contacts/rows?ensureParent=true"
        );
    }

    #[test]
    fn escapes_path_segments() {
        let url = client("https://westeurope-1.cognitedata.com/")
            .rows_url(&RawDestination::new("sales force", "a/b"))
            .unwrap();
        assert!(url.path().contains("/dbs/sales%20force/tables/a%2Fb/rows"));
    }

    #[test]
    fn request_body_matches_wire_format() {
        let columns = json!({"Id": "003A", "Name": "Alice"})
            .as_object()
            .cloned()
            .unwrap();
        let rows = vec![Row::new("003A", columns).unwrap()];
        let body = serde_json::to_value(InsertRequest { items: &rows }).unwrap();
        assert_eq!(
            body,
            json!({"items": [{"key": "003A", "columns": {"Id": "003A", "Name": "Alice"}}]})
        );
    }

    #[test]
    fn parses_cdf_error_body() {
        let err = api_error(
            StatusCode::BAD_REQUEST,
            r#"{"error":{"code":400,"message":"Row key too long"}}"#,
        );
        assert_eq!(
            err.to_string(),
            "CDF API error (400 Bad Request) [400]: Row key too long"
        );
        assert!(!err.is_transient());
    }

    fn contact_rows() -> Vec<Row> {
        let columns = json!({"Id": "003A", "Name": "Alice"})
            .as_object()
            .cloned()
            .unwrap();
        vec![Row::new("003A", columns).unwrap()]
    }

    #[tokio::test]
    async fn refreshes_token_once_after_unauthorized() {
        let server = StubCdf::start(vec![401]).await;
        let raw = client(server.url("/").as_str());

        raw.insert_rows(&RawDestination::new("sfdc", "contacts"), &contact_rows())
            .await
            .unwrap();

        assert_eq!(server.token_requests(), 2);
        assert_eq!(
            server.api_authorizations(),
            ["Bearer tok-1", "Bearer tok-2"]
        );
    }

    #[tokio::test]
    async fn second_unauthorized_is_a_permanent_failure() {
        let server = StubCdf::start(vec![401, 401]).await;
        let raw = client(server.url("/").as_str());

        let err = raw
            .insert_rows(&RawDestination::new("sfdc", "contacts"), &contact_rows())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ConnectorError::Api { status, .. } if status == StatusCode::UNAUTHORIZED
        ));
        assert!(!err.is_transient());
        assert_eq!(server.api_authorizations().len(), 2);
    }

    #[tokio::test]
    async fn server_errors_are_reported_as_transient() {
        let server = StubCdf::start(vec![503]).await;
        let raw = client(server.url("/").as_str());

        let err = raw
            .insert_rows(&RawDestination::new("sfdc", "contacts"), &contact_rows())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ConnectorError::Api { status, ref code, .. }
                if status == StatusCode::SERVICE_UNAVAILABLE && code.as_deref() == Some("503")
        ));
        assert!(err.is_transient());
        assert_eq!(server.token_requests(), 1);
    }
}
