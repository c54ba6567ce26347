//! SOQL execution over the REST API, with transparent `nextRecordsUrl` pagination.

use crate::{error::ConnectorError, source::RecordStream};
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt, stream};
use model::records::row::Record;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

const SERVICE: &str = "Salesforce";

/// One page of a query result.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPage {
    pub total_size: u64,
    pub done: bool,
    #[serde(default)]
    pub records: Vec<Record>,
    pub next_records_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiErrorBody {
    message: String,
    error_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PageRequest {
    First(String),
    Next(String),
}

#[async_trait]
pub(crate) trait PageFetcher: Send + Sync + 'static {
    async fn fetch(&self, request: &PageRequest) -> Result<QueryPage, ConnectorError>;
}

/// Everything needed to issue authenticated REST calls against one org.
#[derive(Debug, Clone)]
pub(crate) struct RestContext {
    pub http: Client,
    pub instance_url: Url,
    pub session_id: String,
    pub api_version: String,
}

impl RestContext {
    pub fn query_url(&self, soql: &str) -> Result<Url, ConnectorError> {
        let mut url = self
            .instance_url
            .join(&format!("services/data/v{}/query/", self.api_version))
            .map_err(|e| ConnectorError::Url(e.to_string()))?;
        url.query_pairs_mut().append_pair("q", soql);
        Ok(url)
    }

    pub fn next_url(&self, next_records_url: &str) -> Result<Url, ConnectorError> {
        self.instance_url
            .join(next_records_url)
            .map_err(|e| ConnectorError::Url(format!("{next_records_url}: {e}")))
    }
}

#[async_trait]
impl PageFetcher for RestContext {
    async fn fetch(&self, request: &PageRequest) -> Result<QueryPage, ConnectorError> {
        let url = match request {
            PageRequest::First(soql) => self.query_url(soql)?,
            PageRequest::Next(next) => self.next_url(next)?,
        };
        debug!(url = %url, "Fetching query page");

        let response = self
            .http
            .get(url)
            .bearer_auth(&self.session_id)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            return Err(api_error(status, &body));
        }

        Ok(response.json::<QueryPage>().await?)
    }
}

/// Salesforce reports errors as `[{"message": ..., "errorCode": ...}]`.
pub(crate) fn api_error(status: StatusCode, body: &str) -> ConnectorError {
    let (code, message) = match serde_json::from_str::<Vec<ApiErrorBody>>(body) {
        Ok(errors) if !errors.is_empty() => {
            let first = &errors[0];
            (first.error_code.clone(), first.message.clone())
        }
        _ => (None, body.to_string()),
    };
    ConnectorError::Api {
        service: SERVICE,
        status,
        code,
        message,
    }
}

enum PageCursor {
    Pending(PageRequest),
    Done,
}

/// Streams records page by page; the next page is requested only once the
/// previous one has been consumed.
pub(crate) fn paginate<F: PageFetcher>(fetcher: Arc<F>, soql: String) -> RecordStream {
    let pages = stream::try_unfold(
        PageCursor::Pending(PageRequest::First(soql)),
        move |cursor| {
            let fetcher = Arc::clone(&fetcher);
            async move {
                let request = match cursor {
                    PageCursor::Done => return Ok::<_, ConnectorError>(None),
                    PageCursor::Pending(request) => request,
                };

                let page = fetcher.fetch(&request).await?;
                debug!(
                    total_size = page.total_size,
                    records = page.records.len(),
                    done = page.done,
                    "Query page received"
                );

                let next = match (page.done, page.next_records_url) {
                    (false, Some(next)) => PageCursor::Pending(PageRequest::Next(next)),
                    _ => PageCursor::Done,
                };
                Ok(Some((page.records, next)))
            }
        },
    );

    pages
        .map_ok(|records| stream::iter(records.into_iter().map(Ok::<Record, ConnectorError>)))
        .try_flatten()
        .boxed()
}
