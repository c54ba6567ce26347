use super::{
    auth::{self, Credentials, LoginSession},
    query::{self, RestContext},
};
use crate::{
    error::ConnectorError,
    source::{CrmConnector, QuerySession, RecordStream},
};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use tracing::info;

/// Connection settings for one Salesforce org.
#[derive(Debug, Clone)]
pub struct SalesforceConnector {
    http: Client,
    domain: String,
    api_version: String,
    credentials: Credentials,
}

impl SalesforceConnector {
    pub fn new(
        http: Client,
        domain: impl Into<String>,
        api_version: impl Into<String>,
        credentials: Credentials,
    ) -> Self {
        Self {
            http,
            domain: domain.into(),
            api_version: api_version.into(),
            credentials,
        }
    }
}

#[async_trait]
impl CrmConnector for SalesforceConnector {
    async fn connect(&self) -> Result<Arc<dyn QuerySession>, ConnectorError> {
        let LoginSession {
            session_id,
            instance_url,
        } = auth::login(&self.http, &self.domain, &self.api_version, &self.credentials).await?;
        info!(instance = %instance_url, "Salesforce session established");

        Ok(Arc::new(SalesforceSession {
            context: Arc::new(RestContext {
                http: self.http.clone(),
                instance_url,
                session_id,
                api_version: self.api_version.clone(),
            }),
        }))
    }
}

/// An authenticated session bound to one org instance.
pub struct SalesforceSession {
    context: Arc<RestContext>,
}

impl QuerySession for SalesforceSession {
    fn query_all(&self, soql: &str) -> RecordStream {
        query::paginate(Arc::clone(&self.context), soql.to_string())
    }
}
