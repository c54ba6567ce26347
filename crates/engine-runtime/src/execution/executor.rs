use crate::{
    error::ExecutionError,
    execution::{report::ExtractionReport, runner::ExtractionRunner, workers},
};
use connectors::{
    cdf::{CdfRawClient, ClientCredentials, RawWriter, TokenProvider},
    salesforce::{Credentials, SalesforceConnector},
    source::CrmConnector,
};
use engine_config::ExtractorSettings;
use engine_core::metrics::Metrics;
use engine_processing::queue::{RawUploadQueue, config::QueueConfig};
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::info;

const HTTP_TIMEOUT: Duration = Duration::from_secs(120);
const USER_AGENT: &str = concat!("sfdc-extractor/", env!("CARGO_PKG_VERSION"));

/// Runs a full extraction against the real Salesforce and CDF endpoints.
pub async fn run(
    settings: ExtractorSettings,
    cancel: CancellationToken,
) -> Result<ExtractionReport, ExecutionError> {
    let http = reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()?;

    let sfdc = &settings.sfdc;
    let crm = SalesforceConnector::new(
        http.clone(),
        sfdc.domain.clone(),
        sfdc.api_version.clone(),
        Credentials {
            username: sfdc.username.clone(),
            password: sfdc.password.clone(),
            security_token: sfdc.security_token.clone(),
        },
    );

    let cognite = &settings.cognite;
    let host = cognite
        .host_url()
        .ok_or_else(|| ExecutionError::InvalidSetting {
            field: "cognite.host",
            message: format!("'{}' is not a valid URL", cognite.host),
        })?;
    let token_url = cognite
        .token_url()
        .ok_or_else(|| ExecutionError::InvalidSetting {
            field: "cognite.idp_authentication.token_url",
            message: format!("'{}' is not a valid URL", cognite.idp_authentication.token_url),
        })?;
    let tokens = TokenProvider::new(
        http.clone(),
        ClientCredentials {
            client_id: cognite.idp_authentication.client_id.clone(),
            client_secret: cognite.idp_authentication.secret.clone(),
            token_url,
            scopes: cognite.idp_authentication.scopes.clone(),
        },
    );
    let writer = CdfRawClient::new(http, host, cognite.project.clone(), Arc::new(tokens));

    Ok(Executor::new(settings, Arc::new(crm), Arc::new(writer), cancel)
        .execute()
        .await)
}

/// Wires runners, the worker pool and the upload queue together.
pub struct Executor {
    settings: ExtractorSettings,
    crm: Arc<dyn CrmConnector>,
    writer: Arc<dyn RawWriter>,
    cancel: CancellationToken,
}

impl Executor {
    pub fn new(
        settings: ExtractorSettings,
        crm: Arc<dyn CrmConnector>,
        writer: Arc<dyn RawWriter>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            settings,
            crm,
            writer,
            cancel,
        }
    }

    pub async fn execute(self) -> ExtractionReport {
        let start = std::time::Instant::now();
        let extractor = &self.settings.extractor;
        let metrics = Metrics::new();

        let queue = Arc::new(RawUploadQueue::start(
            self.writer,
            QueueConfig::default()
                .with_max_queue_size(extractor.upload_queue_size)
                .with_upload_interval(extractor.upload_interval()),
            metrics.clone(),
        ));

        let runner = Arc::new(ExtractionRunner::new(
            self.crm,
            queue.clone(),
            extractor.on_record_error,
            metrics.clone(),
            self.cancel.clone(),
        ));

        let jobs = self.settings.jobs();
        info!(
            jobs = jobs.len(),
            project = %self.settings.cognite.project,
            "Starting Salesforce extraction"
        );
        let outcomes =
            workers::run_jobs(runner, jobs, extractor.parallelism, self.cancel.clone()).await;

        // Rows accepted before a failure or a shutdown request are still uploaded.
        let upload = queue.close().await;

        ExtractionReport {
            jobs: outcomes,
            upload,
            metrics: metrics.snapshot(),
            elapsed: start.elapsed(),
        }
    }
}
