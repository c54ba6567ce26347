#![allow(dead_code)]

use async_trait::async_trait;
use connectors::{
    cdf::RawWriter,
    error::ConnectorError,
    source::{CrmConnector, QuerySession, RecordStream},
};
use engine_config::ExtractorSettings;
use engine_runtime::execution::{executor::Executor, report::ExtractionReport};
use futures::{StreamExt, stream};
use model::records::{
    destination::RawDestination,
    row::{Record, Row},
};
use reqwest::StatusCode;
use serde_json::Value;
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{Arc, Mutex},
};
use tokio_util::sync::CancellationToken;


/// Config template shared by the scenarios; `{extra}` is appended verbatim.
const CONFIG_TEMPLATE: &str = r#"
sfdc:
  username: integration@acme.com
  password: hunter2
  security_token: TOKEN
  query_string: SELECT Id, Name FROM Contact
destination:
  database: sfdc
  table: contacts
cognite:
  project: acme-test
  idp_authentication:
    client_id: extractor
    secret: s3cr3t
    token_url: https://login.example.com/oauth2/v2.0/token
"#;

pub fn settings(extra: &str) -> ExtractorSettings {
    ExtractorSettings::from_yaml(&format!("{CONFIG_TEMPLATE}{extra}")).expect("valid test config")
}

/// Salesforce stand-in serving canned results per query string.
#[derive(Default)]
pub struct ScriptedCrm {
    results: HashMap<String, Vec<Value>>,
    failing_pages: HashMap<String, usize>,
    reject_login: bool,
}

impl ScriptedCrm {
    pub fn with_records(mut self, soql: &str, records: Vec<Value>) -> Self {
        self.results.insert(soql.to_string(), records);
        self
    }

    /// The query fails after yielding `after` records.
    pub fn failing_after(mut self, soql: &str, after: usize) -> Self {
        self.failing_pages.insert(soql.to_string(), after);
        self
    }

    pub fn rejecting_login(mut self) -> Self {
        self.reject_login = true;
        self
    }
}

struct ScriptedSession {
    results: HashMap<String, Vec<Value>>,
    failing_pages: HashMap<String, usize>,
}

#[async_trait]
impl CrmConnector for ScriptedCrm {
    async fn connect(&self) -> Result<Arc<dyn QuerySession>, ConnectorError> {
        if self.reject_login {
            return Err(ConnectorError::LoginFault {
                code: "INVALID_LOGIN".to_string(),
                message: "Invalid username, password, security token; or user locked out."
                    .to_string(),
            });
        }
        Ok(Arc::new(ScriptedSession {
            results: self.results.clone(),
            failing_pages: self.failing_pages.clone(),
        }))
    }
}

impl QuerySession for ScriptedSession {
    fn query_all(&self, soql: &str) -> RecordStream {
        let records: Vec<Result<Record, ConnectorError>> = self
            .results
            .get(soql)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|value| Ok(value.as_object().cloned().unwrap_or_default()))
            .collect();

        match self.failing_pages.get(soql) {
            Some(&after) => {
                let mut records: Vec<_> = records.into_iter().take(after).collect();
                records.push(Err(ConnectorError::Api {
                    service: "Salesforce",
                    status: StatusCode::BAD_REQUEST,
                    code: Some("INVALID_QUERY_LOCATOR".to_string()),
                    message: "invalid query locator".to_string(),
                }));
                stream::iter(records).boxed()
            }
            None => stream::iter(records).boxed(),
        }
    }
}

/// In-memory CDF RAW: keyed rows per table, last write wins.
#[derive(Default)]
pub struct MemoryRaw {
    tables: Mutex<BTreeMap<RawDestination, BTreeMap<String, Record>>>,
    requests: Mutex<Vec<(RawDestination, usize)>>,
    rejected: HashSet<RawDestination>,
}

impl MemoryRaw {
    pub fn rejecting(destination: RawDestination) -> Self {
        Self {
            rejected: HashSet::from([destination]),
            ..Self::default()
        }
    }

    pub fn rows(&self, destination: &RawDestination) -> BTreeMap<String, Record> {
        self.tables
            .lock()
            .unwrap()
            .get(destination)
            .cloned()
            .unwrap_or_default()
    }

    /// Row counts of every insert request, in arrival order.
    pub fn request_sizes(&self) -> Vec<usize> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(_, rows)| *rows)
            .collect()
    }
}

#[async_trait]
impl RawWriter for MemoryRaw {
    async fn insert_rows(
        &self,
        destination: &RawDestination,
        rows: &[Row],
    ) -> Result<(), ConnectorError> {
        if self.rejected.contains(destination) {
            return Err(ConnectorError::Api {
                service: "CDF",
                status: StatusCode::FORBIDDEN,
                code: Some("403".to_string()),
                message: "Resource not found or access denied".to_string(),
            });
        }
        self.requests
            .lock()
            .unwrap()
            .push((destination.clone(), rows.len()));
        let mut tables = self.tables.lock().unwrap();
        let table = tables.entry(destination.clone()).or_default();
        for row in rows {
            table.insert(row.key.clone(), row.columns.clone());
        }
        Ok(())
    }
}

pub async fn run_extraction(
    settings: ExtractorSettings,
    crm: ScriptedCrm,
    raw: Arc<MemoryRaw>,
    cancel: CancellationToken,
) -> ExtractionReport {
    Executor::new(settings, Arc::new(crm), raw, cancel)
        .execute()
        .await
}

pub fn contacts() -> RawDestination {
    RawDestination::new("sfdc", "contacts")
}
