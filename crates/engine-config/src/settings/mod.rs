use crate::{env, error::ConfigError};
use model::{core::identifiers::JobId, records::destination::RawDestination};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

pub mod cognite;
pub mod extractor;
pub mod sfdc;

pub use cognite::{CogniteConfig, IdpAuthentication};
pub use extractor::{ConsoleLogger, ExtractorConfig, LoggerConfig, RecordErrorPolicy};
pub use sfdc::SfdcConfig;

/// An additional query run alongside the primary one.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueryConfig {
    pub query_string: String,
    pub destination: RawDestination,
}

/// One unit of work for the executor: a query and where its rows go.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryJob {
    pub id: JobId,
    pub query: String,
    pub destination: RawDestination,
}

/// The whole configuration file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtractorSettings {
    /// Config schema version; accepted for compatibility, not interpreted.
    #[serde(default)]
    pub version: Option<u32>,
    pub sfdc: SfdcConfig,
    pub destination: RawDestination,
    #[serde(default)]
    pub queries: Vec<QueryConfig>,
    #[serde(default)]
    pub extractor: ExtractorConfig,
    pub cognite: CogniteConfig,
    #[serde(default)]
    pub logger: LoggerConfig,
}

/// Reads a config file, resolves `${VAR}` references from the process
/// environment, then parses and validates it.
pub fn load(path: impl AsRef<Path>) -> Result<ExtractorSettings, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "Loaded config file");
    ExtractorSettings::from_yaml_with(&content, |name| std::env::var(name).ok())
}

impl ExtractorSettings {
    /// Parses and validates YAML without resolving variable references.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        Self::from_value(serde_yaml::from_str(content)?)
    }

    /// Parses YAML, resolves `${VAR}` references inside string values through
    /// `lookup`, then validates.
    pub fn from_yaml_with<F>(content: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw: serde_yaml::Value = serde_yaml::from_str(content)?;
        Self::from_value(env::substitute_with(raw, lookup)?)
    }

    fn from_value(value: serde_yaml::Value) -> Result<Self, ConfigError> {
        let settings: ExtractorSettings = serde_yaml::from_value(value)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = self.sfdc.problems();

        if !self.destination.is_valid() {
            problems.push("destination.database and destination.table must not be empty".into());
        }
        for (idx, query) in self.queries.iter().enumerate() {
            if query.query_string.trim().is_empty() {
                problems.push(format!("queries[{idx}].query_string must not be empty"));
            }
            if !query.destination.is_valid() {
                problems.push(format!(
                    "queries[{idx}].destination.database and table must not be empty"
                ));
            }
        }

        problems.extend(self.extractor.problems());
        problems.extend(self.cognite.problems());
        problems.extend(self.logger.problems());

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(problems))
        }
    }

    /// The primary query first, then every entry of `queries` in file order.
    pub fn jobs(&self) -> Vec<QueryJob> {
        let primary = (self.sfdc.query_string.as_str(), &self.destination);
        let extra = self
            .queries
            .iter()
            .map(|q| (q.query_string.as_str(), &q.destination));

        std::iter::once(primary)
            .chain(extra)
            .enumerate()
            .map(|(idx, (query, destination))| QueryJob {
                id: JobId::for_index(idx),
                query: query.to_string(),
                destination: destination.clone(),
            })
            .collect()
    }
}
