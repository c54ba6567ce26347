use serde::Deserialize;
use std::time::Duration;

/// What a runner does with a record it cannot turn into a row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordErrorPolicy {
    /// Stop the run and report the failure.
    #[default]
    Abort,
    /// Log the record, count it and continue.
    Skip,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ExtractorConfig {
    pub upload_queue_size: usize,
    /// Seconds between time-triggered flushes.
    pub upload_interval: u64,
    pub parallelism: usize,
    pub on_record_error: RecordErrorPolicy,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            upload_queue_size: 50_000,
            upload_interval: 30,
            parallelism: 10,
            on_record_error: RecordErrorPolicy::Abort,
        }
    }
}

impl ExtractorConfig {
    pub fn upload_interval(&self) -> Duration {
        Duration::from_secs(self.upload_interval)
    }

    pub(crate) fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.upload_queue_size == 0 {
            problems.push("extractor.upload_queue_size must be at least 1".to_string());
        }
        if self.upload_interval == 0 {
            problems.push("extractor.upload_interval must be at least 1 second".to_string());
        }
        if self.parallelism == 0 {
            problems.push("extractor.parallelism must be at least 1".to_string());
        }
        problems
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggerConfig {
    #[serde(default)]
    pub console: Option<ConsoleLogger>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConsoleLogger {
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".to_string()
}

const LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

impl LoggerConfig {
    /// Configured console level; `info` when no console logger is configured.
    pub fn level(&self) -> &str {
        self.console
            .as_ref()
            .map(|c| c.level.as_str())
            .unwrap_or("info")
    }

    /// The level as a `tracing` filter directive. Accepts the usual level
    /// names in any case, `warning`/`critical` aliases, or a full directive
    /// such as `info,connectors=debug`.
    pub fn filter_directive(&self) -> String {
        let raw = self.level().trim();
        let lower = raw.to_ascii_lowercase();
        match lower.as_str() {
            "warning" => "warn".to_string(),
            "critical" | "fatal" => "error".to_string(),
            level if LEVELS.contains(&level) => lower,
            _ => raw.to_string(),
        }
    }

    pub(crate) fn problems(&self) -> Vec<String> {
        let directive = self.filter_directive();
        let is_directive = directive.contains('=') || directive.contains(',');
        if !is_directive && !LEVELS.contains(&directive.as_str()) {
            return vec![format!("logger.console.level '{}' is not a log level", self.level())];
        }
        match tracing_subscriber::EnvFilter::try_new(&directive) {
            Ok(_) => Vec::new(),
            Err(e) => vec![format!("logger.console.level '{}': {e}", self.level())],
        }
    }
}
