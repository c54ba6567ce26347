use engine_config::error::ConfigError;
use engine_runtime::error::ExecutionError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Failed to load the configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to start the extraction: {0}")]
    Execution(#[from] ExecutionError),
}
