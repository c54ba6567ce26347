use crate::{
    error::CliError,
    shutdown::{ExitCode, ShutdownCoordinator},
};
use clap::Parser;
use engine_runtime::execution::executor;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

mod error;
mod logging;
mod shutdown;

#[derive(Parser)]
#[command(
    name = "sfdc-extractor",
    version,
    about = "Extracts Salesforce records into CDF RAW"
)]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let code = match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            error!(error = %err, "Extractor failed");
            ExitCode::GeneralError
        }
    };

    std::process::exit(code.as_i32());
}

async fn run(cli: Cli) -> Result<ExitCode, CliError> {
    let settings = match engine_config::load(&cli.config) {
        Ok(settings) => settings,
        Err(err) => {
            logging::init("info");
            return Err(err.into());
        }
    };
    logging::init(&settings.logger.filter_directive());
    info!(config = %cli.config.display(), "Configuration loaded");

    let shutdown = ShutdownCoordinator::new(CancellationToken::new());
    shutdown.register_handlers();

    let report = executor::run(settings, shutdown.cancel_token()).await?;
    report.log_summary();

    if shutdown.is_shutdown_requested() {
        info!("Extraction stopped by shutdown request");
    }
    Ok(ExitCode::from(report.status()))
}
