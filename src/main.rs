//! `wafer_probe` command-line entry point.

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use wafer_probe::cli::Cli;
use wafer_probe::{logging, Session};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = cli.load_config()?;
    logging::init(&config.application.log_level)?;

    match Session::new(config).run().await {
        Ok(summary) => {
            info!(
                structures = summary.structures,
                records = summary.records_written,
                "Done"
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            error!(kind = ?err.kind(), "{}", err);
            Ok(ExitCode::FAILURE)
        }
    }
}
