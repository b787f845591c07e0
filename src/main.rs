mod cli;

use std::process::ExitCode;

use clap::Parser;
use color_eyre::eyre::Result;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};

/// Exit status of `detect` when drift was found.
const DRIFT_EXIT_CODE: u8 = 2;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Detect(args) => {
            if cli::detect(args).await? {
                return Ok(ExitCode::from(DRIFT_EXIT_CODE));
            }
        }
        Command::List(args) => cli::list(args)?,
    }

    Ok(ExitCode::SUCCESS)
}
