use std::path::PathBuf;

use clap::{Parser, Subcommand};

use driftscan::config::parse_identity;
use driftscan::output::OutputFormat;
use driftscan::policy::IdentityKey;
use driftscan::sources::http::TOKEN_ENV;

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compare observed state against terraform state
    Detect(DetectArgs),
    /// List managed resources in a terraform state
    List(ListArgs),
}

#[derive(clap::Args, Debug)]
pub struct DetectArgs {
    /// Snapshot file or http(s) URL of the observed-state API
    #[arg(long)]
    pub observed: String,

    /// terraform.tfstate file or a directory containing one
    #[arg(long)]
    pub declared: PathBuf,

    /// Restrict to these resource ids (repeatable)
    #[arg(long = "resource")]
    pub resources: Vec<String>,

    #[arg(long)]
    pub resource_type: Option<String>,

    /// Path pattern to skip, e.g. `arn` or `root_block_device[*].volume_id`
    #[arg(long = "ignore")]
    pub ignore: Vec<String>,

    /// Collection identity as FIELD=KEY, or FIELD=@value
    #[arg(long = "identity", value_parser = parse_identity)]
    pub identity: Vec<(String, IdentityKey)>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    #[arg(long, env = "DRIFTSCAN_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub max_in_flight: Option<usize>,

    #[arg(long)]
    pub timeout_secs: Option<u64>,

    #[arg(long, env = TOKEN_ENV, hide_env_values = true)]
    pub token: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    #[arg(long)]
    pub declared: PathBuf,

    #[arg(long)]
    pub resource_type: Option<String>,

    #[arg(long, env = "DRIFTSCAN_CONFIG")]
    pub config: Option<PathBuf>,
}
