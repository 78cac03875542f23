//! CLI argument parsing for the reconciliation job.
//!
//! Flags only feed `RunConfig` resolution; nothing downstream sees `RootArgs`.
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Environment variable consulted when `--api-key` is not given.
pub const ACCESS_KEY_ENV: &str = "POSITIONSTACK_ACCESS_KEY";

#[derive(Parser, Debug)]
#[command(
    name = "exposure-geocode",
    version,
    about = "Reconcile and geocode the Victorian exposure-site dataset",
    after_help = "Examples:\n  exposure-geocode run --api-key KEY\n  exposure-geocode run --api-key KEY --dataset-file snapshot.json --max-lookups 50\n  exposure-geocode status --json\n  exposure-geocode clear-skips --postcode 3128",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Run(RunArgs),
    Status(StatusArgs),
    ClearSkips(ClearSkipsArgs),
}

/// Inputs for one fetch → reconcile → geocode → write pass.
#[derive(Parser, Debug, Default)]
#[command(about = "Fetch the dataset, geocode new sites, and write both outputs")]
pub struct RunArgs {
    /// Geocoding service access key
    #[arg(long = "api-key", alias = "api", value_name = "KEY", env = ACCESS_KEY_ENV)]
    pub api_key: Option<String>,

    /// JSON config file with endpoint and tuning overrides
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Read the dataset envelope from a local file instead of the portal
    #[arg(long, value_name = "PATH")]
    pub dataset_file: Option<PathBuf>,

    /// Forward-geocoding endpoint
    #[arg(long, value_name = "URL")]
    pub geocode_endpoint: Option<String>,

    /// Enriched dataset output path
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Minimal record store path
    #[arg(long, value_name = "PATH")]
    pub store: Option<PathBuf>,

    /// Extra attempts for transient geocoding failures
    #[arg(long, value_name = "N")]
    pub retries: Option<u32>,

    /// Minimum spacing between geocoding requests
    #[arg(long, value_name = "MS")]
    pub interval_ms: Option<u64>,

    /// Cap on geocoding lookups this run; the rest wait for the next run
    #[arg(long, value_name = "N")]
    pub max_lookups: Option<usize>,

    /// HTTP timeout for each request
    #[arg(long, value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// Emit the run summary as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Enable debug logging
    #[arg(long)]
    pub verbose: bool,
}

/// Store summary inputs.
#[derive(Parser, Debug)]
#[command(about = "Summarize the record store")]
pub struct StatusArgs {
    /// Minimal record store path
    #[arg(long, value_name = "PATH", default_value = crate::config::DEFAULT_STORE_PATH)]
    pub store: PathBuf,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

/// Operator reset of permanent skip flags.
#[derive(Parser, Debug)]
#[command(about = "Clear skip flags so failed sites are geocoded again")]
pub struct ClearSkipsArgs {
    /// Minimal record store path
    #[arg(long, value_name = "PATH", default_value = crate::config::DEFAULT_STORE_PATH)]
    pub store: PathBuf,

    /// Only clear sites with this postcode
    #[arg(long, value_name = "POSTCODE")]
    pub postcode: Option<String>,
}

impl Command {
    pub fn verbose(&self) -> bool {
        match self {
            Command::Run(args) => args.verbose,
            Command::Status(_) | Command::ClearSkips(_) => false,
        }
    }
}
