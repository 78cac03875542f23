use anyhow::{Context, Result};
use clap::Parser;

mod cli;
mod config;
mod dataset;
mod error;
mod geocode;
mod join;
mod normalize;
mod persist;
mod pipeline;
mod record;
mod sanitize;
mod store;

use cli::{ClearSkipsArgs, Command, RootArgs, RunArgs, StatusArgs};
use config::{http_agent, load_config_file, resolve_run_config, ConfigFile};
use geocode::PositionstackClient;
use pipeline::RunSummary;
use store::Store;

fn main() -> Result<()> {
    let args = RootArgs::parse();
    init_tracing(args.command.verbose());

    match args.command {
        Command::Run(args) => cmd_run(args),
        Command::Status(args) => cmd_status(args),
        Command::ClearSkips(args) => cmd_clear_skips(args),
    }
}

fn init_tracing(verbose: bool) {
    let env = std::env::var(tracing_subscriber::EnvFilter::DEFAULT_ENV).ok();
    let filter = tracing_subscriber::EnvFilter::try_new(log_directives(verbose, env))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// `--verbose` forces debug output even when `RUST_LOG` is set.
fn log_directives(verbose: bool, env: Option<String>) -> String {
    if verbose {
        return "debug".to_string();
    }
    env.filter(|directives| !directives.trim().is_empty())
        .unwrap_or_else(|| "info".to_string())
}

fn cmd_run(args: RunArgs) -> Result<()> {
    let file = match &args.config {
        Some(path) => load_config_file(path)?,
        None => ConfigFile::default(),
    };
    let config = resolve_run_config(&args, file)?;
    let agent = http_agent(config.timeout);
    let mut geocoder = PositionstackClient::new(agent.clone(), &config.geocode);

    let summary = pipeline::run(&config, &agent, &mut geocoder).context("reconcile dataset")?;
    if args.json {
        let text = serde_json::to_string_pretty(&summary).context("serialize run summary")?;
        println!("{text}");
    } else {
        print_summary(&summary);
    }
    Ok(())
}

fn cmd_status(args: StatusArgs) -> Result<()> {
    let store = Store::load(&args.store)?;
    let stats = store.stats();
    if args.json {
        let text = serde_json::to_string_pretty(&stats).context("serialize store stats")?;
        println!("{text}");
        return Ok(());
    }
    println!("store: {}", args.store.display());
    println!("sites: {}", stats.total);
    println!("resolved: {}", stats.resolved);
    println!("skipped: {}", stats.skipped);
    println!("pending: {}", stats.pending);
    Ok(())
}

fn cmd_clear_skips(args: ClearSkipsArgs) -> Result<()> {
    let mut store = Store::load(&args.store)?;
    if store.is_empty() {
        tracing::warn!(store = %args.store.display(), "store is empty or absent");
    }
    let cleared = store.clear_skips(args.postcode.as_deref());
    if cleared > 0 {
        store.save(&args.store)?;
    }
    tracing::info!(cleared, store = %args.store.display(), "cleared skip flags");
    println!("cleared {cleared} skip flag(s)");
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!(
        "dataset: {} records, {} unique sites ({} new, {} known)",
        summary.dataset_records,
        summary.unique_sites,
        summary.merge.inserted,
        summary.merge.retained
    );
    println!(
        "geocoding: {} cached, {} resolved, {} skipped, {} deferred ({} requests)",
        summary.geocode.cached,
        summary.geocode.resolved,
        summary.geocode.skipped,
        summary.geocode.deferred,
        summary.geocode.requests
    );
    println!(
        "store: {} sites ({} resolved, {} skipped, {} pending); {} enriched records written",
        summary.store.total,
        summary.store.resolved,
        summary.store.skipped,
        summary.store.pending,
        summary.enriched_records
    );
}
