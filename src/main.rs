//! Thread-Harvest main entry point
//!
//! This is the command-line interface for the Thread-Harvest comment harvester.

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thread_harvest::config::{load_config_with_hash, Config};
use thread_harvest::harvest::HtmlFallback;
use thread_harvest::model::Continuation;
use thread_harvest::output::{load_statistics, print_statistics, write_records_json, HarvestStatistics};
use thread_harvest::storage::{open_storage, DurableSink};
use thread_harvest::transport::{build_http_client, ClientContext, HttpClient, RetryPolicy};
use thread_harvest::{ContinuationToken, Harvester, SeedRequest};
use tracing_subscriber::EnvFilter;

/// Thread-Harvest: an incremental comment-thread harvester
///
/// Walks a paginated comment sequence from a seed continuation token, fetches
/// every reply collection under bounded concurrency, and stores the records
/// in a SQLite database.
#[derive(Parser, Debug)]
#[command(name = "thread-harvest")]
#[command(version = "1.0.0")]
#[command(about = "An incremental comment-thread harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Seed continuation token of the top-level comment sequence
    #[arg(long, required_unless_present_any = ["stats", "dump"])]
    token: Option<String>,

    /// Session identifier (random if omitted)
    #[arg(long)]
    session: Option<String>,

    /// Saved rendered page to scrape when the network harvest is empty
    #[arg(long, value_name = "FILE")]
    fallback_html: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dump")]
    stats: bool,

    /// Print stored records as JSON and exit
    #[arg(long, conflicts_with = "stats")]
    dump: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let store = open_storage(Path::new(&config.output.database_path))
        .with_context(|| format!("Failed to open {}", config.output.database_path))?;
    let sink = DurableSink::new(store);

    if cli.stats {
        handle_stats(&sink, cli.session).await
    } else if cli.dump {
        handle_dump(&sink).await
    } else {
        handle_harvest(config, sink, cli).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("thread_harvest=info,warn"),
            1 => EnvFilter::new("thread_harvest=debug,info"),
            2 => EnvFilter::new("thread_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --stats mode: shows statistics from the database
async fn handle_stats(sink: &DurableSink, session: Option<String>) -> anyhow::Result<()> {
    let stats = match session {
        Some(session_id) => {
            let session = sink
                .with_store(move |store| store.get_session(&session_id))
                .await?;
            HarvestStatistics::from(&session)
        }
        None => load_statistics(sink).await?,
    };

    print_statistics(&stats);
    Ok(())
}

/// Handles the --dump mode: prints stored records as JSON
async fn handle_dump(sink: &DurableSink) -> anyhow::Result<()> {
    let records = sink.read_all().await?;
    write_records_json(&records, std::io::stdout().lock())?;
    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(config: Config, sink: DurableSink, cli: Cli) -> anyhow::Result<()> {
    let token = cli
        .token
        .context("A seed token is required to start a harvest")?;
    let session_id = cli
        .session
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let client = HttpClient::new(build_http_client(&config.client)?);
    let mut harvester = Harvester::new(
        config.harvest.clone(),
        Arc::new(client),
        RetryPolicy::from(&config.retry),
        sink,
    )?;

    if let Some(path) = &cli.fallback_html {
        let fallback = HtmlFallback::from_file(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        harvester = harvester.with_fallback(fallback);
    }

    let seed = SeedRequest::new(session_id, Continuation::new(ContinuationToken::new(token)))
        .with_context(ClientContext::from_config(&config.client));

    let report = match harvester.harvest(seed).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            return Err(e.into());
        }
    };

    print_statistics(&HarvestStatistics::from(&report));
    Ok(())
}
