use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

use macau_ingest::app::ports::PayloadExtractor;
use macau_ingest::config::IngestConfig;
use macau_ingest::db::SqliteStore;
use macau_ingest::infra::http_client::ReqwestHttp;
use macau_ingest::infra::next_data::NextDataExtractor;
use macau_ingest::logging;
use macau_ingest::pipeline::IngestRunner;
use macau_ingest::storage::{EventStore, InMemoryStore};

#[derive(Parser)]
#[command(name = "macau_ingest")]
#[command(about = "MacauTicket.com event ingester")]
#[command(version)]
struct Cli {
    /// TOML config file (defaults to ./ingest.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite event store path, overriding the configured one
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Use a throwaway in-memory store instead of SQLite
    #[arg(long, global = true)]
    in_memory: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one ingest pass (the default)
    Run,
    /// Fetch and normalize a few listing items, print them, write nothing
    Preview {
        #[arg(long, default_value_t = 8)]
        limit: usize,
    },
    /// Create the configured source in the SQLite store if it is missing
    RegisterSource,
}

fn build_extractor(config: &IngestConfig) -> anyhow::Result<Arc<dyn PayloadExtractor>> {
    let http = ReqwestHttp::new(config.request_timeout()).context("building HTTP client")?;
    Ok(Arc::new(NextDataExtractor::new(
        Arc::new(http),
        &config.user_agent,
        &config.listing_url,
    )))
}

fn open_store(config: &IngestConfig, in_memory: bool) -> anyhow::Result<Arc<dyn EventStore>> {
    if in_memory {
        let store = InMemoryStore::new();
        store.register_source(&config.source_name);
        return Ok(Arc::new(store));
    }
    let store = SqliteStore::open(&config.database_path)
        .with_context(|| format!("opening event store {}", config.database_path.display()))?;
    Ok(Arc::new(store))
}

async fn run(config: IngestConfig, in_memory: bool) -> anyhow::Result<ExitCode> {
    let store = open_store(&config, in_memory)?;
    let extractor = build_extractor(&config)?;
    let runner = IngestRunner::new(config, extractor, store);

    let summary = runner.run().await?;
    println!("\n📊 Ingest run {}: {}", summary.run_id, summary.status.as_str());
    println!("   Found:    {}", summary.events_found);
    println!("   Upserted: {}", summary.events_upserted);
    println!("   Skipped:  {}", summary.events_skipped);
    println!("   Errors:   {}", summary.errors_count);

    Ok(if summary.status.is_failure() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

async fn preview(config: IngestConfig, limit: usize) -> anyhow::Result<ExitCode> {
    let extractor = build_extractor(&config)?;
    let runner = IngestRunner::new(config, extractor, Arc::new(InMemoryStore::new()));
    for event in runner.preview(limit).await? {
        println!("{}", serde_json::to_string(&event)?);
    }
    Ok(ExitCode::SUCCESS)
}

async fn execute(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut config = IngestConfig::load(cli.config.as_deref())?;
    if let Some(path) = cli.database {
        config.database_path = path;
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(config, cli.in_memory).await,
        Commands::Preview { limit } => preview(config, limit).await,
        Commands::RegisterSource => {
            let store = SqliteStore::open(&config.database_path)?;
            let id = store.register_source(&config.source_name)?;
            info!("Source '{}' is {}", config.source_name, id);
            println!("{id}");
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let _log_guard = logging::init_logging();
    let cli = Cli::parse();

    match execute(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("Ingest failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
