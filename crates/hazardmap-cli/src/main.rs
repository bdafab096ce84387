use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use hazardmap_core::app::{
    BuildError, IntakeError, LookupError, LookupHandler, LookupView, PipelineBuilder,
};
use hazardmap_core::config::{ConfigError, HazardConfig};
use hazardmap_core::domain::DedupKey;
use hazardmap_core::impls::{HttpNormalizer, JsonFileResultStore};
use hazardmap_core::ports::{NormalizeError, ResultStore, StoreCounts, StoreError, SystemClock};

#[derive(Parser)]
#[command(name = "hazardmap", version, about = "住所からハザードマップのタイル URL を引く")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Resolve an address and print its hazard map URLs")]
    Resolve(ResolveArgs),
    #[command(about = "Show a stored lookup by dedup key")]
    Lookup(LookupArgs),
    #[command(about = "Count stored lookups by status")]
    Stats(StoreArgs),
}

#[derive(clap::Args, Debug)]
struct ResolveArgs {
    #[clap(help = "Address, e.g. 東京都千代田区千代田1-1")]
    address: String,
    #[clap(long, help = "Tile zoom level (default 17)")]
    zoom: Option<u8>,
    #[clap(long, help = "Normalization service URL (or HAZARDMAP_NORMALIZER_ENDPOINT)")]
    endpoint: Option<String>,
    #[clap(long, help = "Keep results in this directory (or HAZARDMAP_STORE_DIR)")]
    store_dir: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
struct LookupArgs {
    #[clap(help = "Dedup key returned by resolve")]
    key: String,
    #[clap(flatten)]
    store: StoreArgs,
}

#[derive(clap::Args, Debug)]
struct StoreArgs {
    #[clap(long, help = "Result store directory (or HAZARDMAP_STORE_DIR)")]
    store_dir: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Normalizer(#[from] NormalizeError),

    #[error(transparent)]
    Intake(#[from] IntakeError),

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("no store directory. Pass --store-dir or set HAZARDMAP_STORE_DIR")]
    MissingStoreDir,

    #[error("{message}")]
    Unresolved { message: String },

    #[error("lookup {0} is still pending")]
    StillPending(DedupKey),
}

impl CliError {
    fn exit_code(&self) -> ExitCode {
        match self {
            CliError::Unresolved { .. } => ExitCode::from(1),
            CliError::StillPending(_) => ExitCode::from(3),
            _ => ExitCode::from(2),
        }
    }
}

#[derive(Serialize)]
struct StatsReport<'a> {
    store_dir: &'a Path,
    #[serde(flatten)]
    counts: StoreCounts,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hazardmap_core=debug"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "command failed");
            e.exit_code()
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = HazardConfig::from_env()?;
    match cli.command {
        Commands::Resolve(args) => resolve(config, args).await,
        Commands::Lookup(args) => lookup(config, args).await,
        Commands::Stats(args) => stats(config, args).await,
    }
}

async fn resolve(mut config: HazardConfig, args: ResolveArgs) -> Result<(), CliError> {
    if let Some(zoom) = args.zoom {
        config.zoom_level = zoom;
    }
    if let Some(endpoint) = args.endpoint {
        config.normalizer_endpoint = Some(endpoint);
    }
    if let Some(dir) = args.store_dir {
        config.store_dir = Some(dir);
    }

    let normalizer = HttpNormalizer::new(config.require_normalizer_endpoint()?, config.normalize_timeout)?;
    let mut builder = PipelineBuilder::new().normalizer(Arc::new(normalizer));
    if let Some(dir) = &config.store_dir {
        builder = builder.store(Arc::new(JsonFileResultStore::open(dir).await?));
    }
    let pipeline = builder.config(config).build()?;

    let workers = pipeline.start_workers();
    let key = pipeline.submit(&args.address).await?;
    info!(dedup_key = %key, "submitted");
    let view = pipeline.wait_for_terminal(&key).await;
    workers.shutdown_and_join().await;

    match view? {
        LookupView::Complete { data } => {
            println!("{}", serde_json::to_string_pretty(&data)?);
            Ok(())
        }
        LookupView::Failed { message, .. } => Err(CliError::Unresolved { message }),
        LookupView::Pending => Err(CliError::StillPending(key)),
    }
}

async fn lookup(config: HazardConfig, args: LookupArgs) -> Result<(), CliError> {
    let dir = store_dir(&config, &args.store)?;
    let store = Arc::new(JsonFileResultStore::open(dir).await?);
    let handler = LookupHandler::new(store, Arc::new(SystemClock), config.pending_stale_after);

    let view = handler.view(&args.key).await?;
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}

async fn stats(config: HazardConfig, args: StoreArgs) -> Result<(), CliError> {
    let dir = store_dir(&config, &args)?;
    let store = JsonFileResultStore::open(dir).await?;
    let report = StatsReport {
        store_dir: store.root(),
        counts: store.counts().await?,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn store_dir<'a>(config: &'a HazardConfig, args: &'a StoreArgs) -> Result<&'a Path, CliError> {
    args.store_dir
        .as_deref()
        .or(config.store_dir.as_deref())
        .ok_or(CliError::MissingStoreDir)
}
