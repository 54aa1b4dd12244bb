use std::sync::Arc;

use blockassist::{
    cmd::dry_run::{self, DryRunArgs},
    config::AppConfig,
    persistence::SqliteStore,
    providers::{HarmonyRpcSource, create_provider},
    supervisor::{Services, Supervisor},
};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding `app.yaml`.
    #[arg(long, global = true)]
    config_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Runs the block orchestrator and the internal transaction harvester.
    Run,
    /// Runs only the block orchestrator.
    Watch,
    /// Runs only the internal transaction harvester.
    Harvest,
    /// Assembles one block and prints it as JSON.
    DryRun(DryRunArgs),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber =
        FmtSubscriber::builder().with_env_filter(EnvFilter::from_default_env()).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let cli = Cli::parse();

    match cli.command {
        Commands::Run => run_supervisor(cli.config_dir, Services::All).await?,
        Commands::Watch => run_supervisor(cli.config_dir, Services::Orchestrator).await?,
        Commands::Harvest => run_supervisor(cli.config_dir, Services::Harvester).await?,
        Commands::DryRun(args) => dry_run::execute(args, cli.config_dir.as_deref()).await?,
    }

    Ok(())
}

async fn run_supervisor(
    config_dir: Option<String>,
    services: Services,
) -> Result<(), Box<dyn std::error::Error>> {
    tracing::debug!("Loading application configuration...");
    let config = AppConfig::new(config_dir.as_deref())?;
    tracing::debug!(
        database_url = %config.database_url,
        rpc_urls = ?config.rpc_urls,
        environment = %config.environment,
        "Configuration loaded."
    );

    let store = Arc::new(SqliteStore::new(&config.database_url).await?);
    store.run_migrations().await?;

    let provider = create_provider(config.rpc_urls.clone(), config.rpc_retry_config.clone())?;
    let trace_provider =
        create_provider(config.trace_rpc_urls.clone(), config.rpc_retry_config.clone())?;
    let chain = HarmonyRpcSource::new(provider, trace_provider);
    tracing::info!(
        retry_policy = ?config.rpc_retry_config,
        "Chain client initialized with fallback and retry policy."
    );

    let supervisor = Supervisor::builder()
        .config(config)
        .store(store)
        .chain(Arc::new(chain))
        .services(services)
        .build()?;

    tracing::info!(?services, "Supervisor initialized, starting...");
    supervisor.run().await?;

    Ok(())
}
