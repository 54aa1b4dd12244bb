//! Assembles a single block and prints the result, without touching the
//! block cursor or the stored transactions.

use std::sync::Arc;

use clap::Parser;
use thiserror::Error;

use crate::{
    config::AppConfig,
    engine::error::PipelineError,
    http_client::{HttpLookupError, create_http_client},
    persistence::{SqliteStore, error::PersistenceError},
    providers::{
        ChainClient,
        rpc::{HarmonyRpcSource, ProviderError, create_provider},
    },
    supervisor::{SupervisorError, wire_assembler},
};

/// Errors of the `dry-run` command.
#[derive(Error, Debug)]
pub enum Error {
    /// The configuration could not be loaded.
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
    /// The chain provider could not be built.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
    /// The store could not be opened or migrated.
    #[error("Store error: {0}")]
    Persistence(#[from] PersistenceError),
    /// The lookup HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Http(#[from] HttpLookupError),
    /// The assembler could not be wired.
    #[error("Wiring error: {0}")]
    Wiring(#[from] SupervisorError),
    /// Assembling the block failed.
    #[error("Assembly failed: {0}")]
    Pipeline(#[from] PipelineError),
    /// The transaction set could not be rendered.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Arguments of the `dry-run` command.
#[derive(Parser, Debug)]
pub struct DryRunArgs {
    /// The block to assemble.
    #[arg(short, long)]
    block: u64,
}

/// Assembles `args.block` and prints its transaction set as JSON.
///
/// Resolver lookups still warm the cache. The cursor, the current block
/// marker and the document store are left alone.
pub async fn execute(args: DryRunArgs, config_dir: Option<&str>) -> Result<(), Error> {
    let config = AppConfig::new(config_dir)?;

    let store = Arc::new(SqliteStore::new(&config.database_url).await?);
    store.run_migrations().await?;

    let provider = create_provider(config.rpc_urls.clone(), config.rpc_retry_config.clone())?;
    let trace_provider =
        create_provider(config.trace_rpc_urls.clone(), config.rpc_retry_config.clone())?;
    let chain: Arc<dyn ChainClient> = Arc::new(HarmonyRpcSource::new(provider, trace_provider));
    let http_client = Arc::new(create_http_client(&config.http_retry_config)?);

    let assembler = wire_assembler(&config, chain, store.clone(), http_client)?;

    tracing::info!(block_number = args.block, "Assembling block...");
    let set = assembler.assemble(args.block).await;
    store.close().await;
    let set = set?;

    let report = serde_json::to_string_pretty(&set)?;
    println!("{}", report);

    Ok(())
}
