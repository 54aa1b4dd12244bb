//! The Supervisor module manages the lifecycle of the blockassist service.
//!
//! It owns the two long-running loops, the polling orchestrator and the
//! internal transaction harvester, along with the store they share.
//!
//! ## Responsibilities
//!
//! - **Initialization**: the `SupervisorBuilder` wires the chain client, the
//!   stores, the resolvers and the loops together.
//! - **Lifecycle management**: `Supervisor::run` spawns the selected loops and
//!   a cache purge task, and watches them.
//! - **Graceful shutdown**: SIGINT or SIGTERM cancels every loop between
//!   cycles. Cleanup is bounded by the configured shutdown timeout.

mod builder;

use std::{sync::Arc, time::Duration};

pub use builder::{SupervisorBuilder, wire_assembler};
use thiserror::Error;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use crate::{
    codec::AddressError,
    config::AppConfig,
    engine::{harvester::InternalTransactionHarvester, orchestrator::PollingOrchestrator},
    http_client::HttpLookupError,
    persistence::{SqliteStore, error::PersistenceError},
    providers::rpc::ProviderError,
};

const CACHE_PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Represents the set of errors that can occur while building or running the
/// supervisor.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// A required configuration was not provided to the `SupervisorBuilder`.
    #[error("Missing configuration for Supervisor")]
    MissingConfig,

    /// A store was not provided to the `SupervisorBuilder`.
    #[error("Missing store for Supervisor")]
    MissingStore,

    /// A chain client was not provided to the `SupervisorBuilder`.
    #[error("Missing chain client for Supervisor")]
    MissingChainClient,

    /// An error occurred in the store.
    #[error("Store error: {0}")]
    Persistence(#[from] PersistenceError),

    /// An error occurred while trying to create a provider.
    #[error("Provider creation failed: {0}")]
    Provider(#[from] ProviderError),

    /// The configured address prefix is not usable.
    #[error("Invalid address prefix: {0}")]
    Address(#[from] AddressError),

    /// The HTTP client for the directories could not be built.
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] HttpLookupError),
}

/// Which loops a process runs. The orchestrator and the harvester only share
/// the cache store, so they can be deployed as separate processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Services {
    /// Both loops.
    #[default]
    All,
    /// Only the polling orchestrator.
    Orchestrator,
    /// Only the internal transaction harvester.
    Harvester,
}

impl Services {
    fn orchestrator(self) -> bool {
        matches!(self, Self::All | Self::Orchestrator)
    }

    fn harvester(self) -> bool {
        matches!(self, Self::All | Self::Harvester)
    }
}

/// The primary runtime manager for the application.
pub struct Supervisor {
    config: Arc<AppConfig>,
    store: Arc<SqliteStore>,
    orchestrator: Option<PollingOrchestrator>,
    harvester: Option<InternalTransactionHarvester>,
    cancellation_token: CancellationToken,
    join_set: tokio::task::JoinSet<()>,
}

impl Supervisor {
    fn new(
        config: AppConfig,
        store: Arc<SqliteStore>,
        orchestrator: Option<PollingOrchestrator>,
        harvester: Option<InternalTransactionHarvester>,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            orchestrator,
            harvester,
            cancellation_token,
            join_set: tokio::task::JoinSet::new(),
        }
    }

    /// Returns a new `SupervisorBuilder` instance.
    pub fn builder() -> SupervisorBuilder {
        SupervisorBuilder::new()
    }

    /// The token that stops every supervised loop.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Starts the selected loops and blocks until shutdown.
    ///
    /// A task that panics cancels every other task, so the process exits
    /// instead of running half of the pipeline.
    pub async fn run(mut self) -> Result<(), SupervisorError> {
        let cancellation_token = self.cancellation_token.clone();
        self.join_set.spawn(async move {
            let ctrl_c = signal::ctrl_c();
            #[cfg(unix)]
            let terminate = async {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        sigterm.recv().await;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to register SIGTERM handler.");
                        std::future::pending::<()>().await;
                    }
                }
            };
            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                _ = ctrl_c => tracing::info!("SIGINT (Ctrl+C) received, initiating graceful shutdown."),
                _ = terminate => tracing::info!("SIGTERM received, initiating graceful shutdown."),
                _ = cancellation_token.cancelled() => {}
            }

            cancellation_token.cancel();
        });

        if let Some(orchestrator) = self.orchestrator.take() {
            self.join_set.spawn(orchestrator.run());
        }
        if let Some(harvester) = self.harvester.take() {
            self.join_set.spawn(harvester.run());
        }

        let purge_store = Arc::clone(&self.store);
        let purge_token = self.cancellation_token.clone();
        self.join_set.spawn(async move {
            let mut interval = tokio::time::interval(CACHE_PURGE_INTERVAL);
            loop {
                tokio::select! {
                    biased;
                    _ = purge_token.cancelled() => break,
                    _ = interval.tick() => {
                        if let Err(e) = purge_store.purge_expired().await {
                            tracing::warn!(error = %e, "Failed to purge expired cache entries.");
                        }
                    }
                }
            }
        });

        loop {
            tokio::select! {
                maybe_result = self.join_set.join_next() => {
                    match maybe_result {
                        Some(Ok(())) => {}
                        Some(Err(e)) => {
                            tracing::error!(error = ?e, "A supervised task failed. Initiating shutdown.");
                            self.cancellation_token.cancel();
                        }
                        None => break,
                    }
                }
                _ = self.cancellation_token.cancelled() => break,
            }
        }

        // Loops observe the token between cycles, so let in-flight cycles
        // finish before the pool closes.
        let shutdown_timeout = self.config.shutdown_timeout;
        let drain = async {
            while self.join_set.join_next().await.is_some() {}
            self.store.close().await;
        };
        if tokio::time::timeout(shutdown_timeout, drain).await.is_err() {
            tracing::warn!(
                timeout = ?shutdown_timeout,
                "Shutdown did not complete within the timeout. Aborting remaining tasks."
            );
            self.join_set.shutdown().await;
        } else {
            tracing::info!("Cleanup completed successfully.");
        }

        tracing::info!("Supervisor shutdown complete.");
        Ok(())
    }
}
