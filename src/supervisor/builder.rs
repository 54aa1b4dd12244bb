//! This module provides the `SupervisorBuilder` for constructing a `Supervisor`.

use std::sync::Arc;

use reqwest_middleware::ClientWithMiddleware;
use tokio_util::sync::CancellationToken;

use super::{Services, Supervisor, SupervisorError};
use crate::{
    codec::AddressCodec,
    config::AppConfig,
    contract::{AbiSource, ContractMetadataResolver, ExplorerCodeDirectory},
    engine::{
        assembler::TransactionAssembler,
        harvester::InternalTransactionHarvester,
        orchestrator::PollingOrchestrator,
        reporter::{ErrorReporter, FaultSink, TracingFaultSink},
    },
    http_client::create_http_client,
    persistence::{SqliteStore, traits::CacheStore},
    providers::ChainClient,
    signature::{FourByteDirectory, SignatureResolver},
};

/// A builder for creating a `Supervisor` instance.
#[derive(Default)]
pub struct SupervisorBuilder {
    config: Option<AppConfig>,
    store: Option<Arc<SqliteStore>>,
    chain: Option<Arc<dyn ChainClient>>,
    http_client: Option<Arc<ClientWithMiddleware>>,
    fault_sink: Option<Arc<dyn FaultSink>>,
    services: Services,
}

impl SupervisorBuilder {
    /// Creates a new, empty `SupervisorBuilder`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the application configuration.
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the store backing both the cache and the documents.
    pub fn store(mut self, store: Arc<SqliteStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the chain client.
    pub fn chain(mut self, chain: Arc<dyn ChainClient>) -> Self {
        self.chain = Some(chain);
        self
    }

    /// Sets the HTTP client used by the directories. One is created from the
    /// configured retry policy when omitted.
    pub fn http_client(mut self, client: Arc<ClientWithMiddleware>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets where faults are reported. Defaults to [`TracingFaultSink`].
    pub fn fault_sink(mut self, sink: Arc<dyn FaultSink>) -> Self {
        self.fault_sink = Some(sink);
        self
    }

    /// Selects which loops the supervisor runs.
    pub fn services(mut self, services: Services) -> Self {
        self.services = services;
        self
    }

    /// Wires the components and builds the `Supervisor`.
    pub fn build(self) -> Result<Supervisor, SupervisorError> {
        let config = self.config.ok_or(SupervisorError::MissingConfig)?;
        let store = self.store.ok_or(SupervisorError::MissingStore)?;
        let chain = self.chain.ok_or(SupervisorError::MissingChainClient)?;
        let http_client = match self.http_client {
            Some(client) => client,
            None => Arc::new(create_http_client(&config.http_retry_config)?),
        };
        let sink = self.fault_sink.unwrap_or_else(|| Arc::new(TracingFaultSink));

        let cache: Arc<dyn CacheStore> = store.clone();
        let reporter =
            Arc::new(ErrorReporter::new(cache.clone(), sink, config.error_report_window_secs));
        let cancellation_token = CancellationToken::new();

        let orchestrator = if self.services.orchestrator() {
            let assembler = wire_assembler(&config, chain.clone(), cache.clone(), http_client)?;
            Some(PollingOrchestrator::new(
                &config,
                chain.clone(),
                cache.clone(),
                store.clone(),
                Arc::new(assembler),
                reporter.clone(),
                cancellation_token.clone(),
            ))
        } else {
            None
        };

        let harvester = self.services.harvester().then(|| {
            InternalTransactionHarvester::new(
                &config,
                chain.clone(),
                cache.clone(),
                reporter.clone(),
                cancellation_token.clone(),
            )
        });

        tracing::info!(
            services = ?self.services,
            environment = %config.environment,
            "Supervisor wired."
        );
        Ok(Supervisor::new(config, store, orchestrator, harvester, cancellation_token))
    }
}

/// Builds a `TransactionAssembler` with the HTTP backed signature and
/// contract code directories.
pub fn wire_assembler(
    config: &AppConfig,
    chain: Arc<dyn ChainClient>,
    cache: Arc<dyn CacheStore>,
    http_client: Arc<ClientWithMiddleware>,
) -> Result<TransactionAssembler, SupervisorError> {
    let codec = AddressCodec::new(&config.address_hrp)?;
    let ttl = &config.cache_ttl;

    let signature_directory =
        FourByteDirectory::new(http_client.clone(), config.signature_directory_url.clone());
    let signatures =
        Arc::new(SignatureResolver::new(cache.clone(), Arc::new(signature_directory), ttl));

    let code_directory = ExplorerCodeDirectory::new(http_client, config.contract_code_url.clone());
    let abi_source = Arc::new(AbiSource::new(cache.clone(), Arc::new(code_directory), ttl));
    let contracts =
        Arc::new(ContractMetadataResolver::new(chain.clone(), cache.clone(), abi_source, ttl));

    Ok(TransactionAssembler::new(
        chain,
        cache,
        codec,
        signatures,
        contracts,
        config.asset_symbol.clone(),
    ))
}
