//! The PollingOrchestrator drives block processing: it picks the next block,
//! waits until the block is deep enough, runs assembly and filtering,
//! persists the matches and advances the cursor.

use std::{sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;

use super::{
    address_filter::AddressFilter,
    assembler::{TransactionAssembler, internal_key},
    error::PipelineError,
    harvester::CURRENT_BLOCK_KEY,
    reporter::ErrorReporter,
};
use crate::{
    config::AppConfig,
    models::BlockCursor,
    persistence::{
        error::PersistenceError,
        traits::{CacheStore, DocumentStore},
    },
    providers::ChainClient,
};

/// Cache key mirroring the durable block cursor.
pub const LAST_BLOCK_KEY: &str = "last-block-num";

/// What one orchestrator cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The candidate is closer to the head than the readiness margin.
    Waiting {
        /// The block that would have been processed.
        candidate: u64,
        /// The chain head at the time of the check.
        head: u64,
    },
    /// The block was processed and the cursor advanced.
    Processed {
        /// The processed block.
        block_number: u64,
        /// Number of transactions persisted.
        matched: usize,
    },
    /// The chain has not produced the candidate block yet.
    NotProduced(u64),
    /// The cycle failed. The cursor was not advanced.
    Failed,
}

/// The main block processing loop.
pub struct PollingOrchestrator {
    chain: Arc<dyn ChainClient>,
    cache: Arc<dyn CacheStore>,
    documents: Arc<dyn DocumentStore>,
    assembler: Arc<TransactionAssembler>,
    filter: AddressFilter,
    reporter: Arc<ErrorReporter>,
    environment: String,
    readiness_margin: u64,
    wait_delay: Duration,
    polling_interval: Duration,
    cancellation_token: CancellationToken,
}

impl PollingOrchestrator {
    /// Creates an orchestrator and its address filter from `config`.
    pub fn new(
        config: &AppConfig,
        chain: Arc<dyn ChainClient>,
        cache: Arc<dyn CacheStore>,
        documents: Arc<dyn DocumentStore>,
        assembler: Arc<TransactionAssembler>,
        reporter: Arc<ErrorReporter>,
        cancellation_token: CancellationToken,
    ) -> Self {
        let filter = AddressFilter::new(
            cache.clone(),
            documents.clone(),
            config.environment.clone(),
            config.cache_ttl.subscribed_addresses_secs,
        );
        Self {
            chain,
            cache,
            documents,
            assembler,
            filter,
            reporter,
            environment: config.environment.clone(),
            readiness_margin: config.readiness_margin,
            wait_delay: config.wait_delay_ms,
            polling_interval: config.polling_interval_ms,
            cancellation_token,
        }
    }

    /// Starts the long-running processing loop. A cycle in progress always
    /// completes before the cancellation signal is observed.
    pub async fn run(self) {
        tracing::info!(environment = %self.environment, "Polling orchestrator started.");
        let mut delay = self.polling_interval;
        loop {
            let polling_delay = tokio::time::sleep(delay);

            tokio::select! {
                biased;

                _ = self.cancellation_token.cancelled() => {
                    tracing::info!("Orchestrator cancellation signal received, shutting down...");
                    break;
                }

                _ = polling_delay => {
                    delay = match self.run_cycle().await {
                        CycleOutcome::Waiting { .. } => self.wait_delay,
                        _ => self.polling_interval,
                    };
                }
            }
        }
        tracing::info!("Orchestrator has shut down.");
    }

    /// Runs one cycle and settles its error: a block that is not produced
    /// yet passes silently, anything else goes to the reporter.
    pub async fn run_cycle(&self) -> CycleOutcome {
        match self.cycle().await {
            Ok(outcome) => outcome,
            Err(PipelineError::WaitForBlock(block_number)) => {
                tracing::debug!(block_number, "Block not produced yet.");
                CycleOutcome::NotProduced(block_number)
            }
            Err(e) => {
                tracing::error!(error = %e, "Orchestrator cycle failed.");
                self.reporter.report(&e).await;
                CycleOutcome::Failed
            }
        }
    }

    /// One pass of the state machine, with errors returned to the caller.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn cycle(&self) -> Result<CycleOutcome, PipelineError> {
        let candidate = self.next_block().await?;
        self.cache.set(CURRENT_BLOCK_KEY, &candidate.to_string(), None).await?;

        let head = self.chain.block_number().await?;
        if !is_ready(head, candidate, self.readiness_margin) {
            tracing::debug!(candidate, head, "Candidate block too close to head, waiting.");
            return Ok(CycleOutcome::Waiting { candidate, head });
        }

        let set = self.assembler.assemble(candidate).await?;
        let matched = self.filter.filter(set).await?;
        if !matched.is_empty() {
            self.documents.upsert_transactions(&self.environment, &matched).await?;
        }

        self.advance_cursor(candidate).await?;
        tracing::info!(block_number = candidate, matched = matched.len(), "Processed block.");
        Ok(CycleOutcome::Processed { block_number: candidate, matched: matched.len() })
    }

    /// The block after the cursor. Seeds the cursor from the chain head on
    /// first run.
    async fn next_block(&self) -> Result<u64, PipelineError> {
        if let Some(last) = self.last_block().await? {
            return Ok(last.saturating_add(1));
        }
        let head = self.chain.block_number().await?;
        self.write_cursor(head).await?;
        tracing::info!(head, "No block cursor found, starting from the chain head.");
        Ok(head.saturating_add(1))
    }

    /// The last processed block, from the cache mirror or the document store.
    pub async fn last_block(&self) -> Result<Option<u64>, PersistenceError> {
        if let Some(cached) = self.cache.get(LAST_BLOCK_KEY).await? {
            match cached.parse::<u64>() {
                Ok(block_number) => return Ok(Some(block_number)),
                Err(e) => {
                    tracing::warn!(value = %cached, error = %e, "Ignoring corrupt cursor mirror.")
                }
            }
        }
        let cursor = self.documents.get_cursor(&self.environment).await?;
        Ok(cursor.map(|c| c.last_block_number))
    }

    async fn advance_cursor(&self, block_number: u64) -> Result<(), PersistenceError> {
        self.write_cursor(block_number).await?;
        self.cache.delete(&internal_key(block_number)).await
    }

    async fn write_cursor(&self, block_number: u64) -> Result<(), PersistenceError> {
        self.documents.set_cursor(&self.environment, &BlockCursor::now(block_number)).await?;
        self.cache.set(LAST_BLOCK_KEY, &block_number.to_string(), None).await
    }
}

/// Whether `candidate` is at least `margin` blocks behind `head`.
pub fn is_ready(head: u64, candidate: u64, margin: u64) -> bool {
    head.checked_sub(candidate).is_some_and(|distance| distance >= margin)
}

#[cfg(test)]
mod tests {
    use alloy::primitives::U256;

    use super::*;
    use crate::{
        engine::reporter::MockFaultSink,
        models::InternalTransaction,
        persistence::{
            SqliteStore,
            sqlite::setup_test_db,
            traits::{CacheStoreExt, MockDocumentStore},
        },
        providers::DataSourceError,
        test_helpers::{
            BlockBuilder, FakeChainClient, InternalBuilder, StaticCodeDirectory,
            StaticSignatureDirectory, TransactionBuilder, build_assembler,
        },
    };

    const WATCHED: &str = "0x2222222222222222222222222222222222222222";

    struct Harness {
        chain: Arc<FakeChainClient>,
        store: Arc<SqliteStore>,
        orchestrator: PollingOrchestrator,
    }

    async fn harness(sink: MockFaultSink) -> Harness {
        let store = Arc::new(setup_test_db().await);
        harness_with_documents(sink, store.clone(), store).await
    }

    async fn harness_with_documents(
        sink: MockFaultSink,
        store: Arc<SqliteStore>,
        documents: Arc<dyn DocumentStore>,
    ) -> Harness {
        let config = AppConfig::default();
        let chain = Arc::new(FakeChainClient::new());
        let assembler = Arc::new(build_assembler(
            chain.clone(),
            store.clone(),
            StaticSignatureDirectory::new(),
            StaticCodeDirectory::new(),
        ));
        let reporter = Arc::new(ErrorReporter::new(
            store.clone(),
            Arc::new(sink),
            Duration::from_secs(60),
        ));
        let orchestrator = PollingOrchestrator::new(
            &config,
            chain.clone(),
            store.clone(),
            documents,
            assembler,
            reporter,
            CancellationToken::new(),
        );
        Harness { chain, store, orchestrator }
    }

    impl Harness {
        async fn set_cursor(&self, block_number: u64) {
            self.store.set(LAST_BLOCK_KEY, &block_number.to_string(), None).await.unwrap();
        }

        async fn document_cursor(&self) -> Option<u64> {
            self.store.get_cursor("development").await.unwrap().map(|c| c.last_block_number)
        }
    }

    #[test]
    fn test_readiness_gate() {
        assert!(is_ready(112, 100, 12));
        assert!(is_ready(200, 100, 12));
        assert!(!is_ready(111, 100, 12));
        assert!(!is_ready(90, 100, 12));
    }

    #[tokio::test]
    async fn test_first_run_seeds_cursor_from_head() {
        let h = harness(MockFaultSink::new()).await;
        h.chain.set_head(1_000);

        let outcome = h.orchestrator.run_cycle().await;

        assert_eq!(outcome, CycleOutcome::Waiting { candidate: 1_001, head: 1_000 });
        assert_eq!(h.orchestrator.last_block().await.unwrap(), Some(1_000));
        assert_eq!(h.document_cursor().await, Some(1_000));
        assert_eq!(h.store.get(CURRENT_BLOCK_KEY).await.unwrap().as_deref(), Some("1001"));
    }

    #[tokio::test]
    async fn test_waits_without_touching_cursor() {
        let h = harness(MockFaultSink::new()).await;
        h.set_cursor(99).await;
        h.chain.set_head(111);

        let outcome = h.orchestrator.run_cycle().await;

        assert_eq!(outcome, CycleOutcome::Waiting { candidate: 100, head: 111 });
        assert_eq!(h.orchestrator.last_block().await.unwrap(), Some(99));
        assert_eq!(h.store.get(CURRENT_BLOCK_KEY).await.unwrap().as_deref(), Some("100"));
    }

    #[tokio::test]
    async fn test_processes_block_and_persists_matches() {
        let h = harness(MockFaultSink::new()).await;
        h.store.add_subscribed_address("development", WATCHED).await.unwrap();
        h.set_cursor(99).await;
        h.chain.add_block(
            BlockBuilder::new(100)
                .transaction(TransactionBuilder::new("0xabc").to(WATCHED).build())
                .transaction(
                    TransactionBuilder::new("0xdef")
                        .to("0x5555555555555555555555555555555555555555")
                        .build(),
                )
                .build(),
        );
        h.chain.set_head(112);
        h.store
            .set_json(&internal_key(100), &Vec::<InternalTransaction>::new(), None)
            .await
            .unwrap();

        let outcome = h.orchestrator.run_cycle().await;

        assert_eq!(outcome, CycleOutcome::Processed { block_number: 100, matched: 1 });
        assert!(h.store.get_transaction("development", "0xabc").await.unwrap().is_some());
        assert!(h.store.get_transaction("development", "0xdef").await.unwrap().is_none());
        assert_eq!(h.orchestrator.last_block().await.unwrap(), Some(100));
        assert_eq!(h.document_cursor().await, Some(100));
        assert_eq!(h.store.get(&internal_key(100)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_block_without_matches_still_advances() {
        let h = harness(MockFaultSink::new()).await;
        h.set_cursor(99).await;
        h.chain.add_block(BlockBuilder::new(100).build());
        h.chain.set_head(112);

        let outcome = h.orchestrator.run_cycle().await;

        assert_eq!(outcome, CycleOutcome::Processed { block_number: 100, matched: 0 });
        assert_eq!(h.orchestrator.last_block().await.unwrap(), Some(100));
    }

    #[tokio::test]
    async fn test_block_not_found_is_silent() {
        let mut sink = MockFaultSink::new();
        sink.expect_report().times(0);
        let h = harness(sink).await;
        h.set_cursor(99).await;
        h.chain.set_head(200);
        h.chain.fail_block(100, DataSourceError::BlockNotFound(100));

        let outcome = h.orchestrator.run_cycle().await;

        assert_eq!(outcome, CycleOutcome::NotProduced(100));
        assert_eq!(h.orchestrator.last_block().await.unwrap(), Some(99));
    }

    #[tokio::test]
    async fn test_chain_error_is_reported_once_per_window() {
        let mut sink = MockFaultSink::new();
        sink.expect_report().times(1).return_const(());
        let h = harness(sink).await;
        h.set_cursor(99).await;
        h.chain.set_head(200);
        h.chain.fail_block(
            100,
            DataSourceError::Response { code: -32602, message: "invalid params".into() },
        );

        assert_eq!(h.orchestrator.run_cycle().await, CycleOutcome::Failed);
        assert_eq!(h.orchestrator.run_cycle().await, CycleOutcome::Failed);
        assert_eq!(h.orchestrator.last_block().await.unwrap(), Some(99));
    }

    #[tokio::test]
    async fn test_persistence_failure_fails_cycle_without_advancing() {
        let mut sink = MockFaultSink::new();
        sink.expect_report().times(1).return_const(());
        let store = Arc::new(setup_test_db().await);
        let mut documents = MockDocumentStore::new();
        documents
            .expect_subscribed_addresses()
            .returning(|_| Ok(vec![WATCHED.to_string()]));
        documents
            .expect_upsert_transactions()
            .returning(|_, _| Err(PersistenceError::OperationFailed("disk full".into())));
        documents.expect_set_cursor().times(0);
        documents.expect_get_cursor().returning(|_| Ok(None));
        let h = harness_with_documents(sink, store.clone(), Arc::new(documents)).await;
        h.set_cursor(99).await;
        h.chain.add_block(
            BlockBuilder::new(100)
                .transaction(
                    TransactionBuilder::new("0xabc").to(WATCHED).value(U256::from(1u64)).build(),
                )
                .build(),
        );
        h.chain.set_head(112);

        assert_eq!(h.orchestrator.run_cycle().await, CycleOutcome::Failed);
        assert_eq!(h.orchestrator.last_block().await.unwrap(), Some(99));
    }

    #[tokio::test]
    async fn test_cursor_falls_back_to_document_store() {
        let h = harness(MockFaultSink::new()).await;
        h.store.set_cursor("development", &BlockCursor::now(41)).await.unwrap();

        assert_eq!(h.orchestrator.last_block().await.unwrap(), Some(41));
    }

    #[tokio::test]
    async fn test_internal_only_transfer_reaches_subscriber() {
        let h = harness(MockFaultSink::new()).await;
        h.store
            .add_subscribed_address("development", "0x4444444444444444444444444444444444444444")
            .await
            .unwrap();
        h.set_cursor(99).await;
        h.chain.add_block(BlockBuilder::new(100).build());
        h.chain.set_head(112);
        h.store
            .set_json(
                &internal_key(100),
                &vec![InternalBuilder::new("0xaaa").block_number(100).value(U256::from(7u64)).build()],
                None,
            )
            .await
            .unwrap();

        let outcome = h.orchestrator.run_cycle().await;

        assert_eq!(outcome, CycleOutcome::Processed { block_number: 100, matched: 1 });
        let stored = h.store.get_transaction("development", "0xaaa").await.unwrap().unwrap();
        assert_eq!(stored.function_name.as_deref(), Some("Internal"));
    }

    #[tokio::test]
    async fn test_run_stops_on_cancellation() {
        let h = harness(MockFaultSink::new()).await;
        h.orchestrator.cancellation_token.cancel();

        tokio::time::timeout(Duration::from_secs(1), h.orchestrator.run()).await.unwrap();
    }
}
