//! The InternalTransactionHarvester traces blocks ahead of the orchestrator
//! and publishes their internal transactions through the cache store.

use std::{collections::HashSet, sync::Arc, time::Duration};

use alloy::primitives::U256;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use super::{
    assembler::{INTERNAL_KEY_PREFIX, internal_key},
    error::PipelineError,
    reporter::ErrorReporter,
};
use crate::{
    config::AppConfig,
    models::{
        ChainTrace, InternalTransaction,
        serde_helpers::parse_quantity,
        units::{self, NATIVE_DECIMALS},
    },
    persistence::traits::{CacheStore, CacheStoreExt},
    providers::ChainClient,
};

/// Cache key under which the orchestrator publishes the block it is on.
pub const CURRENT_BLOCK_KEY: &str = "current-block-num";

/// Outcome of one harvesting cycle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HarvestReport {
    /// Blocks whose internal transactions were published.
    pub harvested: Vec<u64>,
    /// Blocks whose trace could not be fetched or stored.
    pub failed: Vec<u64>,
}

/// Polls the trace API over the window between the orchestrator's current
/// block and the chain head.
pub struct InternalTransactionHarvester {
    chain: Arc<dyn ChainClient>,
    cache: Arc<dyn CacheStore>,
    reporter: Arc<ErrorReporter>,
    batch_size: usize,
    interval: Duration,
    internal_ttl: Duration,
    asset_symbol: String,
    cancellation_token: CancellationToken,
}

impl InternalTransactionHarvester {
    /// Creates a harvester using the batch size, interval and TTL from `config`.
    pub fn new(
        config: &AppConfig,
        chain: Arc<dyn ChainClient>,
        cache: Arc<dyn CacheStore>,
        reporter: Arc<ErrorReporter>,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            chain,
            cache,
            reporter,
            batch_size: config.harvester.batch_size,
            interval: config.harvester.interval_ms,
            internal_ttl: config.cache_ttl.internal_secs,
            asset_symbol: config.asset_symbol.clone(),
            cancellation_token,
        }
    }

    /// Starts the long-running harvesting loop.
    pub async fn run(self) {
        tracing::info!(batch_size = self.batch_size, "Internal transaction harvester started.");
        loop {
            let delay = tokio::time::sleep(self.interval);

            tokio::select! {
                biased;

                _ = self.cancellation_token.cancelled() => {
                    tracing::info!("Harvester cancellation signal received, shutting down...");
                    break;
                }

                _ = delay => {
                    match self.harvest_once().await {
                        Ok(_) => {}
                        Err(e) if e.is_benign() => {
                            tracing::debug!(error = %e, "Harvesting cycle deferred.");
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Harvesting cycle failed.");
                            self.reporter.report(&e).await;
                        }
                    }
                }
            }
        }
        tracing::info!("Harvester has shut down.");
    }

    /// Runs one cycle: picks up to `batch_size` unharvested blocks in the
    /// window and traces them concurrently.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn harvest_once(&self) -> Result<HarvestReport, PipelineError> {
        let pending = self.pending_blocks().await?;
        if pending.is_empty() {
            return Ok(HarvestReport::default());
        }
        tracing::debug!(blocks = ?pending, "Harvesting internal transactions.");

        let results = join_all(pending.iter().map(|&n| self.harvest_block(n))).await;

        let mut report = HarvestReport::default();
        for (block_number, result) in pending.into_iter().zip(results) {
            match result {
                Ok(count) => {
                    tracing::debug!(block_number, count, "Internal transactions published.");
                    report.harvested.push(block_number);
                }
                Err(e) if e.is_benign() => {
                    tracing::debug!(block_number, error = %e, "Block not traceable yet.");
                    report.failed.push(block_number);
                }
                Err(e) => {
                    tracing::error!(block_number, error = %e, "Failed to harvest block.");
                    self.reporter.report(&e).await;
                    report.failed.push(block_number);
                }
            }
        }
        Ok(report)
    }

    /// Blocks from the published current block up to the head that have no
    /// cache entry yet, oldest first.
    async fn pending_blocks(&self) -> Result<Vec<u64>, PipelineError> {
        let current = self.cache.get(CURRENT_BLOCK_KEY).await?.and_then(|v| v.parse::<u64>().ok());
        let Some(current) = current else {
            tracing::debug!("No current block published yet.");
            return Ok(Vec::new());
        };
        let head = self.chain.block_number().await?;

        let harvested: HashSet<u64> = self
            .cache
            .keys_with_prefix(INTERNAL_KEY_PREFIX)
            .await?
            .iter()
            .filter_map(|key| key.strip_prefix(INTERNAL_KEY_PREFIX)?.parse().ok())
            .collect();

        Ok((current..=head).filter(|n| !harvested.contains(n)).take(self.batch_size).collect())
    }

    async fn harvest_block(&self, block_number: u64) -> Result<usize, PipelineError> {
        let traces = self.chain.trace_block(block_number).await?;
        let now = chrono::Utc::now().timestamp_millis();
        let internals: Vec<InternalTransaction> = traces
            .iter()
            .filter_map(|trace| parse_trace(trace, block_number, &self.asset_symbol, now))
            .filter(|internal| !internal.value.is_zero())
            .collect();

        self.cache
            .set_json(&internal_key(block_number), &internals, Some(self.internal_ttl))
            .await?;
        Ok(internals.len())
    }
}

/// Converts a trace entry into an internal transaction. Entries without gas
/// usage, a gas allowance or an owning transaction are unusable.
pub fn parse_trace(
    trace: &ChainTrace,
    block_number: u64,
    asset: &str,
    time: i64,
) -> Option<InternalTransaction> {
    let result = trace.result.as_ref()?;
    let gas = quantity_u64(result.gas_used.as_deref()?)?;
    let gas_price = quantity_u64(trace.action.gas.as_deref()?)?;
    let transaction_hash = trace.transaction_hash.clone()?;
    let value = trace.action.value.as_deref().and_then(parse_quantity).unwrap_or(U256::ZERO);

    Some(InternalTransaction {
        index: trace.transaction_position.unwrap_or_default(),
        block_number: trace.block_number.unwrap_or(block_number),
        from: trace.action.from.as_deref().unwrap_or_default().to_lowercase(),
        to: trace.action.to.as_deref().unwrap_or_default().to_lowercase(),
        gas,
        gas_price,
        total_gas: units::total_gas(gas, U256::from(gas_price)),
        input: trace.action.input.clone().unwrap_or_default(),
        output: result.output.clone().unwrap_or_default(),
        value,
        parsed_value: units::parse_value(value, NATIVE_DECIMALS),
        transaction_hash,
        asset: asset.to_string(),
        function_name: None,
        time,
    })
}

fn quantity_u64(text: &str) -> Option<u64> {
    if text.trim().is_empty() {
        return None;
    }
    u64::try_from(parse_quantity(text)?).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        engine::reporter::MockFaultSink,
        persistence::{SqliteStore, sqlite::setup_test_db},
        providers::DataSourceError,
        test_helpers::{FakeChainClient, TraceBuilder},
    };

    fn ether(n: u64) -> U256 {
        U256::from(n) * U256::from(10u64).pow(U256::from(18u64))
    }

    struct Harness {
        chain: Arc<FakeChainClient>,
        store: Arc<SqliteStore>,
        harvester: InternalTransactionHarvester,
    }

    async fn harness(sink: MockFaultSink) -> Harness {
        let config = AppConfig::default();
        let chain = Arc::new(FakeChainClient::new());
        let store = Arc::new(setup_test_db().await);
        let reporter = Arc::new(ErrorReporter::new(
            store.clone(),
            Arc::new(sink),
            Duration::from_secs(60),
        ));
        let harvester = InternalTransactionHarvester::new(
            &config,
            chain.clone(),
            store.clone(),
            reporter,
            CancellationToken::new(),
        );
        Harness { chain, store, harvester }
    }

    async fn cached(store: &SqliteStore, block_number: u64) -> Option<Vec<InternalTransaction>> {
        store.get_json(&internal_key(block_number)).await.unwrap()
    }

    #[test]
    fn test_parse_trace() {
        let trace = TraceBuilder::new("0xaaa")
            .block_number(9)
            .from("0xABC")
            .to("0xDEF")
            .value(ether(5))
            .build();

        let internal = parse_trace(&trace, 9, "ONE", 42).unwrap();

        assert_eq!(internal.transaction_hash, "0xaaa");
        assert_eq!(internal.from, "0xabc");
        assert_eq!(internal.to, "0xdef");
        assert_eq!(internal.gas, 21_000);
        assert_eq!(internal.gas_price, 30_000);
        assert_eq!(internal.value, ether(5));
        assert_eq!(internal.parsed_value, "5");
        assert_eq!(internal.asset, "ONE");
        assert_eq!(internal.time, 42);
        assert_eq!(internal.function_name, None);
    }

    #[test]
    fn test_unusable_traces_are_skipped() {
        let reverted = TraceBuilder::new("0xaaa").without_result().build();
        assert!(parse_trace(&reverted, 9, "ONE", 0).is_none());

        let mut no_gas = TraceBuilder::new("0xaaa").build();
        no_gas.action.gas = None;
        assert!(parse_trace(&no_gas, 9, "ONE", 0).is_none());

        let mut no_hash = TraceBuilder::new("0xaaa").build();
        no_hash.transaction_hash = None;
        assert!(parse_trace(&no_hash, 9, "ONE", 0).is_none());
    }

    #[tokio::test]
    async fn test_nothing_to_do_before_current_block_is_published() {
        let h = harness(MockFaultSink::new()).await;
        h.chain.set_head(100);

        let report = h.harvester.harvest_once().await.unwrap();

        assert_eq!(report, HarvestReport::default());
        assert!(h.chain.trace_requests().is_empty());
    }

    #[tokio::test]
    async fn test_harvests_window_in_batches_and_skips_done_blocks() {
        let h = harness(MockFaultSink::new()).await;
        h.chain.set_head(120);
        h.store.set(CURRENT_BLOCK_KEY, "100", None).await.unwrap();
        h.store.set_json(&internal_key(101), &Vec::<InternalTransaction>::new(), None).await.unwrap();
        h.chain.set_traces(
            100,
            vec![
                TraceBuilder::new("0xaaa").value(ether(2)).build(),
                TraceBuilder::new("0xbbb").build(),
            ],
        );

        let report = h.harvester.harvest_once().await.unwrap();

        let expected: Vec<u64> = [100].into_iter().chain(102..=110).collect();
        assert_eq!(report.harvested, expected);
        assert!(report.failed.is_empty());

        let internals = cached(&h.store, 100).await.unwrap();
        assert_eq!(internals.len(), 1);
        assert_eq!(internals[0].transaction_hash, "0xaaa");
        assert_eq!(cached(&h.store, 102).await, Some(Vec::new()));
        assert_eq!(cached(&h.store, 111).await, None);

        let next = h.harvester.harvest_once().await.unwrap();
        assert_eq!(next.harvested, (111..=120).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_failed_block_does_not_abort_siblings() {
        let mut sink = MockFaultSink::new();
        sink.expect_report().times(1).return_const(());
        let h = harness(sink).await;
        h.chain.set_head(102);
        h.store.set(CURRENT_BLOCK_KEY, "100", None).await.unwrap();
        h.chain.fail_traces(101, DataSourceError::Transport("connection reset".into()));

        let report = h.harvester.harvest_once().await.unwrap();

        assert_eq!(report.harvested, vec![100, 102]);
        assert_eq!(report.failed, vec![101]);
        assert_eq!(cached(&h.store, 101).await, None);
        assert!(cached(&h.store, 102).await.is_some());
    }

    #[tokio::test]
    async fn test_untraceable_block_is_not_reported() {
        let mut sink = MockFaultSink::new();
        sink.expect_report().times(0);
        let h = harness(sink).await;
        h.chain.set_head(102);
        h.store.set(CURRENT_BLOCK_KEY, "100", None).await.unwrap();
        h.chain.fail_traces(101, DataSourceError::BlockNotFound(101));
        h.chain.fail_traces(102, DataSourceError::BlockNotFound(102));

        let report = h.harvester.harvest_once().await.unwrap();

        assert_eq!(report.harvested, vec![100]);
        assert_eq!(report.failed, vec![101, 102]);
        assert_eq!(cached(&h.store, 101).await, None);
    }

    #[tokio::test]
    async fn test_run_stops_on_cancellation() {
        let h = harness(MockFaultSink::new()).await;
        let token = h.harvester.cancellation_token.clone();
        token.cancel();

        tokio::time::timeout(Duration::from_secs(1), h.harvester.run()).await.unwrap();
    }
}
