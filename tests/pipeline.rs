//! End-to-end tests of the assemble, filter and persist pipeline.

use std::{
    collections::BTreeSet,
    sync::{Arc, Mutex},
    time::Duration,
};

use alloy::primitives::U256;
use async_trait::async_trait;
use blockassist::{
    config::AppConfig,
    engine::{
        assembler::internal_key,
        orchestrator::{CycleOutcome, PollingOrchestrator},
        reporter::{ErrorReporter, FaultSink},
    },
    models::InternalTransaction,
    persistence::{
        SqliteStore,
        traits::{CacheStore, CacheStoreExt, DocumentStore},
    },
    providers::{BLOCK_NOT_FOUND_CODE, DataSourceError},
    test_helpers::{
        BlockBuilder, FakeChainClient, InternalBuilder, StaticCodeDirectory,
        StaticSignatureDirectory, TransactionBuilder, build_assembler,
    },
};
use tokio_util::sync::CancellationToken;

const BLOCK: u64 = 1_000;
const ENVIRONMENT: &str = "development";
const C: &str = "0xcccccccccccccccccccccccccccccccccccccccc";
const D: &str = "0xdddddddddddddddddddddddddddddddddddddddd";
const E: &str = "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee";
const F: &str = "0xffffffffffffffffffffffffffffffffffffffff";

fn ether(n: u64) -> U256 {
    U256::from(n) * U256::from(10u64).pow(U256::from(18u64))
}

#[derive(Default)]
struct RecordingSink {
    reports: Mutex<Vec<String>>,
}

#[async_trait]
impl FaultSink for RecordingSink {
    async fn report(&self, _signature: &str, message: &str) {
        self.reports.lock().unwrap().push(message.to_string());
    }
}

struct Pipeline {
    chain: Arc<FakeChainClient>,
    store: Arc<SqliteStore>,
    sink: Arc<RecordingSink>,
    orchestrator: PollingOrchestrator,
}

impl Pipeline {
    async fn new() -> Self {
        let store = Arc::new(
            SqliteStore::new("sqlite::memory:").await.expect("Failed to open in-memory db"),
        );
        store.run_migrations().await.expect("Failed to run migrations");
        let chain = Arc::new(FakeChainClient::new());
        let sink = Arc::new(RecordingSink::default());

        let assembler = build_assembler(
            chain.clone(),
            store.clone(),
            StaticSignatureDirectory::new(),
            StaticCodeDirectory::new(),
        );
        let reporter =
            Arc::new(ErrorReporter::new(store.clone(), sink.clone(), Duration::from_secs(60)));
        let orchestrator = PollingOrchestrator::new(
            &AppConfig::default(),
            chain.clone(),
            store.clone(),
            store.clone(),
            Arc::new(assembler),
            reporter,
            CancellationToken::new(),
        );

        store.set("last-block-num", &(BLOCK - 1).to_string(), None).await.unwrap();
        chain.set_head(BLOCK + 12);
        Self { chain, store, sink, orchestrator }
    }

    async fn subscribe(&self, address: &str) {
        self.store.add_subscribed_address(ENVIRONMENT, address).await.unwrap();
    }

    async fn harvest(&self, internals: Vec<InternalTransaction>) {
        self.store.set_json(&internal_key(BLOCK), &internals, None).await.unwrap();
    }
}

#[tokio::test]
async fn test_internal_only_transfer_is_synthesized_and_stored() {
    let p = Pipeline::new().await;
    p.subscribe("0x2").await;
    p.chain.add_block(BlockBuilder::new(BLOCK).build());
    p.chain.set_head(BLOCK + 12);
    p.harvest(vec![
        InternalBuilder::new("0xaaa")
            .block_number(BLOCK)
            .from("0x1")
            .to("0x2")
            .value(ether(5))
            .input("")
            .build(),
    ])
    .await;

    let outcome = p.orchestrator.run_cycle().await;

    assert_eq!(outcome, CycleOutcome::Processed { block_number: BLOCK, matched: 1 });
    let tx = p.store.get_transaction(ENVIRONMENT, "0xaaa").await.unwrap().unwrap();
    assert_eq!(tx.function_name.as_deref(), Some("Internal"));
    assert_eq!(tx.value, ether(5));
    assert_eq!(tx.parsed_value, "5");
    assert_eq!(tx.addresses, BTreeSet::from(["0x1".to_string(), "0x2".to_string()]));
    assert!(tx.internals.is_empty());
    assert!(tx.logs.is_empty());
}

#[tokio::test]
async fn test_internal_transfer_merges_into_its_transaction() {
    let p = Pipeline::new().await;
    p.subscribe(D).await;
    p.chain.add_block(
        BlockBuilder::new(BLOCK)
            .transaction(TransactionBuilder::new("0xext1").eth_hash("0xeth1").build())
            .build(),
    );
    p.chain.set_head(BLOCK + 12);
    p.harvest(vec![
        InternalBuilder::new("0xeth1").block_number(BLOCK).from(C).to(D).value(ether(2)).build(),
    ])
    .await;

    let outcome = p.orchestrator.run_cycle().await;

    assert_eq!(outcome, CycleOutcome::Processed { block_number: BLOCK, matched: 1 });
    let tx = p.store.get_transaction(ENVIRONMENT, "0xext1").await.unwrap().unwrap();
    assert_eq!(tx.internals.len(), 1);
    assert_eq!(tx.internals[0].value, ether(2));
    assert!(tx.addresses.contains(C));
    assert!(tx.addresses.contains(D));
    assert!(p.store.get_transaction(ENVIRONMENT, "0xeth1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_restated_internal_transfer_is_discarded() {
    let p = Pipeline::new().await;
    p.subscribe(F).await;
    p.chain.add_block(
        BlockBuilder::new(BLOCK)
            .transaction(
                TransactionBuilder::new("0xext2")
                    .eth_hash("0xeth2")
                    .from(E)
                    .to(F)
                    .value(ether(3))
                    .build(),
            )
            .build(),
    );
    p.chain.set_head(BLOCK + 12);
    p.harvest(vec![
        InternalBuilder::new("0xeth2").block_number(BLOCK).from(E).to(F).value(ether(3)).build(),
    ])
    .await;

    let outcome = p.orchestrator.run_cycle().await;

    assert_eq!(outcome, CycleOutcome::Processed { block_number: BLOCK, matched: 1 });
    let tx = p.store.get_transaction(ENVIRONMENT, "0xext2").await.unwrap().unwrap();
    assert!(tx.internals.is_empty());
    assert_eq!(tx.addresses, BTreeSet::from([E.to_string(), F.to_string()]));
}

#[tokio::test]
async fn test_unproduced_block_leaves_cursor_and_reports_nothing() {
    let p = Pipeline::new().await;
    p.chain.set_head(BLOCK + 50);
    p.chain.fail_block(BLOCK, DataSourceError::BlockNotFound(BLOCK));

    let outcome = p.orchestrator.run_cycle().await;

    assert_eq!(outcome, CycleOutcome::NotProduced(BLOCK));
    assert_eq!(p.orchestrator.last_block().await.unwrap(), Some(BLOCK - 1));
    assert!(p.sink.reports.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_repeated_chain_errors_are_reported_once() {
    let p = Pipeline::new().await;
    p.chain.add_block(BlockBuilder::new(BLOCK).build());
    p.chain.set_head(BLOCK + 12);
    p.chain.fail_logs(
        BLOCK,
        DataSourceError::Response { code: BLOCK_NOT_FOUND_CODE, message: "log query failed".into() },
    );

    assert_eq!(p.orchestrator.run_cycle().await, CycleOutcome::Failed);
    assert_eq!(p.orchestrator.run_cycle().await, CycleOutcome::Failed);

    assert_eq!(p.sink.reports.lock().unwrap().len(), 1);
    assert_eq!(p.orchestrator.last_block().await.unwrap(), Some(BLOCK - 1));
}

#[tokio::test]
async fn test_consecutive_blocks_advance_the_cursor() {
    let p = Pipeline::new().await;
    p.chain.add_block(BlockBuilder::new(BLOCK).build());
    p.chain.add_block(BlockBuilder::new(BLOCK + 1).build());
    p.chain.set_head(BLOCK + 13);

    assert_eq!(
        p.orchestrator.run_cycle().await,
        CycleOutcome::Processed { block_number: BLOCK, matched: 0 }
    );
    assert_eq!(
        p.orchestrator.run_cycle().await,
        CycleOutcome::Processed { block_number: BLOCK + 1, matched: 0 }
    );
    assert_eq!(
        p.orchestrator.run_cycle().await,
        CycleOutcome::Waiting { candidate: BLOCK + 2, head: BLOCK + 13 }
    );

    let cursor = p.store.get_cursor(ENVIRONMENT).await.unwrap().unwrap();
    assert_eq!(cursor.last_block_number, BLOCK + 1);
}
