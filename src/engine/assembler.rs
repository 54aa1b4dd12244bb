//! The TransactionAssembler merges a block's top-level transactions, event
//! logs and harvested internal transactions into one `TransactionSet`.

use std::{
    collections::{BTreeSet, HashMap},
    str::FromStr,
    sync::Arc,
};

use alloy::primitives::U256;
use serde_json::Value;

use super::error::PipelineError;
use crate::{
    abi::LogDecoder,
    codec::{AddressCodec, topic_to_address},
    contract::ContractMetadataResolver,
    models::{
        ChainBlock, ChainTransaction, Contract, EventLog, INTERNAL_FUNCTION_NAME,
        InternalTransaction, Log, LogSummary, Transaction, TransactionSet,
        units::{self, NATIVE_DECIMALS, RAY_DECIMALS, WAD_DECIMALS},
    },
    persistence::{
        error::PersistenceError,
        traits::{CacheStore, CacheStoreExt},
    },
    providers::{ChainClient, DataSourceError},
    signature::SignatureResolver,
};

/// Cache key prefix under which harvested internal transactions are stored.
pub const INTERNAL_KEY_PREFIX: &str = "internal-";

/// Cache key of the internal transactions harvested for `block_number`.
pub fn internal_key(block_number: u64) -> String {
    format!("{INTERNAL_KEY_PREFIX}{block_number}")
}

/// What the harvester has published for a block.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedInternals {
    /// The block was traced. The list may be empty.
    Harvested(Vec<InternalTransaction>),
    /// The harvester has not reached this block yet.
    NotYetHarvested,
}

/// Per-call assembly state. Discarded once the set is returned.
struct Assembly {
    set: TransactionSet,
    /// Alternate hash to canonical hash.
    eth_to_hash: HashMap<String, String>,
    block_timestamp: u64,
}

impl Assembly {
    /// The canonical hash of the transaction owning `hash`, which may be
    /// either encoding.
    fn owner_of(&self, hash: &str) -> Option<String> {
        if self.set.contains(hash) {
            return Some(hash.to_string());
        }
        self.eth_to_hash.get(hash).filter(|canonical| self.set.contains(canonical)).cloned()
    }
}

/// Builds the reconciled transaction set of a block.
pub struct TransactionAssembler {
    chain: Arc<dyn ChainClient>,
    cache: Arc<dyn CacheStore>,
    codec: AddressCodec,
    signatures: Arc<SignatureResolver>,
    contracts: Arc<ContractMetadataResolver>,
    decoder: LogDecoder,
    asset_symbol: String,
}

impl TransactionAssembler {
    /// Creates a new assembler. Logs are decoded with contract ABIs from the
    /// resolver's ABI source.
    pub fn new(
        chain: Arc<dyn ChainClient>,
        cache: Arc<dyn CacheStore>,
        codec: AddressCodec,
        signatures: Arc<SignatureResolver>,
        contracts: Arc<ContractMetadataResolver>,
        asset_symbol: impl Into<String>,
    ) -> Self {
        let decoder = LogDecoder::new(contracts.abi_source());
        Self {
            chain,
            cache,
            codec,
            signatures,
            contracts,
            decoder,
            asset_symbol: asset_symbol.into(),
        }
    }

    /// Assembles the transaction set of `block_number`.
    ///
    /// The block, its logs and its harvested internal transactions are
    /// fetched concurrently. Enrichment then runs sequentially, since later
    /// internal transactions depend on what earlier ones inserted.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn assemble(&self, block_number: u64) -> Result<TransactionSet, PipelineError> {
        let (block, logs, internals) = tokio::join!(
            self.chain.block_with_transactions(block_number),
            self.chain.logs(block_number),
            self.cached_internals(block_number),
        );
        let (block, logs) = validate(block, logs)?;
        let internals = internals?;

        let mut assembly = Assembly {
            set: TransactionSet::new(block_number),
            eth_to_hash: HashMap::new(),
            block_timestamp: block.timestamp,
        };

        let ChainBlock { hash: block_hash, transactions, .. } = block;
        for tx in transactions {
            self.add_external(&mut assembly, tx, block_number, block_hash.as_deref()).await;
        }
        for log in logs {
            self.add_log(&mut assembly, log).await;
        }
        match internals {
            CachedInternals::Harvested(internals) => {
                for internal in internals {
                    self.add_internal(&mut assembly, internal).await;
                }
            }
            CachedInternals::NotYetHarvested => {
                tracing::debug!(
                    block_number,
                    "Internal transactions not harvested yet, assembling without them."
                );
            }
        }

        tracing::debug!(block_number, tx_count = assembly.set.len(), "Block assembled.");
        Ok(assembly.set)
    }

    /// Reads what the harvester published for `block_number`.
    pub async fn cached_internals(
        &self,
        block_number: u64,
    ) -> Result<CachedInternals, PersistenceError> {
        let internals = self.cache.get_json(&internal_key(block_number)).await?;
        Ok(internals.map_or(CachedInternals::NotYetHarvested, CachedInternals::Harvested))
    }

    fn canonical(&self, address: &str) -> String {
        self.codec.to_hex(address).unwrap_or_else(|e| {
            tracing::warn!(address, error = %e, "Keeping address as reported.");
            address.trim().to_lowercase()
        })
    }

    async fn add_external(
        &self,
        assembly: &mut Assembly,
        tx: ChainTransaction,
        block_number: u64,
        block_hash: Option<&str>,
    ) {
        let from = tx.from.as_deref().filter(|a| !a.is_empty());
        let to = tx.to.as_deref().filter(|a| !a.is_empty());
        let (Some(from), Some(to)) = (from, to) else {
            tracing::debug!(hash = tx.hash, "Skipping transaction without sender or recipient.");
            return;
        };
        let from = self.canonical(from);
        let to = self.canonical(to);

        if let Some(eth_hash) = &tx.eth_hash {
            assembly.eth_to_hash.insert(eth_hash.clone(), tx.hash.clone());
        }

        let function_name = self.signatures.resolve(tx.input.as_deref()).await;

        assembly.set.insert(Transaction {
            hash: tx.hash,
            eth_hash: tx.eth_hash,
            parsed_value: units::parse_value(tx.value, NATIVE_DECIMALS),
            value: tx.value,
            total_gas: units::total_gas(tx.gas, tx.gas_price),
            gas: tx.gas,
            gas_price: tx.gas_price,
            function_name,
            block_number,
            block_hash: block_hash.map(str::to_string),
            timestamp: tx.timestamp.unwrap_or(assembly.block_timestamp),
            asset: self.asset_symbol.clone(),
            sort_field: now_millis(),
            input: tx.input,
            nonce: tx.nonce,
            transaction_index: tx.transaction_index.unwrap_or_default(),
            logs: Vec::new(),
            internals: Vec::new(),
            addresses: BTreeSet::from([to.clone(), from.clone()]),
            from,
            to,
        });
    }

    async fn add_log(&self, assembly: &mut Assembly, mut log: Log) {
        let Some(owner) = assembly.owner_of(&log.transaction_hash) else {
            tracing::trace!(hash = log.transaction_hash, "Skipping log without owning transaction.");
            return;
        };
        let Some(event_log) = self.decoder.decode(&log).await else {
            return;
        };

        let address = log.address.to_lowercase();
        let contract = self.contracts.resolve(&address).await;
        let summary = summarize(&event_log, contract.as_ref(), &address, &self.asset_symbol);
        let topic_addresses: Vec<String> =
            log.topics.iter().skip(1).filter_map(|topic| topic_to_address(topic)).collect();

        log.event_log = Some(event_log);
        log.contract = contract;
        log.summary = Some(summary);

        if let Some(tx) = assembly.set.get_mut(&owner) {
            tx.logs.push(log);
            tx.merge_addresses(topic_addresses);
        }
    }

    async fn add_internal(&self, assembly: &mut Assembly, mut internal: InternalTransaction) {
        let mapped = assembly.eth_to_hash.get(&internal.transaction_hash).cloned();

        let restated = mapped
            .as_deref()
            .and_then(|hash| assembly.set.get(hash))
            .is_some_and(|tx| tx.restates(&internal));
        if restated {
            tracing::debug!(
                hash = internal.transaction_hash,
                "Dropping internal transaction that restates its top-level transfer."
            );
            return;
        }

        let function_name = self.signatures.resolve(Some(&internal.input)).await;
        internal.function_name =
            Some(function_name.unwrap_or_else(|| INTERNAL_FUNCTION_NAME.to_string()));

        let owner = mapped
            .filter(|hash| assembly.set.contains(hash))
            .or_else(|| assembly.owner_of(&internal.transaction_hash));

        let owner = match owner {
            Some(hash) => assembly.set.get_mut(&hash),
            None => None,
        };
        match owner {
            Some(tx) => {
                tx.merge_addresses([internal.from.clone(), internal.to.clone()]);
                tx.internals.push(internal);
            }
            None => {
                let synthesized =
                    Transaction::from_internal(&internal, assembly.block_timestamp, now_millis());
                assembly.set.insert(synthesized);
            }
        }
    }
}

/// Fails the assembly if the chain gave no data for either fetch, then on
/// the block's error, then on the logs' error.
fn validate(
    block: Result<ChainBlock, DataSourceError>,
    logs: Result<Vec<Log>, DataSourceError>,
) -> Result<(ChainBlock, Vec<Log>), PipelineError> {
    let missing = [block.as_ref().err(), logs.as_ref().err()]
        .into_iter()
        .flatten()
        .find(|e| matches!(e, DataSourceError::Transport(_) | DataSourceError::EmptyResponse(_)));
    if let Some(error) = missing {
        return Err(error.clone().into());
    }

    let block = block?;
    let logs = logs.map_err(PipelineError::from_logs_fetch)?;
    Ok((block, logs))
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Digests a decoded event into amount, asset and direction.
pub fn summarize(
    event_log: &EventLog,
    contract: Option<&Contract>,
    log_address: &str,
    native_asset: &str,
) -> LogSummary {
    let asset = contract
        .map(|c| c.symbol.as_str())
        .filter(|symbol| !symbol.is_empty())
        .unwrap_or(native_asset)
        .to_string();

    let mut from = direction(event_log, &["from", "owner"]);
    let mut to = direction(event_log, &["to", "spender"]);
    // Without this both ends would be the depositor, like a self-send.
    match event_log.event.as_str() {
        "Withdrawal" => to = Some(Value::String(log_address.to_string())),
        "Deposit" => from = Some(Value::String(log_address.to_string())),
        _ => {}
    }

    LogSummary {
        event: event_log.event.clone(),
        value: summary_value(event_log, contract),
        asset,
        from,
        to,
    }
}

fn summary_value(event_log: &EventLog, contract: Option<&Contract>) -> String {
    if let Some(wad) = uint_param(event_log, "wad") {
        return units::parse_value(wad, WAD_DECIMALS);
    }
    if let Some(ray) = uint_param(event_log, "ray") {
        return units::parse_value(ray, RAY_DECIMALS);
    }
    match (contract, uint_param(event_log, "value")) {
        (Some(contract), Some(value)) => units::parse_value(value, contract.decimals),
        _ => "0".to_string(),
    }
}

fn uint_param(event_log: &EventLog, name: &str) -> Option<U256> {
    let raw = event_log.param(name)?.as_str()?;
    U256::from_str(raw).ok()
}

fn direction(event_log: &EventLog, keys: &[&str]) -> Option<Value> {
    keys.iter()
        .find_map(|key| event_log.param(key))
        .or_else(|| event_log.params.first().map(|p| &p.value))
        .cloned()
}
