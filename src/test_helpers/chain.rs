//! An in-memory, scripted `ChainClient`.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use alloy::{
    dyn_abi::DynSolValue,
    primitives::{Bytes, U256},
};
use async_trait::async_trait;

use crate::{
    contract::{DECIMALS_SELECTOR, NAME_SELECTOR, SYMBOL_SELECTOR},
    models::{ChainBlock, ChainTrace, Contract, Log},
    providers::{BLOCK_NOT_FOUND_CODE, ChainClient, DataSourceError},
};

#[derive(Default)]
struct ChainState {
    head: u64,
    blocks: HashMap<u64, Result<ChainBlock, DataSourceError>>,
    logs: HashMap<u64, Result<Vec<Log>, DataSourceError>>,
    traces: HashMap<u64, Result<Vec<ChainTrace>, DataSourceError>>,
    tokens: HashMap<String, Contract>,
    trace_requests: Vec<u64>,
}

/// A `ChainClient` serving scripted data.
///
/// Blocks that were never added answer with `BlockNotFound`. Logs and traces
/// default to empty lists. Read-only calls succeed only for registered tokens.
#[derive(Default)]
pub struct FakeChainClient {
    state: Mutex<ChainState>,
}

impl FakeChainClient {
    /// An empty chain at head 0.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ChainState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Sets the chain head.
    pub fn set_head(&self, head: u64) {
        self.state().head = head;
    }

    /// Adds a block, raising the head if needed.
    pub fn add_block(&self, block: ChainBlock) {
        let mut state = self.state();
        state.head = state.head.max(block.number);
        state.blocks.insert(block.number, Ok(block));
    }

    /// Sets the logs returned for a block.
    pub fn set_logs(&self, block_number: u64, logs: Vec<Log>) {
        self.state().logs.insert(block_number, Ok(logs));
    }

    /// Sets the traces returned for a block.
    pub fn set_traces(&self, block_number: u64, traces: Vec<ChainTrace>) {
        self.state().traces.insert(block_number, Ok(traces));
    }

    /// Makes the block fetch fail with `error`.
    pub fn fail_block(&self, block_number: u64, error: DataSourceError) {
        self.state().blocks.insert(block_number, Err(error));
    }

    /// Makes the logs fetch fail with `error`.
    pub fn fail_logs(&self, block_number: u64, error: DataSourceError) {
        self.state().logs.insert(block_number, Err(error));
    }

    /// Makes the trace fetch fail with `error`.
    pub fn fail_traces(&self, block_number: u64, error: DataSourceError) {
        self.state().traces.insert(block_number, Err(error));
    }

    /// Registers a token answering the ERC-20 metadata calls.
    pub fn add_token(&self, contract: Contract) {
        self.state().tokens.insert(contract.address.to_lowercase(), contract);
    }

    /// Block numbers passed to `trace_block`, in call order.
    pub fn trace_requests(&self) -> Vec<u64> {
        self.state().trace_requests.clone()
    }
}

#[async_trait]
impl ChainClient for FakeChainClient {
    async fn block_number(&self) -> Result<u64, DataSourceError> {
        Ok(self.state().head)
    }

    async fn block_with_transactions(&self, number: u64) -> Result<ChainBlock, DataSourceError> {
        self.state()
            .blocks
            .get(&number)
            .cloned()
            .unwrap_or(Err(DataSourceError::BlockNotFound(number)))
    }

    async fn logs(&self, number: u64) -> Result<Vec<Log>, DataSourceError> {
        self.state().logs.get(&number).cloned().unwrap_or(Ok(Vec::new()))
    }

    async fn trace_block(&self, number: u64) -> Result<Vec<ChainTrace>, DataSourceError> {
        let mut state = self.state();
        state.trace_requests.push(number);
        state.traces.get(&number).cloned().unwrap_or(Ok(Vec::new()))
    }

    async fn call(&self, to: &str, data: Bytes) -> Result<Bytes, DataSourceError> {
        let reverted = || DataSourceError::Response {
            code: BLOCK_NOT_FOUND_CODE,
            message: "execution reverted".into(),
        };
        let state = self.state();
        let token = state.tokens.get(&to.to_lowercase()).ok_or_else(reverted)?;

        let value = match data.as_ref() {
            d if d == SYMBOL_SELECTOR => DynSolValue::String(token.symbol.clone()),
            d if d == DECIMALS_SELECTOR => DynSolValue::Uint(U256::from(token.decimals), 256),
            d if d == NAME_SELECTOR => DynSolValue::String(token.name.clone()),
            _ => return Err(reverted()),
        };
        Ok(value.abi_encode().into())
    }
}
