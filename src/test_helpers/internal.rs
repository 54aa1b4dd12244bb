//! Builders for internal transactions and the trace entries they come from.

use alloy::primitives::U256;

use crate::models::{
    ChainTrace, INTERNAL_FUNCTION_NAME, InternalTransaction, TraceAction, TraceResult, units,
};

/// A builder for creating harvested `InternalTransaction` instances.
#[derive(Debug, Clone)]
pub struct InternalBuilder {
    internal: InternalTransaction,
}

impl InternalBuilder {
    /// Creates a new builder for an internal transaction owned by
    /// `transaction_hash`.
    pub fn new(transaction_hash: &str) -> Self {
        Self {
            internal: InternalTransaction {
                from: "0x3333333333333333333333333333333333333333".into(),
                to: "0x4444444444444444444444444444444444444444".into(),
                gas: 21_000,
                gas_price: 30_000,
                total_gas: units::total_gas(21_000, U256::from(30_000u64)),
                input: "0x".into(),
                output: "0x".into(),
                parsed_value: "0".into(),
                transaction_hash: transaction_hash.to_string(),
                asset: "ONE".into(),
                function_name: Some(INTERNAL_FUNCTION_NAME.into()),
                ..Default::default()
            },
        }
    }

    /// Sets the block number.
    pub fn block_number(mut self, block_number: u64) -> Self {
        self.internal.block_number = block_number;
        self
    }

    /// Sets the caller.
    pub fn from(mut self, from: &str) -> Self {
        self.internal.from = from.to_string();
        self
    }

    /// Sets the callee.
    pub fn to(mut self, to: &str) -> Self {
        self.internal.to = to.to_string();
        self
    }

    /// Sets the value and its parsed form.
    pub fn value(mut self, value: U256) -> Self {
        self.internal.value = value;
        self.internal.parsed_value = units::parse_value(value, units::NATIVE_DECIMALS);
        self
    }

    /// Sets the input.
    pub fn input(mut self, input: &str) -> Self {
        self.internal.input = input.to_string();
        self
    }

    /// Builds the `InternalTransaction`.
    pub fn build(self) -> InternalTransaction {
        self.internal
    }
}

/// A builder for creating `ChainTrace` entries.
#[derive(Debug, Clone)]
pub struct TraceBuilder {
    trace: ChainTrace,
}

impl TraceBuilder {
    /// Creates a successful call trace owned by `transaction_hash`.
    pub fn new(transaction_hash: &str) -> Self {
        Self {
            trace: ChainTrace {
                action: TraceAction {
                    from: Some("0x3333333333333333333333333333333333333333".into()),
                    to: Some("0x4444444444444444444444444444444444444444".into()),
                    gas: Some("0x7530".into()),
                    value: Some("0x0".into()),
                    input: Some("0x".into()),
                },
                result: Some(TraceResult {
                    gas_used: Some("0x5208".into()),
                    output: Some("0x".into()),
                }),
                transaction_hash: Some(transaction_hash.to_string()),
                transaction_position: Some(0),
                block_number: None,
            },
        }
    }

    /// Sets the block number.
    pub fn block_number(mut self, block_number: u64) -> Self {
        self.trace.block_number = Some(block_number);
        self
    }

    /// Sets the caller.
    pub fn from(mut self, from: &str) -> Self {
        self.trace.action.from = Some(from.to_string());
        self
    }

    /// Sets the callee.
    pub fn to(mut self, to: &str) -> Self {
        self.trace.action.to = Some(to.to_string());
        self
    }

    /// Sets the traced value, hex encoded.
    pub fn value(mut self, value: U256) -> Self {
        self.trace.action.value = Some(format!("{value:#x}"));
        self
    }

    /// Drops the call result, as for a reverted call.
    pub fn without_result(mut self) -> Self {
        self.trace.result = None;
        self
    }

    /// Builds the `ChainTrace`.
    pub fn build(self) -> ChainTrace {
        self.trace
    }
}
