//! The per-block reconciliation result.

use std::collections::{BTreeMap, btree_map};

use serde::Serialize;

use super::transaction::Transaction;

/// Transactions of one block keyed by canonical hash.
#[derive(Debug, Clone, Serialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSet {
    block_number: u64,
    transactions: BTreeMap<String, Transaction>,
}

impl TransactionSet {
    /// Creates an empty set for a block.
    pub fn new(block_number: u64) -> Self {
        Self { block_number, transactions: BTreeMap::new() }
    }

    /// The block this set was assembled from.
    pub fn block_number(&self) -> u64 {
        self.block_number
    }

    /// Number of transactions.
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    /// Whether the set holds no transactions.
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Whether a transaction is keyed by `hash`.
    pub fn contains(&self, hash: &str) -> bool {
        self.transactions.contains_key(hash)
    }

    /// The transaction keyed by `hash`.
    pub fn get(&self, hash: &str) -> Option<&Transaction> {
        self.transactions.get(hash)
    }

    /// Mutable access to the transaction keyed by `hash`.
    pub fn get_mut(&mut self, hash: &str) -> Option<&mut Transaction> {
        self.transactions.get_mut(hash)
    }

    /// Inserts a transaction under its own hash, replacing any previous entry.
    pub fn insert(&mut self, transaction: Transaction) -> Option<Transaction> {
        self.transactions.insert(transaction.hash.clone(), transaction)
    }

    /// Transactions ordered by hash.
    pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.values()
    }
}

impl IntoIterator for TransactionSet {
    type Item = Transaction;
    type IntoIter = btree_map::IntoValues<String, Transaction>;

    fn into_iter(self) -> Self::IntoIter {
        self.transactions.into_values()
    }
}
