//! Token contract metadata.

use serde::{Deserialize, Serialize};

/// Token metadata resolved from a contract's ERC-20 view functions.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Default)]
pub struct Contract {
    /// Contract address, lowercase hex.
    pub address: String,
    /// Token symbol.
    pub symbol: String,
    /// Decimal places of token amounts.
    pub decimals: u8,
    /// Token name.
    pub name: String,
}
