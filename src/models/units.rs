//! Fixed-point amount formatting.

use alloy::primitives::{U256, utils::format_units};

/// Decimals of the chain's native asset.
pub const NATIVE_DECIMALS: u8 = 18;

/// Decimals used by `wad` denominated amounts.
pub const WAD_DECIMALS: u8 = 18;

/// Decimals used by `ray` denominated amounts.
pub const RAY_DECIMALS: u8 = 27;

/// Renders `value / 10^decimals` as a plain decimal string with no trailing
/// zeros, e.g. `5000000000000000000` at 18 decimals becomes `"5"`.
///
/// Returns `"0"` when `decimals` is out of range for a `U256`.
pub fn parse_value(value: U256, decimals: u8) -> String {
    let Ok(formatted) = format_units(value, decimals) else {
        return "0".to_string();
    };
    trim_fraction(formatted)
}

/// Total gas cost in native units: `gas * gas_price / 10^18`.
pub fn total_gas(gas: u64, gas_price: U256) -> String {
    parse_value(U256::from(gas).saturating_mul(gas_price), NATIVE_DECIMALS)
}

fn trim_fraction(formatted: String) -> String {
    if !formatted.contains('.') {
        return formatted;
    }
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() { "0".to_string() } else { trimmed.to_string() }
}
