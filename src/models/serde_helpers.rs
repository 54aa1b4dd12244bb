//! Deserializers for the loosely typed quantities returned by the chain RPC.
//!
//! Depending on the API version a quantity arrives as a `0x` prefixed hex
//! string, a decimal string or a plain JSON number.

use alloy::primitives::U256;
use serde::{Deserialize, Deserializer, de};

#[derive(Deserialize)]
#[serde(untagged)]
enum Quantity {
    Number(u64),
    Text(String),
}

fn parse_u256<E: de::Error>(text: &str) -> Result<U256, E> {
    let text = text.trim();
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some("") => Ok(U256::ZERO),
        Some(hex) => U256::from_str_radix(hex, 16),
        None if text.is_empty() => Ok(U256::ZERO),
        None => U256::from_str_radix(text, 10),
    };
    parsed.map_err(|e| E::custom(format!("invalid quantity {text:?}: {e}")))
}

/// Parses a quantity held in a plain string.
pub fn parse_quantity(text: &str) -> Option<U256> {
    parse_u256::<de::value::Error>(text).ok()
}

/// Deserializes a `U256` quantity.
pub fn u256_quantity<'de, D>(deserializer: D) -> Result<U256, D::Error>
where
    D: Deserializer<'de>,
{
    match Quantity::deserialize(deserializer)? {
        Quantity::Number(n) => Ok(U256::from(n)),
        Quantity::Text(text) => parse_u256(&text),
    }
}

/// Deserializes a `u64` quantity.
pub fn u64_quantity<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match Quantity::deserialize(deserializer)? {
        Quantity::Number(n) => Ok(n),
        Quantity::Text(text) => {
            let value = parse_u256::<D::Error>(&text)?;
            u64::try_from(value).map_err(|_| de::Error::custom("quantity overflows u64"))
        }
    }
}

/// Deserializes an optional `u64` quantity. `null` maps to `None`.
pub fn opt_u64_quantity<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Wrapper(#[serde(deserialize_with = "u64_quantity")] u64);

    Ok(Option::<Wrapper>::deserialize(deserializer)?.map(|Wrapper(n)| n))
}
