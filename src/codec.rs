//! Conversion between the chain's native bech32 address text and canonical
//! lowercase hex.

use std::str::FromStr;

use alloy::{
    hex,
    primitives::{Address, B256},
};
use bech32::{Bech32, Hrp};
use thiserror::Error;

/// Errors raised while converting addresses.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    /// The address text is empty.
    #[error("empty address")]
    Empty,

    /// The configured human readable prefix is not valid bech32.
    #[error("invalid address prefix {0:?}: {1}")]
    InvalidPrefix(String, String),

    /// A `0x` address that is not 20 bytes of hex.
    #[error("invalid hex address {0:?}")]
    InvalidHex(String),

    /// Malformed bech32 text.
    #[error("invalid bech32 address {0:?}: {1}")]
    InvalidBech32(String, String),

    /// Bech32 text with another chain's prefix.
    #[error("address {address:?} does not use the {expected:?} prefix")]
    WrongPrefix {
        /// The offending address.
        address: String,
        /// The configured prefix.
        expected: String,
    },

    /// Bech32 payload that is not 20 bytes.
    #[error("address payload is {0} bytes, expected 20")]
    InvalidLength(usize),
}

/// Converts addresses between the native `one1…` encoding and hex.
#[derive(Debug, Clone)]
pub struct AddressCodec {
    hrp: Hrp,
}

impl AddressCodec {
    /// Creates a codec for the given human readable prefix, e.g. `one`.
    pub fn new(hrp: &str) -> Result<Self, AddressError> {
        let hrp = Hrp::parse(hrp)
            .map_err(|e| AddressError::InvalidPrefix(hrp.to_string(), e.to_string()))?;
        Ok(Self { hrp })
    }

    /// Returns canonical lowercase `0x` hex for a native or hex address.
    pub fn to_hex(&self, address: &str) -> Result<String, AddressError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(AddressError::Empty);
        }

        if address.starts_with("0x") || address.starts_with("0X") {
            let parsed = Address::from_str(address)
                .map_err(|_| AddressError::InvalidHex(address.to_string()))?;
            return Ok(canonical_hex(&parsed));
        }

        let (hrp, payload) = bech32::decode(address)
            .map_err(|e| AddressError::InvalidBech32(address.to_string(), e.to_string()))?;
        if hrp != self.hrp {
            return Err(AddressError::WrongPrefix {
                address: address.to_string(),
                expected: self.hrp.to_string(),
            });
        }
        if payload.len() != 20 {
            return Err(AddressError::InvalidLength(payload.len()));
        }

        Ok(canonical_hex(&Address::from_slice(&payload)))
    }

    /// Returns the native bech32 encoding of a hex address.
    pub fn to_bech32(&self, address: &str) -> Result<String, AddressError> {
        let parsed = Address::from_str(address.trim())
            .map_err(|_| AddressError::InvalidHex(address.to_string()))?;
        bech32::encode::<Bech32>(self.hrp, parsed.as_slice())
            .map_err(|e| AddressError::InvalidBech32(address.to_string(), e.to_string()))
    }
}

/// Recovers the address held in a 32-byte, left padded log topic.
pub fn topic_to_address(topic: &str) -> Option<String> {
    let word = B256::from_str(topic.trim()).ok()?;
    Some(canonical_hex(&Address::from_word(word)))
}

/// Lowercase `0x` hex of an address.
pub fn canonical_hex(address: &Address) -> String {
    hex::encode_prefixed(address.as_slice())
}
