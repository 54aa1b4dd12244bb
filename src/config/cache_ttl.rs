//! Expiry policy for every cache namespace the pipeline writes.

use std::time::Duration;

use serde::Deserialize;

use super::deserialize_duration_from_seconds;

/// An inclusive range of expiry times, in seconds.
///
/// Entries written with a range get a TTL picked somewhere inside it, so that
/// a burst of writes does not expire all at once.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct TtlRange {
    /// Lower bound, in seconds.
    pub min_secs: u64,
    /// Upper bound, in seconds.
    pub max_secs: u64,
}

impl TtlRange {
    /// Creates a new range. Bounds given in the wrong order are swapped.
    pub const fn new(min_secs: u64, max_secs: u64) -> Self {
        if min_secs <= max_secs {
            Self { min_secs, max_secs }
        } else {
            Self { min_secs: max_secs, max_secs: min_secs }
        }
    }
}

const NINE_DAYS: u64 = 777_600;
const TEN_DAYS: u64 = 864_000;
const TWENTY_NINE_MINUTES: u64 = 1_740;
const THIRTY_MINUTES: u64 = 1_800;

fn default_long_lived() -> TtlRange {
    TtlRange::new(NINE_DAYS, TEN_DAYS)
}

fn default_short_lived() -> TtlRange {
    TtlRange::new(TWENTY_NINE_MINUTES, THIRTY_MINUTES)
}

fn default_subscribed_addresses() -> Duration {
    Duration::from_secs(30)
}

fn default_internal() -> Duration {
    Duration::from_secs(7_200)
}

fn default_signature_absent() -> Duration {
    Duration::from_secs(THIRTY_MINUTES)
}

/// TTL settings for the cache store namespaces.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct CacheTtlConfig {
    /// How long the subscribed address set is served from cache.
    #[serde(
        default = "default_subscribed_addresses",
        deserialize_with = "deserialize_duration_from_seconds"
    )]
    pub subscribed_addresses_secs: Duration,

    /// How long harvested internal transactions stay available for a block.
    #[serde(
        default = "default_internal",
        deserialize_with = "deserialize_duration_from_seconds"
    )]
    pub internal_secs: Duration,

    /// Resolved function signatures.
    #[serde(default = "default_long_lived")]
    pub signature: TtlRange,

    /// Selectors the signature directory has no entry for.
    #[serde(
        default = "default_signature_absent",
        deserialize_with = "deserialize_duration_from_seconds"
    )]
    pub signature_absent_secs: Duration,

    /// Contract ABIs fetched from the contract code directory.
    #[serde(default = "default_long_lived")]
    pub abi: TtlRange,

    /// Contracts with no published ABI.
    #[serde(default = "default_short_lived")]
    pub abi_absent: TtlRange,

    /// Resolved token metadata.
    #[serde(default = "default_long_lived")]
    pub contract: TtlRange,

    /// Contracts that did not answer the token metadata calls.
    #[serde(default = "default_short_lived")]
    pub bad_contract: TtlRange,
}

impl Default for CacheTtlConfig {
    fn default() -> Self {
        Self {
            subscribed_addresses_secs: default_subscribed_addresses(),
            internal_secs: default_internal(),
            signature: default_long_lived(),
            signature_absent_secs: default_signature_absent(),
            abi: default_long_lived(),
            abi_absent: default_short_lived(),
            contract: default_long_lived(),
            bad_contract: default_short_lived(),
        }
    }
}
