//! Retry policies for the two kinds of outbound traffic: chain JSON-RPC and
//! the HTTP directories.

use std::time::Duration;

use serde::Deserialize;

use super::{deserialize_duration_from_ms, deserialize_duration_from_seconds};

/// Backoff policy of the chain transport, applied by alloy's retry layer to
/// rate limited and transient failures.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct RpcRetryConfig {
    /// Retries before a request is given up.
    pub max_retry: u32,
    /// First backoff delay, in milliseconds.
    pub backoff_ms: u64,
    /// Compute unit budget the node grants per second.
    pub compute_units_per_second: u64,
}

impl Default for RpcRetryConfig {
    fn default() -> Self {
        Self { max_retry: 10, backoff_ms: 1_000, compute_units_per_second: 100 }
    }
}

/// Randomization of the HTTP retry delays.
#[derive(Default, Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JitterSetting {
    /// Exact exponential delays.
    None,
    /// Delays drawn uniformly below the exponential bound.
    #[default]
    Full,
}

const HTTP_MAX_RETRIES: u32 = 3;
const HTTP_BACKOFF_BASE: u32 = 2;
const HTTP_INITIAL_BACKOFF: Duration = Duration::from_millis(250);
const HTTP_MAX_BACKOFF: Duration = Duration::from_secs(10);

fn http_max_retries() -> u32 {
    HTTP_MAX_RETRIES
}

fn http_backoff_base() -> u32 {
    HTTP_BACKOFF_BASE
}

fn http_initial_backoff() -> Duration {
    HTTP_INITIAL_BACKOFF
}

fn http_max_backoff() -> Duration {
    HTTP_MAX_BACKOFF
}

/// Exponential backoff of the signature and contract code directory
/// lookups. Only transient failures (connection errors, 5xx, 429) retry.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct HttpRetryConfig {
    /// Retries before a lookup is given up.
    #[serde(default = "http_max_retries")]
    pub max_retries: u32,

    /// Multiplier between consecutive delays.
    #[serde(default = "http_backoff_base")]
    pub base_for_backoff: u32,

    /// First retry delay.
    #[serde(default = "http_initial_backoff", deserialize_with = "deserialize_duration_from_ms")]
    pub initial_backoff_ms: Duration,

    /// Upper bound of a single delay.
    #[serde(default = "http_max_backoff", deserialize_with = "deserialize_duration_from_seconds")]
    pub max_backoff_secs: Duration,

    /// Randomization of the delays.
    #[serde(default)]
    pub jitter: JitterSetting,
}

impl Default for HttpRetryConfig {
    fn default() -> Self {
        Self {
            max_retries: HTTP_MAX_RETRIES,
            base_for_backoff: HTTP_BACKOFF_BASE,
            initial_backoff_ms: HTTP_INITIAL_BACKOFF,
            max_backoff_secs: HTTP_MAX_BACKOFF,
            jitter: JitterSetting::Full,
        }
    }
}

#[cfg(test)]
mod tests {
    use config::{Config, File, FileFormat};

    use super::*;

    fn parse<T: serde::de::DeserializeOwned>(yaml: &str) -> T {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_rpc_retry_partial_override_keeps_other_defaults() {
        let config: RpcRetryConfig = parse("max_retry: 3");

        assert_eq!(config, RpcRetryConfig { max_retry: 3, ..RpcRetryConfig::default() });
    }

    #[test]
    fn test_http_retry_defaults_from_empty_yaml() {
        let config: HttpRetryConfig = parse("");

        assert_eq!(config, HttpRetryConfig::default());
    }

    #[test]
    fn test_http_retry_units() {
        let config: HttpRetryConfig = parse(
            "
            initial_backoff_ms: 100
            max_backoff_secs: 3
            jitter: none
            ",
        );

        assert_eq!(config.initial_backoff_ms, Duration::from_millis(100));
        assert_eq!(config.max_backoff_secs, Duration::from_secs(3));
        assert_eq!(config.jitter, JitterSetting::None);
        assert_eq!(config.max_retries, 3);
    }
}
