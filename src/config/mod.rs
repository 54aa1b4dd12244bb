//! Layered configuration: `configs/app.yaml` overridden by `BLOCKASSIST__`
//! environment variables.

mod app_config;
mod cache_ttl;
mod helpers;
mod retry;

pub use app_config::{AppConfig, HarvesterConfig};
pub use cache_ttl::{CacheTtlConfig, TtlRange};
pub use helpers::{
    deserialize_duration_from_ms, deserialize_duration_from_seconds, deserialize_urls,
};
pub use retry::{HttpRetryConfig, JitterSetting, RpcRetryConfig};
