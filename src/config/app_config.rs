use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use url::Url;

use super::{
    CacheTtlConfig, HttpRetryConfig, RpcRetryConfig, deserialize_duration_from_ms,
    deserialize_duration_from_seconds, deserialize_urls,
};

fn default_environment() -> String {
    "development".to_string()
}

fn default_asset_symbol() -> String {
    "ONE".to_string()
}

fn default_address_hrp() -> String {
    "one".to_string()
}

fn default_signature_directory_url() -> String {
    "https://www.4byte.directory".to_string()
}

fn default_contract_code_url() -> String {
    "https://ctrver.t.hmny.io".to_string()
}

fn default_readiness_margin() -> u64 {
    12
}

fn default_wait_delay() -> Duration {
    Duration::from_millis(2_000)
}

fn default_polling_interval() -> Duration {
    Duration::from_millis(250)
}

fn default_error_report_window() -> Duration {
    Duration::from_secs(60)
}

/// Provides the default value for shutdown_timeout.
fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_batch_size() -> usize {
    10
}

fn default_harvester_interval() -> Duration {
    Duration::from_millis(1_000)
}

/// Settings for the internal transaction harvester loop.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct HarvesterConfig {
    /// Maximum number of blocks traced per cycle.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause between harvester cycles.
    #[serde(
        default = "default_harvester_interval",
        deserialize_with = "deserialize_duration_from_ms"
    )]
    pub interval_ms: Duration,
}

impl Default for HarvesterConfig {
    fn default() -> Self {
        Self { batch_size: default_batch_size(), interval_ms: default_harvester_interval() }
    }
}

/// Application configuration for blockassist.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// Database URL for the SQLite database backing both stores.
    pub database_url: String,

    /// Environment name, scopes the document collections.
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Chain RPC URLs, tried in order.
    #[serde(deserialize_with = "deserialize_urls")]
    pub rpc_urls: Vec<Url>,

    /// Trace API URLs. Falls back to `rpc_urls` when empty.
    #[serde(default, deserialize_with = "deserialize_urls")]
    pub trace_rpc_urls: Vec<Url>,

    /// Symbol of the chain's native asset.
    #[serde(default = "default_asset_symbol")]
    pub asset_symbol: String,

    /// Human readable prefix of native bech32 addresses.
    #[serde(default = "default_address_hrp")]
    pub address_hrp: String,

    /// Base URL of the function signature directory.
    #[serde(default = "default_signature_directory_url")]
    pub signature_directory_url: String,

    /// Base URL of the contract code explorer.
    #[serde(default = "default_contract_code_url")]
    pub contract_code_url: String,

    /// Retry policy for the chain RPC transport.
    #[serde(default)]
    pub rpc_retry_config: RpcRetryConfig,

    /// Retry policy for the HTTP directories.
    #[serde(default)]
    pub http_retry_config: HttpRetryConfig,

    /// Minimum distance from the chain head before a block is processed.
    #[serde(default = "default_readiness_margin")]
    pub readiness_margin: u64,

    /// Delay applied when the candidate block is too close to the head.
    #[serde(default = "default_wait_delay", deserialize_with = "deserialize_duration_from_ms")]
    pub wait_delay_ms: Duration,

    /// Pause between orchestrator cycles.
    #[serde(
        default = "default_polling_interval",
        deserialize_with = "deserialize_duration_from_ms"
    )]
    pub polling_interval_ms: Duration,

    /// Internal transaction harvester settings.
    #[serde(default)]
    pub harvester: HarvesterConfig,

    /// Cache expiry policy.
    #[serde(default)]
    pub cache_ttl: CacheTtlConfig,

    /// Window during which a repeated error is reported only once.
    #[serde(
        default = "default_error_report_window",
        deserialize_with = "deserialize_duration_from_seconds"
    )]
    pub error_report_window_secs: Duration,

    /// The maximum time in seconds to wait for graceful shutdown.
    #[serde(
        default = "default_shutdown_timeout",
        deserialize_with = "deserialize_duration_from_seconds"
    )]
    pub shutdown_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            environment: default_environment(),
            rpc_urls: Vec::new(),
            trace_rpc_urls: Vec::new(),
            asset_symbol: default_asset_symbol(),
            address_hrp: default_address_hrp(),
            signature_directory_url: default_signature_directory_url(),
            contract_code_url: default_contract_code_url(),
            rpc_retry_config: RpcRetryConfig::default(),
            http_retry_config: HttpRetryConfig::default(),
            readiness_margin: default_readiness_margin(),
            wait_delay_ms: default_wait_delay(),
            polling_interval_ms: default_polling_interval(),
            harvester: HarvesterConfig::default(),
            cache_ttl: CacheTtlConfig::default(),
            error_report_window_secs: default_error_report_window(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

impl AppConfig {
    /// Creates a new `AppConfig` by reading from the configuration directory.
    pub fn new(config_dir: Option<&str>) -> Result<Self, ConfigError> {
        let config_dir_str = config_dir.unwrap_or("configs");
        let s = Config::builder()
            .add_source(File::with_name(&format!("{}/app.yaml", config_dir_str)))
            .add_source(Environment::with_prefix("BLOCKASSIST").separator("__"))
            .build()?;
        let mut config: Self = s.try_deserialize()?;

        if config.rpc_urls.is_empty() {
            return Err(ConfigError::Message("rpc_urls must not be empty".into()));
        }
        if config.trace_rpc_urls.is_empty() {
            config.trace_rpc_urls = config.rpc_urls.clone();
        }

        Ok(config)
    }

    /// Creates a new `AppConfigBuilder` for testing purposes.
    #[cfg(test)]
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }
}

/// A builder for creating `AppConfig` instances for testing.
#[cfg(test)]
#[derive(Default)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

#[cfg(test)]
impl AppConfigBuilder {
    pub fn rpc_urls(mut self, rpc_urls: Vec<Url>) -> Self {
        self.config.rpc_urls = rpc_urls;
        self
    }

    pub fn environment(mut self, environment: &str) -> Self {
        self.config.environment = environment.to_string();
        self
    }

    pub fn database_url(mut self, url: &str) -> Self {
        self.config.database_url = url.to_string();
        self
    }

    pub fn readiness_margin(mut self, margin: u64) -> Self {
        self.config.readiness_margin = margin;
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_app_yaml(content: &str) -> tempfile::TempDir {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(temp_dir.path().join("app.yaml"), content).unwrap();
        temp_dir
    }

    #[test]
    fn test_app_config_builder() {
        let config = AppConfig::builder()
            .rpc_urls(vec![Url::parse("http://localhost:9500").unwrap()])
            .environment("staging")
            .database_url("sqlite::memory:")
            .readiness_margin(3)
            .build();

        assert_eq!(config.rpc_urls.len(), 1);
        assert_eq!(config.environment, "staging");
        assert_eq!(config.readiness_margin, 3);
        assert_eq!(config.asset_symbol, "ONE");
    }

    #[test]
    fn test_app_config_from_file_applies_defaults() {
        let temp_dir = write_app_yaml(
            r#"
        database_url: "sqlite::memory:"
        rpc_urls:
          - "http://localhost:9500"
        "#,
        );

        let config = AppConfig::new(Some(temp_dir.path().to_str().unwrap())).unwrap();

        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.environment, "development");
        assert_eq!(config.address_hrp, "one");
        assert_eq!(config.readiness_margin, 12);
        assert_eq!(config.wait_delay_ms, Duration::from_secs(2));
        assert_eq!(config.polling_interval_ms, Duration::from_millis(250));
        assert_eq!(config.harvester, HarvesterConfig::default());
        assert_eq!(config.error_report_window_secs, Duration::from_secs(60));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(30));
        assert_eq!(config.signature_directory_url, "https://www.4byte.directory");
    }

    #[test]
    fn test_trace_urls_fall_back_to_rpc_urls() {
        let temp_dir = write_app_yaml(
            r#"
        database_url: "sqlite::memory:"
        rpc_urls:
          - "http://localhost:9500"
        "#,
        );

        let config = AppConfig::new(Some(temp_dir.path().to_str().unwrap())).unwrap();

        assert_eq!(config.trace_rpc_urls, config.rpc_urls);
    }

    #[test]
    fn test_app_config_from_file_with_overrides() {
        let temp_dir = write_app_yaml(
            r#"
        database_url: "sqlite:blockassist.db"
        environment: "production"
        rpc_urls:
          - "https://api.s0.t.hmny.io"
        trace_rpc_urls:
          - "https://trace.example.org"
        readiness_margin: 4
        harvester:
          batch_size: 25
          interval_ms: 500
        cache_ttl:
          internal_secs: 60
        "#,
        );

        let config = AppConfig::new(Some(temp_dir.path().to_str().unwrap())).unwrap();

        assert_eq!(config.environment, "production");
        assert_eq!(config.trace_rpc_urls[0].host_str(), Some("trace.example.org"));
        assert_eq!(config.readiness_margin, 4);
        assert_eq!(config.harvester.batch_size, 25);
        assert_eq!(config.harvester.interval_ms, Duration::from_millis(500));
        assert_eq!(config.cache_ttl.internal_secs, Duration::from_secs(60));
    }

    #[test]
    fn test_shipped_config_parses() {
        let config = AppConfig::new(Some(concat!(env!("CARGO_MANIFEST_DIR"), "/configs"))).unwrap();

        assert_eq!(config.harvester, HarvesterConfig::default());
        assert_eq!(config.cache_ttl, CacheTtlConfig::default());
        assert_eq!(config.http_retry_config, HttpRetryConfig::default());
        assert_eq!(config.readiness_margin, 12);
    }

    #[test]
    fn test_app_config_rejects_missing_rpc_urls() {
        let temp_dir = write_app_yaml(
            r#"
        database_url: "sqlite::memory:"
        rpc_urls: []
        "#,
        );

        assert!(AppConfig::new(Some(temp_dir.path().to_str().unwrap())).is_err());
    }

    #[test]
    fn test_app_config_from_file_with_env_var_override() {
        let temp_dir = write_app_yaml(
            r#"
        database_url: "sqlite::memory:"
        rpc_urls:
          - "http://localhost:9500"
        asset_symbol: "ONE"
        "#,
        );

        unsafe {
            std::env::set_var("BLOCKASSIST__ASSET_SYMBOL", "WONE");
        }

        let config = AppConfig::new(Some(temp_dir.path().to_str().unwrap())).unwrap();

        unsafe {
            std::env::remove_var("BLOCKASSIST__ASSET_SYMBOL");
        }

        assert_eq!(config.asset_symbol, "WONE");
    }
}
