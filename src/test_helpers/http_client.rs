use std::{sync::Arc, time::Duration};

use reqwest_middleware::ClientWithMiddleware;

use crate::{
    config::{HttpRetryConfig, JitterSetting},
    http_client::create_retryable_http_client,
};

/// A directory lookup client that retries once with millisecond delays, so
/// tests against failing mock servers stay fast.
pub fn lookup_test_client() -> Arc<ClientWithMiddleware> {
    let config = HttpRetryConfig {
        max_retries: 1,
        initial_backoff_ms: Duration::from_millis(1),
        max_backoff_secs: Duration::from_millis(2),
        jitter: JitterSetting::None,
        ..HttpRetryConfig::default()
    };
    Arc::new(create_retryable_http_client(&config, reqwest::Client::new()))
}
