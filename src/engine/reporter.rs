//! Rate-limited fault reporting.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::persistence::traits::CacheStore;

/// Number of leading message characters identifying an error.
pub const SIGNATURE_LEN: usize = 25;

const FAULT_KEY_PREFIX: &str = "fault-";

/// Destination of reported faults.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait FaultSink: Send + Sync {
    /// Records one fault.
    async fn report(&self, signature: &str, message: &str);
}

/// A [`FaultSink`] emitting structured `tracing` error events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingFaultSink;

#[async_trait]
impl FaultSink for TracingFaultSink {
    async fn report(&self, signature: &str, message: &str) {
        tracing::error!(signature, message, "Pipeline fault.");
    }
}

/// Forwards faults to a [`FaultSink`], at most once per signature per
/// window. The window is tracked in the cache store, so it holds across
/// processes sharing that store.
pub struct ErrorReporter {
    cache: Arc<dyn CacheStore>,
    sink: Arc<dyn FaultSink>,
    window: Duration,
}

impl ErrorReporter {
    pub fn new(cache: Arc<dyn CacheStore>, sink: Arc<dyn FaultSink>, window: Duration) -> Self {
        Self { cache, sink, window }
    }

    /// Reports `error` unless the same signature was reported within the
    /// window. Returns whether the sink was called.
    pub async fn report(&self, error: &(dyn std::error::Error + Send + Sync)) -> bool {
        let message = error.to_string();
        let signature: String = message.chars().take(SIGNATURE_LEN).collect();
        let key = format!("{FAULT_KEY_PREFIX}{signature}");

        match self.cache.get(&key).await {
            Ok(Some(_)) => {
                tracing::debug!(signature, "Fault already reported in this window.");
                return false;
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Fault window read failed, reporting anyway."),
        }

        if let Err(e) = self.cache.set(&key, "1", Some(self.window)).await {
            tracing::warn!(error = %e, "Fault window write failed.");
        }
        self.sink.report(&signature, &message).await;
        true
    }
}
