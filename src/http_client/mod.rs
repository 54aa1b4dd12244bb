//! This module provides the retryable HTTP client used by the signature and
//! contract code directories.

mod client;

pub use client::{create_http_client, create_retryable_http_client};
use thiserror::Error;

/// Errors raised by the HTTP directory clients.
#[derive(Debug, Error)]
pub enum HttpLookupError {
    /// The HTTP client could not be constructed.
    #[error("Failed to create HTTP client: {0}")]
    ClientBuild(String),

    /// The request failed before a response arrived.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest_middleware::Error),

    /// The server answered with an unexpected status.
    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    /// The response body was not in the expected shape.
    #[error("Failed to decode response: {0}")]
    Decode(String),
}
