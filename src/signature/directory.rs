//! Lookup of function signatures by 4-byte selector.

use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;

use crate::http_client::HttpLookupError;

/// An external directory mapping call selectors to text signatures.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SignatureDirectory: Send + Sync {
    /// Returns the first known text signature for `selector` (`0x` + 8 hex
    /// chars), or `None` when the directory has no entry.
    async fn lookup(&self, selector: &str) -> Result<Option<String>, HttpLookupError>;
}

#[derive(Debug, Deserialize)]
struct SignaturePage {
    count: u64,
    #[serde(default)]
    results: Vec<SignatureEntry>,
}

#[derive(Debug, Deserialize)]
struct SignatureEntry {
    text_signature: String,
}

/// A [`SignatureDirectory`] backed by a 4byte.directory compatible API.
pub struct FourByteDirectory {
    client: Arc<ClientWithMiddleware>,
    base_url: String,
}

impl FourByteDirectory {
    /// Creates a directory client for `base_url`, e.g.
    /// `https://www.4byte.directory`.
    pub fn new(client: Arc<ClientWithMiddleware>, base_url: impl Into<String>) -> Self {
        Self { client, base_url: base_url.into().trim_end_matches('/').to_string() }
    }
}

#[async_trait]
impl SignatureDirectory for FourByteDirectory {
    #[tracing::instrument(skip(self), level = "debug")]
    async fn lookup(&self, selector: &str) -> Result<Option<String>, HttpLookupError> {
        let url = format!("{}/api/v1/signatures/", self.base_url);
        let response =
            self.client.get(&url).query(&[("hex_signature", selector)]).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(HttpLookupError::Status(status.as_u16()));
        }

        let page: SignaturePage =
            response.json().await.map_err(|e| HttpLookupError::Decode(e.to_string()))?;
        if page.count == 0 {
            return Ok(None);
        }
        Ok(page.results.into_iter().next().map(|entry| entry.text_signature))
    }
}
