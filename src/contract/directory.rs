//! Lookup of published contract ABIs.

use std::sync::Arc;

use alloy::json_abi::JsonAbi;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::StatusCode;
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;

use crate::http_client::HttpLookupError;

/// An external service holding verified contract source and ABIs.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ContractCodeDirectory: Send + Sync {
    /// Returns the published ABI of `address`, or `None` when the contract is
    /// not verified.
    async fn fetch_abi(&self, address: &str) -> Result<Option<JsonAbi>, HttpLookupError>;
}

#[derive(Debug, Deserialize)]
struct ContractCode {
    #[serde(default)]
    abi: Option<serde_json::Value>,
}

/// A [`ContractCodeDirectory`] backed by the chain explorer's contract
/// verification API.
pub struct ExplorerCodeDirectory {
    client: Arc<ClientWithMiddleware>,
    base_url: String,
}

impl ExplorerCodeDirectory {
    /// Creates a directory client for `base_url`.
    pub fn new(client: Arc<ClientWithMiddleware>, base_url: impl Into<String>) -> Self {
        Self { client, base_url: base_url.into().trim_end_matches('/').to_string() }
    }
}

#[async_trait]
impl ContractCodeDirectory for ExplorerCodeDirectory {
    #[tracing::instrument(skip(self), level = "debug")]
    async fn fetch_abi(&self, address: &str) -> Result<Option<JsonAbi>, HttpLookupError> {
        let url = format!("{}/fetchContractCode", self.base_url);
        let response =
            self.client.get(&url).query(&[("contractAddress", address)]).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => return Ok(None),
            status if !status.is_success() => {
                return Err(HttpLookupError::Status(status.as_u16()));
            }
            _ => {}
        }

        let code: ContractCode =
            response.json().await.map_err(|e| HttpLookupError::Decode(e.to_string()))?;

        match code.abi {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(serde_json::Value::Array(items)) if items.is_empty() => Ok(None),
            Some(raw) => serde_json::from_value(raw)
                .map(Some)
                .map_err(|e| HttpLookupError::Decode(e.to_string())),
        }
    }
}
