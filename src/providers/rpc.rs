//! This module provides the JSON-RPC `ChainClient` and the factory for the
//! underlying providers with retry logic and backoff strategies.

use std::{borrow::Cow, num::NonZeroUsize};

use alloy::{
    primitives::{Bytes, U64},
    providers::{Provider, ProviderBuilder},
    rpc::{client::RpcClient, json_rpc::RpcRecv},
    transports::{
        RpcError, TransportErrorKind,
        http::{Http, reqwest::Url},
        layers::{FallbackLayer, RetryBackoffLayer},
    },
};
use async_trait::async_trait;
use serde_json::{Value, json};
use tower::ServiceBuilder;

use super::traits::{BLOCK_NOT_FOUND_CODE, ChainClient, DataSourceError};
use crate::{
    config::RpcRetryConfig,
    models::{ChainBlock, ChainTrace, Log},
};

/// A `ChainClient` for Harmony style JSON-RPC endpoints.
///
/// Block, log and call requests go to the main provider. `trace_block` goes
/// to a dedicated trace provider since public nodes often disable the trace
/// namespace.
pub struct HarmonyRpcSource<P> {
    provider: P,
    trace_provider: P,
}

impl<P> HarmonyRpcSource<P>
where
    P: Provider,
{
    /// Creates a new `HarmonyRpcSource`.
    #[tracing::instrument(skip(provider, trace_provider), level = "debug")]
    pub fn new(provider: P, trace_provider: P) -> Self {
        Self { provider, trace_provider }
    }

    async fn request<R>(
        provider: &P,
        method: &'static str,
        params: Value,
        block_number: Option<u64>,
    ) -> Result<R, DataSourceError>
    where
        R: RpcRecv,
    {
        provider
            .raw_request::<_, R>(Cow::Borrowed(method), params)
            .await
            .map_err(|e| classify_error(method, e, block_number))
    }
}

fn block_hex(number: u64) -> String {
    format!("0x{number:x}")
}

fn classify_error(
    method: &'static str,
    error: RpcError<TransportErrorKind>,
    block_number: Option<u64>,
) -> DataSourceError {
    if let Some(payload) = error.as_error_resp() {
        return match block_number {
            Some(number) if payload.code == BLOCK_NOT_FOUND_CODE => {
                DataSourceError::BlockNotFound(number)
            }
            _ => DataSourceError::Response {
                code: payload.code,
                message: payload.message.to_string(),
            },
        };
    }
    if error.is_deser_error() || error.is_ser_error() {
        return DataSourceError::Malformed(format!("{method}: {error}"));
    }
    if matches!(error, RpcError::NullResp) {
        return DataSourceError::EmptyResponse(method);
    }
    DataSourceError::Transport(format!("{method}: {error}"))
}

#[async_trait]
impl<P> ChainClient for HarmonyRpcSource<P>
where
    P: Provider + Send + Sync,
{
    #[tracing::instrument(skip(self), level = "debug")]
    async fn block_number(&self) -> Result<u64, DataSourceError> {
        let head: U64 = Self::request(&self.provider, "hmy_blockNumber", json!([]), None).await?;
        let head = head.to::<u64>();
        tracing::debug!(head, "Fetched chain head.");
        Ok(head)
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn block_with_transactions(&self, number: u64) -> Result<ChainBlock, DataSourceError> {
        let params = json!([
            block_hex(number),
            { "fullTx": true, "inclTx": true, "withSigners": false, "inclStaking": false }
        ]);
        let block: Option<ChainBlock> =
            Self::request(&self.provider, "hmy_getBlockByNumber", params, Some(number)).await?;
        let block = block.ok_or(DataSourceError::EmptyResponse("hmy_getBlockByNumber"))?;
        tracing::debug!(
            block_number = number,
            tx_count = block.transactions.len(),
            "Fetched block."
        );
        Ok(block)
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn logs(&self, number: u64) -> Result<Vec<Log>, DataSourceError> {
        let params = json!([{ "fromBlock": block_hex(number), "toBlock": block_hex(number) }]);
        let logs: Option<Vec<Log>> =
            Self::request(&self.provider, "hmy_getLogs", params, Some(number)).await?;
        let logs = logs.ok_or(DataSourceError::EmptyResponse("hmy_getLogs"))?;
        tracing::debug!(block_number = number, log_count = logs.len(), "Fetched logs.");
        Ok(logs)
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn trace_block(&self, number: u64) -> Result<Vec<ChainTrace>, DataSourceError> {
        let params = json!([block_hex(number)]);
        let traces: Option<Vec<ChainTrace>> =
            Self::request(&self.trace_provider, "trace_block", params, Some(number)).await?;
        let traces = traces.ok_or(DataSourceError::EmptyResponse("trace_block"))?;
        tracing::debug!(block_number = number, trace_count = traces.len(), "Fetched traces.");
        Ok(traces)
    }

    #[tracing::instrument(skip(self, data), level = "debug")]
    async fn call(&self, to: &str, data: Bytes) -> Result<Bytes, DataSourceError> {
        let params = json!([{ "to": to, "data": data }, "latest"]);
        Self::request(&self.provider, "hmy_call", params, None).await
    }
}

/// Custom error type for provider operations.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Error when creating the provider.
    #[error("Provider creation failed: {0}")]
    CreationError(String),
}

/// Creates a new provider with the given RPC URLs.
///
/// URLs are used through a fallback transport in the given order, wrapped in
/// a retry layer with exponential backoff.
pub fn create_provider(
    urls: Vec<Url>,
    retry_config: RpcRetryConfig,
) -> Result<impl Provider + Clone, ProviderError> {
    let active_transports = NonZeroUsize::new(urls.len())
        .ok_or_else(|| ProviderError::CreationError("RPC URL list cannot be empty".into()))?;

    let fallback_layer = FallbackLayer::default().with_active_transport_count(active_transports);

    let transports: Vec<_> = urls.into_iter().map(Http::new).collect();

    let retry_layer = RetryBackoffLayer::new(
        retry_config.max_retry,
        retry_config.backoff_ms,
        retry_config.compute_units_per_second,
    );

    let service =
        ServiceBuilder::new().layer(retry_layer).layer(fallback_layer).service(transports);

    let client = RpcClient::builder().transport(service, false);
    Ok(ProviderBuilder::new().connect_client(client))
}

#[cfg(test)]
mod tests {
    use alloy::{rpc::json_rpc::ErrorPayload, transports::mock::Asserter};

    use super::*;
    use crate::test_helpers::{
        BlockBuilder, LogBuilder, MockedProvider, TransactionBuilder, mock_rpc_source,
    };

    fn source() -> (HarmonyRpcSource<MockedProvider>, Asserter) {
        mock_rpc_source()
    }

    #[tokio::test]
    async fn test_block_number_parses_hex_quantity() {
        let (source, asserter) = source();
        asserter.push_success(&"0x2a");

        assert_eq!(source.block_number().await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_block_with_transactions() {
        let (source, asserter) = source();
        let block = BlockBuilder::new(100)
            .transaction(TransactionBuilder::new("0xabc").eth_hash("0xdef").build())
            .build();
        asserter.push_success(&block);

        let fetched = source.block_with_transactions(100).await.unwrap();

        assert_eq!(fetched, block);
    }

    #[tokio::test]
    async fn test_block_not_found_code_maps_to_block_not_found() {
        let (source, asserter) = source();
        asserter.push_failure(ErrorPayload {
            code: BLOCK_NOT_FOUND_CODE,
            message: "requested block number greater than current block number".into(),
            data: None,
        });

        let result = source.block_with_transactions(500).await;

        assert_eq!(result, Err(DataSourceError::BlockNotFound(500)));
    }

    #[tokio::test]
    async fn test_other_error_payload_maps_to_response() {
        let (source, asserter) = source();
        asserter.push_failure(ErrorPayload {
            code: -32602,
            message: "invalid params".into(),
            data: None,
        });

        let result = source.logs(7).await;

        assert_eq!(
            result,
            Err(DataSourceError::Response { code: -32602, message: "invalid params".into() })
        );
    }

    #[tokio::test]
    async fn test_null_block_is_empty_response() {
        let (source, asserter) = source();
        asserter.push_success(&Value::Null);

        let result = source.block_with_transactions(5).await;

        assert_eq!(result, Err(DataSourceError::EmptyResponse("hmy_getBlockByNumber")));
    }

    #[tokio::test]
    async fn test_logs() {
        let (source, asserter) = source();
        let logs = vec![LogBuilder::new("0xabc").build(), LogBuilder::new("0xdef").build()];
        asserter.push_success(&logs);

        let fetched = source.logs(1).await.unwrap();

        assert_eq!(fetched, logs);
    }

    #[tokio::test]
    async fn test_trace_block() {
        let (source, asserter) = source();
        asserter.push_success(&json!([{
            "action": {"from": "0x1", "to": "0x2", "gas": "0x5208", "value": "0x1", "input": "0x"},
            "result": {"gasUsed": "0x5208", "output": "0x"},
            "transactionHash": "0xaaa",
            "transactionPosition": 0,
            "blockNumber": 9
        }]));

        let traces = source.trace_block(9).await.unwrap();

        assert_eq!(traces.len(), 1);
        assert_eq!(traces[0].transaction_hash.as_deref(), Some("0xaaa"));
    }

    #[tokio::test]
    async fn test_call_returns_bytes() {
        let (source, asserter) = source();
        asserter.push_success(&"0x0000000000000000000000000000000000000000000000000000000000000012");

        let output = source.call("0x1111111111111111111111111111111111111111", Bytes::new()).await;

        assert_eq!(output.unwrap().len(), 32);
    }

    #[tokio::test]
    async fn test_error_without_block_context_is_a_response_error() {
        let (source, asserter) = source();
        asserter.push_failure(ErrorPayload {
            code: BLOCK_NOT_FOUND_CODE,
            message: "execution reverted".into(),
            data: None,
        });

        let result = source.call("0x1111111111111111111111111111111111111111", Bytes::new()).await;

        assert!(matches!(result, Err(DataSourceError::Response { code: BLOCK_NOT_FOUND_CODE, .. })));
    }

    #[test]
    fn test_create_provider_rejects_empty_urls() {
        let result = create_provider(vec![], RpcRetryConfig::default());
        assert!(result.is_err());
    }
}
