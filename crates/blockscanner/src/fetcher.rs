use async_trait::async_trait;
use bifrost_common::http::HttpClient;
use serde::Deserialize;
use tracing::*;

use crate::errors::{ScannerError, ScannerResult};

/// Source of the current chain tip.
#[async_trait]
pub trait HeightFetcher: Send + Sync + 'static {
    async fn fetch_tip(&self) -> ScannerResult<i64>;
}

#[derive(Debug, Deserialize)]
struct RpcBlockResponse {
    result: RpcBlockResult,
}

#[derive(Debug, Deserialize)]
struct RpcBlockResult {
    block: Option<RpcBlock>,
}

#[derive(Debug, Deserialize)]
struct RpcBlock {
    header: RpcBlockHeader,
}

#[derive(Debug, Deserialize)]
struct RpcBlockHeader {
    height: String,
}

/// Reads the tip from a tendermint RPC node's `/block` endpoint.
#[derive(Debug, Clone)]
pub struct RpcBlockHeightFetcher {
    client: HttpClient,
    url: String,
}

impl RpcBlockHeightFetcher {
    pub fn new(client: HttpClient, rpc_url: &str) -> Self {
        Self {
            client,
            url: format!("{}/block", rpc_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl HeightFetcher for RpcBlockHeightFetcher {
    async fn fetch_tip(&self) -> ScannerResult<i64> {
        let resp: RpcBlockResponse = self.client.get_json(&self.url).await?;
        let block = resp
            .result
            .block
            .ok_or_else(|| ScannerError::MalformedHeight("null block".into()))?;

        let height = block
            .header
            .height
            .parse::<i64>()
            .map_err(|_| ScannerError::MalformedHeight(block.header.height.clone()))?;
        trace!(%height, url = %self.url, "fetched tip");
        Ok(height)
    }
}
