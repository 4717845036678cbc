use async_trait::async_trait;
use bifrost_common::http::HttpClient;
use bifrost_primitives::{keys::Address, txid::TxId};
use tracing::*;

use super::{
    error::{ClientError, ClientResult},
    traits::{Broadcaster, Reader},
    types::{Account, AccountResponse, BroadcastEntry, DexTx, TxSearchResponse},
};

/// Page size requested from `tx_search`.
pub const TX_SEARCH_PER_PAGE: usize = 100;

/// Client for a Binance Chain node (tendermint RPC) and its DEX REST API.
#[derive(Debug, Clone)]
pub struct BinanceClient {
    http: HttpClient,
    rpc_url: String,
    dex_url: String,
}

impl BinanceClient {
    /// `rpc_url` may be empty for a client that only uses the DEX API.
    pub fn new(http: HttpClient, rpc_url: &str, dex_url: &str) -> Self {
        Self {
            http,
            rpc_url: rpc_url.trim_end_matches('/').to_string(),
            dex_url: dex_url.trim_end_matches('/').to_string(),
        }
    }

    fn tx_search_url(&self, height: i64, page: usize) -> String {
        format!(
            "{}/tx_search?query=%22tx.height%3D{height}%22&prove=true&page={page}&per_page={TX_SEARCH_PER_PAGE}",
            self.rpc_url
        )
    }
}

#[async_trait]
impl Reader for BinanceClient {
    async fn get_tx_hashes(&self, height: i64) -> ClientResult<Vec<TxId>> {
        let mut hashes = Vec::new();
        let mut page = 1;
        loop {
            let url = self.tx_search_url(height, page);
            let resp: TxSearchResponse = self.http.get_json(&url).await?;
            let total = usize::try_from(resp.result.total_count).map_err(|_| {
                ClientError::MalformedResponse(format!(
                    "negative total_count {}",
                    resp.result.total_count
                ))
            })?;

            if resp.result.txs.is_empty() {
                break;
            }
            for item in resp.result.txs {
                hashes.push(TxId::new(&item.hash)?);
            }
            if hashes.len() >= total {
                break;
            }
            page += 1;
        }

        trace!(%height, count = hashes.len(), "listed block txs");
        Ok(hashes)
    }

    async fn get_tx(&self, hash: &TxId) -> ClientResult<DexTx> {
        let url = format!("{}/api/v1/tx/{hash}?format=json", self.dex_url);
        let tx: DexTx = self.http.get_json(&url).await?;
        Ok(tx)
    }
}

#[async_trait]
impl Broadcaster for BinanceClient {
    async fn get_account(&self, addr: &Address) -> ClientResult<Account> {
        let url = format!("{}/api/v1/account/{addr}", self.dex_url);
        let resp: AccountResponse = self.http.get_json(&url).await?;
        resp.into_account().ok_or_else(|| {
            ClientError::MalformedResponse(format!("no account number or sequence for {addr}"))
        })
    }

    async fn broadcast(&self, tx_hex: &str) -> ClientResult<TxId> {
        let url = format!("{}/api/v1/broadcast?sync=true", self.dex_url);
        let entries: Vec<BroadcastEntry> = self.http.post_text(&url, tx_hex.to_string()).await?;

        let entry = entries
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::MalformedResponse("empty broadcast reply".into()))?;
        if !entry.ok || entry.code != 0 {
            warn!(code = entry.code, log = %entry.log, "broadcast rejected");
            return Err(ClientError::Rejected {
                code: entry.code,
                log: entry.log,
            });
        }

        let hash = TxId::new(&entry.hash)?;
        debug!(%hash, "broadcast accepted");
        Ok(hash)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bifrost_common::{
        http::HttpClientConfig,
        retry::{policies::ExponentialBackoff, RetryLimits},
        test_utils::{Route, StubServer},
    };
    use bifrost_tasks::ShutdownSignal;

    use super::*;

    const HASH_A: &str = "10C4E872A5DC842BE72AC8DE9C6A13F97DF6D345336F01B87EBA998F5A3BC36D";
    const HASH_B: &str = "3B0B5DFB4F6E5B1C4A2E7A1A2F6A58F1B9D2F3C4E5A6B7C8D9E0F1A2B3C4D5E6";
    const ADDR: &str = "tbnb1ggdcyhk8rc7fgzp8wa2su220aclcggcsd94ye5";

    fn client(server: &StubServer) -> BinanceClient {
        let config = HttpClientConfig {
            request_timeout: Duration::from_secs(5),
            limits: RetryLimits {
                max_attempts: 2,
                max_elapsed: Duration::from_secs(5),
            },
            backoff: ExponentialBackoff::new(10, 2, 1),
        };
        let http = HttpClient::new(config, ShutdownSignal::new()).unwrap();
        BinanceClient::new(http, server.url(), server.url())
    }

    #[tokio::test]
    async fn test_tx_hashes_follow_pages() {
        let page = |hash: &str| {
            format!(r#"{{"result":{{"txs":[{{"hash":"{hash}","height":"7"}}],"total_count":"2"}}}}"#)
        };
        let server = StubServer::start(vec![
            Route::get("/tx_search?query=%22tx.height%3D7%22&prove=true&page=1&", 200, page(HASH_A)),
            Route::get("/tx_search?query=%22tx.height%3D7%22&prove=true&page=2&", 200, page(HASH_B)),
        ])
        .await;

        let hashes = client(&server).get_tx_hashes(7).await.unwrap();

        assert_eq!(
            hashes,
            vec![TxId::new(HASH_A).unwrap(), TxId::new(HASH_B).unwrap()]
        );
        assert_eq!(server.hits("/tx_search"), 2);
    }

    #[tokio::test]
    async fn test_tx_hashes_stop_on_empty_page() {
        let server = StubServer::start(vec![Route::get(
            "/tx_search",
            200,
            r#"{"result":{"txs":[],"total_count":"5"}}"#,
        )])
        .await;

        let hashes = client(&server).get_tx_hashes(7).await.unwrap();
        assert!(hashes.is_empty());
        assert_eq!(server.hits("/tx_search"), 1);
    }

    #[tokio::test]
    async fn test_tx_hashes_reject_bad_hash() {
        let server = StubServer::start(vec![Route::get(
            "/tx_search",
            200,
            r#"{"result":{"txs":[{"hash":"abcd"}],"total_count":"1"}}"#,
        )])
        .await;

        let res = client(&server).get_tx_hashes(7).await;
        assert!(matches!(res, Err(ClientError::Parse(_))), "got {res:?}");
    }

    #[tokio::test]
    async fn test_get_tx() {
        let body = format!(
            r#"{{"code":0,"hash":"{HASH_A}","height":"7","log":"","ok":true,"tx":{{"type":"auth/StdTx","value":{{
                "memo":"STAKE:BNB",
                "msg":[{{"type":"cosmos-sdk/Send","value":{{
                    "inputs":[{{"address":"tbnb1yycn4mh6ffwpjf584t8lpp7c27ghu03gpvqkfj","coins":[{{"amount":"100000000","denom":"BNB"}}]}}],
                    "outputs":[{{"address":"{ADDR}","coins":[{{"amount":"100000000","denom":"BNB"}}]}}]
                }}}}]
            }}}}}}"#
        );
        let server = StubServer::start(vec![Route::get(
            format!("/api/v1/tx/{HASH_A}?format=json"),
            200,
            body,
        )])
        .await;

        let tx = client(&server)
            .get_tx(&TxId::new(HASH_A).unwrap())
            .await
            .unwrap();

        assert_eq!(tx.height, 7);
        assert_eq!(tx.tx.value.memo, "STAKE:BNB");
        let msg = &tx.tx.value.msg[0];
        assert!(msg.is_send());
        assert_eq!(msg.value.outputs[0].address, ADDR);
        assert_eq!(msg.value.outputs[0].coins[0].amount, "100000000");
    }

    #[tokio::test]
    async fn test_get_unknown_tx() {
        let server = StubServer::start(vec![Route::get(
            format!("/api/v1/tx/{HASH_B}?format=json"),
            404,
            r#"{"code":404,"message":"tx not found"}"#,
        )])
        .await;

        let err = client(&server)
            .get_tx(&TxId::new(HASH_B).unwrap())
            .await
            .unwrap_err();
        assert!(err.is_not_found(), "got {err:?}");
        assert_eq!(server.requests().len(), 1, "a missing tx is not retried");
    }

    #[tokio::test]
    async fn test_get_account() {
        let server = StubServer::start(vec![Route::get(
            format!("/api/v1/account/{ADDR}"),
            200,
            r#"{"account_number":"9","sequence":"41"}"#,
        )])
        .await;

        let account = client(&server)
            .get_account(&Address::new(ADDR).unwrap())
            .await
            .unwrap();
        assert_eq!(
            account,
            Account {
                account_number: 9,
                sequence: 41
            }
        );
    }

    #[tokio::test]
    async fn test_broadcast_accepted() {
        let server = StubServer::start(vec![Route::post(
            "/api/v1/broadcast?sync=true",
            200,
            format!(r#"[{{"code":0,"hash":"{HASH_B}","log":"Msg 0: ","data":"","ok":true}}]"#),
        )])
        .await;

        let hash = client(&server).broadcast("c701f0625dee").await.unwrap();

        assert_eq!(hash.as_str(), HASH_B);
        let reqs = server.requests();
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].body, "c701f0625dee");
    }

    #[tokio::test]
    async fn test_broadcast_rejected() {
        let server = StubServer::start(vec![Route::post(
            "/api/v1/broadcast",
            200,
            r#"[{"code":3,"hash":"","log":"Invalid sequence","ok":false}]"#,
        )])
        .await;

        let res = client(&server).broadcast("00").await;
        match res {
            Err(e @ ClientError::Rejected { .. }) => assert!(e.is_sequence_mismatch()),
            other => panic!("should be rejected but got: {other:?}"),
        }
    }
}
