use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use bifrost_common::http::{HttpClient, HttpError};
use bifrost_primitives::{
    canonical_json,
    chain::Chain,
    keys::PubKey,
    pool::PoolAddresses,
    tx::{ObservedTx, TxOut},
    txid::TxId,
};
use tokio::time::{sleep, Instant};
use tracing::*;

use crate::{
    errors::{ClientError, ClientResult},
    keys::ChainKeys,
    messages::ChainMsg,
    traits::ThorchainRpc,
    types::{
        AccountResponse, ChainAccount, JsonPubKey, LastBlockHeights, NodeAccount, PostTxRequest,
        PostTxResponse, StdFee, StdSignDoc, StdSignature, StdTx, TxMode, SECP256K1_PUBKEY_TYPE,
    },
};

/// How many times a tx is re-signed after a sequence rejection.
const DEFAULT_SEQUENCE_RETRIES: u32 = 3;

/// Talks to a THORChain node's REST server on behalf of one node account.
#[derive(Debug, Clone)]
pub struct ThorchainClient {
    http: HttpClient,
    base_url: String,
    chain_id: String,
    keys: Arc<ChainKeys>,
    sequence_retries: u32,
}

impl ThorchainClient {
    pub fn new(http: HttpClient, base_url: &str, chain_id: &str, keys: Arc<ChainKeys>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            chain_id: chain_id.to_string(),
            keys,
            sequence_retries: DEFAULT_SEQUENCE_RETRIES,
        }
    }

    pub fn with_sequence_retries(mut self, retries: u32) -> Self {
        self.sequence_retries = retries.max(1);
        self
    }

    pub fn keys(&self) -> &ChainKeys {
        &self.keys
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Account number and sequence of our own account, fetched fresh.
    pub async fn get_account(&self) -> ClientResult<ChainAccount> {
        let url = self.url(&format!("/auth/accounts/{}", self.keys.address()));
        let resp: AccountResponse = self.http.get_json(&url).await?;
        Ok(resp.into_account())
    }

    async fn sign_and_post(
        &self,
        msgs: &[ChainMsg],
        fee: &StdFee,
        account: ChainAccount,
    ) -> ClientResult<TxId> {
        let doc = StdSignDoc {
            account_number: account.account_number,
            chain_id: &self.chain_id,
            fee,
            memo: "",
            msgs,
            sequence: account.sequence,
        };
        let sign_bytes = canonical_json::to_sorted_vec(&doc)?;
        let signature = self.keys.sign(&sign_bytes);

        let req = PostTxRequest {
            tx: StdTx {
                msg: msgs,
                fee,
                signatures: vec![StdSignature {
                    pub_key: JsonPubKey {
                        kind: SECP256K1_PUBKEY_TYPE.to_string(),
                        value: STANDARD.encode(self.keys.pub_key().to_bytes()),
                    },
                    signature: STANDARD.encode(signature),
                }],
                memo: "",
            },
            mode: TxMode::Sync,
        };

        let resp: PostTxResponse = self.http.post_json(&self.url("/txs"), &req).await?;
        if resp.code != 0 {
            return Err(ClientError::Rejected {
                code: resp.code,
                raw_log: resp.raw_log,
            });
        }
        Ok(TxId::new(&resp.txhash)?)
    }

    /// Signs `msgs` with a freshly fetched sequence and posts them,
    /// re-signing when the chain reports a stale sequence.
    pub async fn submit(&self, msgs: Vec<ChainMsg>) -> ClientResult<TxId> {
        if msgs.is_empty() {
            return Err(ClientError::Empty);
        }
        let fee = StdFee::default();
        let mut attempt = 0;
        loop {
            attempt += 1;
            let account = self.get_account().await?;
            debug!(
                account_number = account.account_number,
                sequence = account.sequence,
                %attempt,
                "signing chain tx"
            );
            match self.sign_and_post(&msgs, &fee, account).await {
                Ok(hash) => {
                    info!(%hash, "chain tx accepted");
                    return Ok(hash);
                }
                Err(e) if e.is_sequence_mismatch() && attempt < self.sequence_retries => {
                    warn!(%attempt, err = %e, "stale sequence, re-signing");
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl ThorchainRpc for ThorchainClient {
    async fn get_pool_addresses(&self) -> ClientResult<PoolAddresses> {
        let pools: PoolAddresses = self
            .http
            .get_json(&self.url("/thorchain/pooladdresses"))
            .await?;
        Ok(pools)
    }

    async fn get_last_observed_height(&self, chain: Chain) -> ClientResult<i64> {
        let url = self.url(&format!("/thorchain/lastblock/{chain}"));
        let heights: LastBlockHeights = self.http.get_json(&url).await?;
        Ok(heights.last_observed_in)
    }

    async fn get_tx_out(&self, height: i64, pub_key: Option<PubKey>) -> ClientResult<TxOut> {
        let url = match pub_key {
            Some(pk) => self.url(&format!("/thorchain/txoutarray/{height}/{pk}")),
            None => self.url(&format!("/thorchain/txoutarray/{height}")),
        };
        match self.http.get_json::<TxOut>(&url).await {
            Ok(txout) => Ok(txout),
            // Heights without outbound instructions have no record at all.
            Err(HttpError::Status(404, _)) => Ok(TxOut {
                height,
                hash: String::new(),
                chain: None,
                tx_array: Vec::new(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn post_observations(&self, txs: Vec<ObservedTx>) -> ClientResult<TxId> {
        if txs.is_empty() {
            return Err(ClientError::Empty);
        }
        let msg = ChainMsg::ObservedTxIn {
            txs,
            signer: self.keys.address().clone(),
        };
        self.submit(vec![msg]).await
    }

    async fn post_outbound(&self, height: i64, tx_id: TxId, memo: String) -> ClientResult<TxId> {
        let msg = ChainMsg::OutboundTx {
            height,
            tx_id,
            memo,
            signer: self.keys.address().clone(),
        };
        self.submit(vec![msg]).await
    }

    async fn check_whitelisted(&self) -> ClientResult<()> {
        let addr = self.keys.address();
        let url = self.url(&format!("/thorchain/observer/{addr}"));
        let na: NodeAccount = self.http.get_json(&url).await?;
        if !na.can_observe() {
            return Err(ClientError::NotWhitelisted(addr.to_string(), na.status));
        }
        Ok(())
    }
}

/// How long to wait for the node account to be whitelisted.
#[derive(Debug, Clone, Copy)]
pub struct WhitelistPolicy {
    pub retry_every: Duration,
    pub give_up_after: Duration,
}

impl Default for WhitelistPolicy {
    fn default() -> Self {
        Self {
            retry_every: Duration::from_secs(30),
            give_up_after: Duration::from_secs(60 * 60),
        }
    }
}

impl WhitelistPolicy {
    /// Polls [`ThorchainRpc::check_whitelisted`] until it passes, returning
    /// the last error once `give_up_after` has elapsed.
    pub async fn wait<R: ThorchainRpc + ?Sized>(&self, rpc: &R) -> ClientResult<()> {
        let deadline = Instant::now() + self.give_up_after;
        loop {
            match rpc.check_whitelisted().await {
                Ok(()) => return Ok(()),
                Err(e) if Instant::now() + self.retry_every < deadline => {
                    warn!(err = %e, "node not whitelisted yet, retrying later");
                    sleep(self.retry_every).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
