//! Signs outbound batches, broadcasts them to Binance Chain and reports the
//! resulting hash back to THORChain.
//!
//! A batch moves `Pending -> Signing -> Broadcast` and is deleted once the
//! report went through. Every signed tx is persisted before it is broadcast,
//! so after a crash the stored tx is looked up on chain instead of signing
//! the same instruction twice. No new tx is signed while another batch still
//! holds an unresolved one, which keeps every account sequence tied to a
//! single batch.

use std::{sync::Arc, time::Duration};

use bifrost_binance::{
    amino::{tx_hash, InOut, SendMsg, StdSignMsg, StdSignature, StdTx, Token, DEFAULT_SOURCE},
    keys::KeyManager,
    rpc::types::Account,
    Broadcaster, Reader,
};
use bifrost_common::metrics::BifrostMetrics;
use bifrost_db::entities::{SignedTx, TxOutStatus, TxOutStatusItem};
use bifrost_primitives::{
    coin::Coin,
    keys::{Address, Network},
    tx::TxOut,
    txid::TxId,
};
use bifrost_storage::TxOutOps;
use bifrost_tasks::{ShutdownGuard, TaskExecutor};
use bifrost_thorclient::ThorchainRpc;
use tokio::sync::mpsc;
use tracing::*;

use crate::errors::{SignerError, SignerResult};

/// Heights waiting for the signer task.
const OUTBOUND_QUEUE_SIZE: usize = 64;

/// Memo the network matches an outbound transfer with.
pub fn outbound_memo(height: i64) -> String {
    format!("OUT:{height}")
}

#[derive(Debug, Clone)]
pub struct SignerParams {
    /// Address the signing key controls, the input of every transfer.
    pub signer_address: Address,

    pub network: Network,

    /// Symbol RUNE is paid out as.
    pub rune_symbol: String,

    /// Re-signs after a sequence mismatch before giving the batch up.
    pub max_broadcast_retries: u32,

    /// How often batches that failed transiently are re-driven.
    pub retry_interval: Duration,
}

/// `B` broadcasts the signed txs and looks up whether an earlier one landed.
pub struct Signer<B, K, C> {
    binance: Arc<B>,
    keys: Arc<K>,
    rpc: Arc<C>,
    ops: Arc<TxOutOps>,
    params: SignerParams,
    metrics: Arc<BifrostMetrics>,
}

impl<B: Broadcaster + Reader, K: KeyManager, C: ThorchainRpc> Signer<B, K, C> {
    pub fn new(
        binance: Arc<B>,
        keys: Arc<K>,
        rpc: Arc<C>,
        ops: Arc<TxOutOps>,
        params: SignerParams,
        metrics: Arc<BifrostMetrics>,
    ) -> Self {
        Self {
            binance,
            keys,
            rpc,
            ops,
            params,
            metrics,
        }
    }

    /// Spawns the signer task and the retry task. Returns the queue outbound
    /// heights are handed over on.
    pub fn start(self, executor: &TaskExecutor) -> mpsc::Sender<i64> {
        let (height_tx, height_rx) = mpsc::channel(OUTBOUND_QUEUE_SIZE);

        let ops = self.ops.clone();
        let retry_tx = height_tx.clone();
        let interval = self.params.retry_interval;
        executor.spawn_critical_async_with_shutdown("outbound_retry", move |shutdown| {
            retry_task(ops, retry_tx, interval, shutdown)
        });

        let signer = Arc::new(self);
        executor.spawn_critical_async_with_shutdown("outbound_signer", move |shutdown| {
            signer_task(signer, height_rx, shutdown)
        });

        height_tx
    }

    /// Drives the stored batch of `height` as far as it goes. Failures are
    /// recorded on the batch, only storage errors are returned.
    pub async fn process(&self, height: i64) -> SignerResult<()> {
        let Some(mut item) = self.ops.get_txout_async(height).await? else {
            trace!(%height, "outbound already done");
            return Ok(());
        };
        if let TxOutStatus::Failed {
            permanent: true,
            reason,
            ..
        } = &item.status
        {
            warn!(%height, %reason, "outbound failed permanently, skipping");
            return Ok(());
        }

        let err = match self.drive(&mut item).await {
            Ok(()) => return Ok(()),
            Err(SignerError::Db(err)) => return Err(SignerError::Db(err)),
            Err(err) => err,
        };

        if matches!(item.status, TxOutStatus::Broadcast { .. }) {
            // Only the report is missing, the retry task repeats it.
            warn!(%height, %err, "failed to report outbound");
            return Ok(());
        }

        self.metrics
            .signer_errors
            .with_label_values(&[err.kind()])
            .inc();
        let permanent = err.is_permanent();
        if permanent {
            error!(%height, %err, "outbound failed permanently");
        } else {
            warn!(%height, %err, "outbound failed");
        }
        item.status = TxOutStatus::Failed {
            reason: err.to_string(),
            permanent,
            signed: item.status.signed().cloned(),
        };
        self.ops.put_txout_async(item).await?;
        Ok(())
    }

    async fn drive(&self, item: &mut TxOutStatusItem) -> SignerResult<()> {
        let height = item.height();

        let known = match (&item.status, item.status.signed().cloned()) {
            (TxOutStatus::Broadcast { hash }, _) => Some(hash.clone()),
            (_, Some(signed)) => self.reconcile(height, &signed).await?,
            _ => None,
        };

        let hash = match known {
            Some(hash) => hash,
            None => match self.timed_sign_and_broadcast(item).await? {
                Some(hash) => hash,
                None => {
                    info!(%height, "nothing for this signer to pay out");
                    self.ops.remove_txout_async(height).await?;
                    return Ok(());
                }
            },
        };

        if !matches!(item.status, TxOutStatus::Broadcast { .. }) {
            item.status = TxOutStatus::Broadcast { hash: hash.clone() };
            self.ops.put_txout_async(item.clone()).await?;
        }

        let reported = self
            .rpc
            .post_outbound(height, hash.clone(), outbound_memo(height))
            .await?;
        info!(%height, %hash, %reported, "reported outbound");

        self.ops.remove_txout_async(height).await?;
        Ok(())
    }

    /// Decides what happened to a tx signed by an earlier attempt. Returns its
    /// hash when it is (or now got) on chain, `None` when it has to be
    /// signed again.
    ///
    /// Only a lookup by hash proves inclusion. A sequence that moved past the
    /// stored one without the tx on chain means the slot went elsewhere and
    /// the stored tx can never land.
    async fn reconcile(&self, height: i64, signed: &SignedTx) -> SignerResult<Option<TxId>> {
        match self.binance.get_tx(&signed.hash).await {
            Ok(tx) => {
                info!(%height, hash = %signed.hash, included = %tx.height, "stored tx is on chain");
                return Ok(Some(signed.hash.clone()));
            }
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err.into()),
        }

        let account = self
            .binance
            .get_account(&self.params.signer_address)
            .await?;
        if account.sequence.max(0) as u64 > signed.sequence {
            warn!(
                %height,
                hash = %signed.hash,
                sequence = %signed.sequence,
                current = %account.sequence,
                "stored tx not on chain and its sequence is used, signing again"
            );
            return Ok(None);
        }

        match self.binance.broadcast(&signed.tx_hex).await {
            Ok(hash) => {
                self.metrics.tx_to_binance_broadcast.inc();
                info!(%height, %hash, "rebroadcast stored tx");
                Ok(Some(hash))
            }
            Err(err) if err.is_rejection() => {
                warn!(%height, %err, "stored tx rejected, signing again");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn timed_sign_and_broadcast(
        &self,
        item: &mut TxOutStatusItem,
    ) -> SignerResult<Option<TxId>> {
        let timer = self.metrics.sign_and_broadcast_duration.start_timer();
        let res = self.sign_and_broadcast(item).await;
        timer.observe_duration();
        res
    }

    /// Signs and broadcasts the batch with a freshly fetched sequence,
    /// re-signing on sequence mismatches. Returns `None` when no item of the
    /// batch is paid from this signer's address.
    async fn sign_and_broadcast(&self, item: &mut TxOutStatusItem) -> SignerResult<Option<TxId>> {
        let height = item.height();
        let outputs = self.outputs(&item.tx_out)?;
        if outputs.is_empty() {
            return Ok(None);
        }
        self.ensure_no_unresolved(height).await?;
        let memo = outbound_memo(height);

        let mut retries = 0;
        loop {
            let account = self
                .binance
                .get_account(&self.params.signer_address)
                .await?;
            let signed = self.sign(&account, &memo, &outputs).await?;
            item.status = TxOutStatus::Signing {
                signed: Some(signed.clone()),
            };
            self.ops.put_txout_async(item.clone()).await?;

            match self.binance.broadcast(&signed.tx_hex).await {
                Ok(hash) => {
                    self.metrics.tx_to_binance_broadcast.inc();
                    if hash != signed.hash {
                        warn!(%height, %hash, expected = %signed.hash, "node reported another hash");
                    }
                    info!(%height, %hash, sequence = %signed.sequence, "broadcast outbound");
                    return Ok(Some(hash));
                }
                Err(err) if err.is_rejection() => {
                    // Refused by the node, nothing reached the chain.
                    item.status = TxOutStatus::Signing { signed: None };
                    if !err.is_sequence_mismatch() {
                        return Err(err.into());
                    }
                    if retries >= self.params.max_broadcast_retries {
                        return Err(SignerError::BroadcastRetriesExhausted(retries));
                    }
                    retries += 1;
                    warn!(%height, %retries, %err, "sequence mismatch, signing again");
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Fails while a batch other than `height` holds a signed tx whose fate
    /// is unknown. Signing now could take the sequence that tx waits for.
    async fn ensure_no_unresolved(&self, height: i64) -> SignerResult<()> {
        let blocking = self
            .ops
            .get_txout_for_retry_async(false)
            .await?
            .into_iter()
            .find(|other| other.height() != height && other.status.signed().is_some());
        match blocking {
            Some(other) => Err(SignerError::UnresolvedTx(other.height())),
            None => Ok(()),
        }
    }

    async fn sign(&self, account: &Account, memo: &str, outputs: &[InOut]) -> SignerResult<SignedTx> {
        let msg = StdSignMsg {
            chain_id: self.params.network.chain_id().to_string(),
            account_number: account.account_number,
            sequence: account.sequence,
            memo: memo.to_string(),
            msgs: vec![SendMsg::from_single_input(
                self.params.signer_address.clone(),
                outputs.to_vec(),
            )],
            source: DEFAULT_SOURCE,
        };

        let signed = self.keys.sign(&msg.sign_bytes()?).await?;
        let got = signed.pub_key.address(self.params.network.hrp())?;
        if got != self.params.signer_address {
            return Err(SignerError::SignerMismatch {
                expected: self.params.signer_address.clone(),
                got,
            });
        }

        let signature = StdSignature {
            pub_key: signed.pub_key,
            signature: signed.signature,
            account_number: account.account_number,
            sequence: account.sequence,
        };
        let bytes = StdTx::new(msg, signature).encode()?;
        self.metrics.tx_to_binance_signed.inc();

        Ok(SignedTx {
            tx_hex: hex::encode(&bytes),
            hash: tx_hash(&bytes),
            account_number: account.account_number.max(0) as u64,
            sequence: account.sequence.max(0) as u64,
        })
    }

    /// The outputs this signer pays, in array order.
    fn outputs(&self, tx_out: &TxOut) -> SignerResult<Vec<InOut>> {
        let mut outputs = Vec::new();
        for item in &tx_out.tx_array {
            if item.chain.as_ref().is_some_and(|c| !c.is_bnb()) {
                continue;
            }
            if item
                .pool_address
                .as_ref()
                .is_some_and(|p| *p != self.params.signer_address)
            {
                debug!(height = %tx_out.height, to = %item.to, "outbound item for another pool");
                continue;
            }

            let coins = item
                .coins
                .iter()
                .filter(|c| !c.is_empty())
                .map(|c| self.token(c))
                .collect::<SignerResult<Vec<_>>>()?;
            if coins.is_empty() {
                continue;
            }
            outputs.push(InOut::new(item.to.clone(), coins));
        }
        Ok(outputs)
    }

    fn token(&self, coin: &Coin) -> SignerResult<Token> {
        let denom = if coin.asset.is_rune() {
            self.params.rune_symbol.clone()
        } else {
            coin.asset.symbol.to_string()
        };
        let amount = coin
            .amount
            .to_i64()
            .ok_or_else(|| SignerError::AmountOverflow(coin.to_string()))?;
        Ok(Token { amount, denom })
    }
}

async fn signer_task<B: Broadcaster + Reader, K: KeyManager, C: ThorchainRpc>(
    signer: Arc<Signer<B, K, C>>,
    mut height_rx: mpsc::Receiver<i64>,
    shutdown: ShutdownGuard,
) -> anyhow::Result<()> {
    loop {
        let height = tokio::select! {
            _ = shutdown.wait_for_shutdown() => break,
            height = height_rx.recv() => match height {
                Some(height) => height,
                None => break,
            },
        };

        signer
            .process(height)
            .instrument(debug_span!("outbound", %height))
            .await?;
    }

    Ok(())
}

async fn retry_task(
    ops: Arc<TxOutOps>,
    height_tx: mpsc::Sender<i64>,
    interval: Duration,
    shutdown: ShutdownGuard,
) -> anyhow::Result<()> {
    // Everything the previous run left unfinished first.
    let mut failed_only = false;
    loop {
        let items = ops.get_txout_for_retry_async(failed_only).await?;
        if !items.is_empty() {
            debug!(count = items.len(), %failed_only, "re-driving outbound");
        }

        for item in items {
            let sent = tokio::select! {
                _ = shutdown.wait_for_shutdown() => false,
                res = height_tx.send(item.height()) => res.is_ok(),
            };
            if !sent {
                return Ok(());
            }
        }

        failed_only = true;
        tokio::select! {
            _ = shutdown.wait_for_shutdown() => return Ok(()),
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
