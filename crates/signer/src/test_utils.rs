//! Fixtures shared by the signer tests.

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

use async_trait::async_trait;
use bifrost_binance::{
    amino::tx_hash,
    rpc::types::{Account, DexStdTx, DexStdTxValue, DexTx},
    Broadcaster, ClientError, ClientResult, Reader,
};
use bifrost_common::{http::HttpError, metrics::BifrostMetrics};
use bifrost_primitives::{
    amount::Amount,
    asset::Asset,
    chain::Chain,
    coin::Coin,
    keys::{Address, PubKey},
    tx::{TxOut, TxOutItem},
    txid::TxId,
};
use bifrost_rocksdb::{test_utils::get_rocksdb_tmp_instance, TxOutDb};
use bifrost_storage::{ops::txout::Context, TxOutOps};
use parking_lot::Mutex;
use secp256k1::{SecretKey, SECP256K1};

pub(crate) fn get_ops() -> Arc<TxOutOps> {
    let (db, _) = get_rocksdb_tmp_instance().unwrap();
    let db = Arc::new(TxOutDb::new(db));
    Arc::new(Context::new(db).into_ops(threadpool::ThreadPool::new(2)))
}

pub(crate) fn metrics() -> Arc<BifrostMetrics> {
    Arc::new(BifrostMetrics::new_for_testing())
}

pub(crate) fn secret(byte: u8) -> SecretKey {
    SecretKey::from_slice(&[byte; 32]).unwrap()
}

pub(crate) fn signer_key() -> PubKey {
    PubKey::new(secret(7).public_key(SECP256K1))
}

pub(crate) fn signer_address() -> Address {
    signer_key().address("tbnb").unwrap()
}

pub(crate) fn user_address(byte: u8) -> Address {
    PubKey::new(secret(byte).public_key(SECP256K1))
        .address("tbnb")
        .unwrap()
}

/// One RUNE payout from the signer's pool.
pub(crate) fn outbound(height: i64) -> TxOut {
    TxOut {
        height,
        hash: String::new(),
        chain: Some(Chain::bnb()),
        tx_array: vec![TxOutItem {
            chain: Some(Chain::bnb()),
            to: user_address(2),
            pool_address: Some(signer_address()),
            coins: vec![Coin::new(
                Asset::new("BNB.RUNE-B1A").unwrap(),
                Amount::from_u64(100_000_000),
            )],
            memo: None,
        }],
    }
}

/// In-memory DEX account. Broadcasts consume the queued replies first, then
/// succeed, land on chain and advance the sequence. A queued sequence
/// rejection also advances it, as if another tx took the slot.
pub(crate) struct TestBroadcaster {
    pub account: Mutex<Account>,
    pub replies: Mutex<VecDeque<ClientResult<TxId>>>,
    pub broadcasts: Mutex<Vec<String>>,
    /// Hash to inclusion height of every tx on chain.
    pub landed: Mutex<HashMap<TxId, i64>>,
}

impl TestBroadcaster {
    pub fn new(account_number: i64, sequence: i64) -> Self {
        Self {
            account: Mutex::new(Account {
                account_number,
                sequence,
            }),
            replies: Mutex::new(VecDeque::new()),
            broadcasts: Mutex::new(Vec::new()),
            landed: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_reply(self, reply: ClientResult<TxId>) -> Self {
        self.replies.lock().push_back(reply);
        self
    }

    pub fn broadcasts(&self) -> Vec<String> {
        self.broadcasts.lock().clone()
    }

    pub fn with_landed(self, hash: TxId) -> Self {
        self.landed.lock().insert(hash, 1);
        self
    }
}

#[async_trait]
impl Broadcaster for TestBroadcaster {
    async fn get_account(&self, _addr: &Address) -> ClientResult<Account> {
        Ok(*self.account.lock())
    }

    async fn broadcast(&self, tx_hex: &str) -> ClientResult<TxId> {
        self.broadcasts.lock().push(tx_hex.to_string());
        if let Some(reply) = self.replies.lock().pop_front() {
            if matches!(&reply, Err(err) if err.is_sequence_mismatch()) {
                self.account.lock().sequence += 1;
            }
            return reply;
        }
        let mut account = self.account.lock();
        account.sequence += 1;
        let hash = tx_hash(&hex::decode(tx_hex).unwrap());
        self.landed.lock().insert(hash.clone(), account.sequence);
        Ok(hash)
    }
}

#[async_trait]
impl Reader for TestBroadcaster {
    async fn get_tx_hashes(&self, _height: i64) -> ClientResult<Vec<TxId>> {
        Ok(Vec::new())
    }

    async fn get_tx(&self, hash: &TxId) -> ClientResult<DexTx> {
        let height = self.landed.lock().get(hash).copied().ok_or_else(|| {
            ClientError::Http(HttpError::Status(404, format!("tx {hash} not found")))
        })?;
        Ok(DexTx {
            hash: hash.to_string(),
            height,
            tx: DexStdTx {
                kind: "auth/StdTx".to_string(),
                value: DexStdTxValue {
                    memo: String::new(),
                    msg: Vec::new(),
                },
            },
        })
    }
}
