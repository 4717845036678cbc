use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use bifrost_common::http::{HttpClient, HttpError};
use bifrost_primitives::keys::PubKey;
use ethnum::U256;
use secp256k1::{ecdsa::Signature, Message, SECP256K1};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::*;

use super::{KeyManager, SignError, SignResult, Signed, TssError, BROKEN_SIGNATURE};

/// Order of the secp256k1 group.
const CURVE_ORDER: U256 = U256::from_words(
    0xFFFF_FFFF_FFFF_FFFF_FFFF_FFFF_FFFF_FFFE,
    0xBAAE_DCE6_AF48_A03B_BFD2_5E8C_D036_4141,
);

#[derive(Debug, Serialize)]
struct TssRequest<'a> {
    #[serde(rename = "Nodeid")]
    node_id: &'a str,
    #[serde(rename = "Msg")]
    msg: String,
}

/// Decoded `Ok.Msg` payload, decimal big integers.
#[derive(Debug, Deserialize)]
struct SignPack {
    #[serde(rename = "R")]
    r: String,
    #[serde(rename = "S")]
    s: String,
    #[serde(rename = "Pubkeyx")]
    pub_x: String,
    #[serde(rename = "Pubkeyy")]
    pub_y: String,
}

/// Delegates signing to a co-located TSS party.
#[derive(Debug, Clone)]
pub struct TssKeyManager {
    http: HttpClient,
    url: String,
    node_id: String,
    expected: Option<PubKey>,
}

impl TssKeyManager {
    pub fn new(http: HttpClient, url: String, node_id: String) -> Self {
        Self {
            http,
            url,
            node_id,
            expected: None,
        }
    }

    /// Rejects signatures produced by any other key.
    pub fn with_expected_key(mut self, pub_key: PubKey) -> Self {
        self.expected = Some(pub_key);
        self
    }

    async fn remote_sign(&self, sign_bytes: &[u8]) -> Result<SignPack, TssError> {
        let req = TssRequest {
            node_id: &self.node_id,
            msg: STANDARD.encode(sign_bytes),
        };
        let reply: Value = match self.http.post_json(&self.url, &req).await {
            Ok(v) => v,
            Err(HttpError::Status(_, body)) if body.contains(BROKEN_SIGNATURE) => {
                return Err(TssError::BrokenSignature)
            }
            Err(e) => return Err(e.into()),
        };

        let encoded = reply
            .get("Ok")
            .and_then(|ok| ok.get("Msg"))
            .and_then(Value::as_str)
            .ok_or_else(|| TssError::MalformedResponse(format!("no Ok.Msg in {reply}")))?;
        if encoded == BROKEN_SIGNATURE {
            return Err(TssError::BrokenSignature);
        }

        let raw = STANDARD
            .decode(encoded)
            .map_err(|e| TssError::MalformedResponse(format!("base64: {e}")))?;
        serde_json::from_slice(&raw).map_err(|e| TssError::MalformedResponse(e.to_string()))
    }
}

#[async_trait]
impl KeyManager for TssKeyManager {
    fn pub_key(&self) -> Option<PubKey> {
        self.expected
    }

    async fn sign(&self, sign_bytes: &[u8]) -> SignResult<Signed> {
        let pack = self.remote_sign(sign_bytes).await?;
        let signed = assemble(&pack)?;

        if let Some(expected) = self.expected {
            if expected != signed.pub_key {
                return Err(SignError::KeyMismatch {
                    expected,
                    got: signed.pub_key,
                });
            }
        }

        let digest: [u8; 32] = Sha256::digest(sign_bytes).into();
        let sig = Signature::from_compact(&signed.signature)
            .map_err(|e| SignError::InvalidSignature(e.to_string()))?;
        SECP256K1
            .verify_ecdsa(&Message::from_digest(digest), &sig, signed.pub_key.inner())
            .map_err(|e| SignError::InvalidSignature(e.to_string()))?;

        debug!(pub_key = %signed.pub_key, "tss signature verified");
        Ok(signed)
    }
}

fn parse_u256(field: &str, v: &str) -> SignResult<U256> {
    U256::from_str_radix(v.trim(), 10)
        .map_err(|_| SignError::Tss(TssError::MalformedResponse(format!("{field} = {v:?}"))))
}

/// Parses a signature scalar, which must lie in `[1, n)`.
fn parse_scalar(field: &str, v: &str) -> SignResult<U256> {
    let x = parse_u256(field, v)?;
    if x == U256::ZERO || x >= CURVE_ORDER {
        return Err(SignError::Tss(TssError::MalformedResponse(format!(
            "{field} out of range"
        ))));
    }
    Ok(x)
}

/// Low-S normalises the signature and compresses the returned key.
fn assemble(pack: &SignPack) -> SignResult<Signed> {
    let r = parse_scalar("R", &pack.r)?;
    let mut s = parse_scalar("S", &pack.s)?;
    if s > (CURVE_ORDER >> 1) {
        s = CURVE_ORDER - s;
    }

    let mut signature = [0u8; 64];
    signature[..32].copy_from_slice(&r.to_be_bytes());
    signature[32..].copy_from_slice(&s.to_be_bytes());

    let mut uncompressed = [0u8; 65];
    uncompressed[0] = 0x04;
    uncompressed[1..33].copy_from_slice(&parse_u256("Pubkeyx", &pack.pub_x)?.to_be_bytes());
    uncompressed[33..].copy_from_slice(&parse_u256("Pubkeyy", &pack.pub_y)?.to_be_bytes());
    let pub_key = PubKey::from_slice(&uncompressed)
        .map_err(|e| SignError::InvalidSignature(format!("tss pubkey: {e}")))?;

    Ok(Signed { pub_key, signature })
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
    use secp256k1::SecretKey;

    use super::*;
    use crate::keys::LocalKeyManager;

    const PAYLOAD: &[u8] = br#"{"account_number":"1","memo":"OUT:9"}"#;

    fn http() -> HttpClient {
        let config = HttpClientConfig {
            request_timeout: Duration::from_secs(5),
            limits: RetryLimits {
                max_attempts: 2,
                max_elapsed: Duration::from_secs(5),
            },
            backoff: ExponentialBackoff::new(10, 2, 1),
        };
        HttpClient::new(config, ShutdownSignal::new()).unwrap()
    }

    fn be_u256(bytes: &[u8]) -> U256 {
        let mut buf = [0u8; 32];
        buf.copy_from_slice(bytes);
        U256::from_be_bytes(buf)
    }

    /// A TSS reply for `PAYLOAD` signed by `secret`, with S flipped to the
    /// high half when `high_s` is set.
    fn tss_reply(secret: &SecretKey, high_s: bool) -> String {
        let digest: [u8; 32] = Sha256::digest(PAYLOAD).into();
        let sig = SECP256K1
            .sign_ecdsa(&Message::from_digest(digest), secret)
            .serialize_compact();
        let r = be_u256(&sig[..32]);
        let mut s = be_u256(&sig[32..]);
        if high_s {
            s = CURVE_ORDER - s;
        }
        let pk = secret.public_key(SECP256K1).serialize_uncompressed();
        let pack = format!(
            r#"{{"R":"{r}","S":"{s}","Pubkeyx":"{}","Pubkeyy":"{}"}}"#,
            be_u256(&pk[1..33]),
            be_u256(&pk[33..])
        );
        format!(r#"{{"Ok":{{"Msg":"{}"}}}}"#, STANDARD.encode(pack))
    }

    #[tokio::test]
    async fn test_high_s_is_normalised() {
        let secret = SecretKey::from_slice(&[11u8; 32]).unwrap();
        let server = StubServer::start(vec![Route::post("/", 200, tss_reply(&secret, true))]).await;
        let km = TssKeyManager::new(http(), format!("{}/", server.url()), "node-1".into());

        let signed = km.sign(PAYLOAD).await.unwrap();
        let local = LocalKeyManager::new(secret).sign(PAYLOAD).await.unwrap();

        assert_eq!(signed, local, "should match the low-S local signature");

        let req: Value = serde_json::from_str(&server.requests()[0].body).unwrap();
        assert_eq!(req["Nodeid"], "node-1");
        assert_eq!(req["Msg"], STANDARD.encode(PAYLOAD));
    }

    #[tokio::test]
    async fn test_low_s_passes_through() {
        let secret = SecretKey::from_slice(&[12u8; 32]).unwrap();
        let server = StubServer::start(vec![Route::post("/", 200, tss_reply(&secret, false))]).await;
        let km = TssKeyManager::new(http(), server.url().to_string(), "n".into())
            .with_expected_key(PubKey::new(secret.public_key(SECP256K1)));

        assert!(km.sign(PAYLOAD).await.is_ok());
    }

    #[tokio::test]
    async fn test_broken_signature_is_permanent() {
        let server = StubServer::start(vec![Route::post(
            "/",
            200,
            format!(r#"{{"Ok":{{"Msg":"{BROKEN_SIGNATURE}"}}}}"#),
        )])
        .await;
        let km = TssKeyManager::new(http(), server.url().to_string(), "n".into());

        let err = km.sign(PAYLOAD).await.unwrap_err();
        assert!(matches!(err, SignError::Tss(TssError::BrokenSignature)));
        assert!(err.is_permanent());
    }

    #[tokio::test]
    async fn test_unexpected_key_is_rejected() {
        let secret = SecretKey::from_slice(&[13u8; 32]).unwrap();
        let other = SecretKey::from_slice(&[14u8; 32]).unwrap();
        let server = StubServer::start(vec![Route::post("/", 200, tss_reply(&secret, false))]).await;
        let km = TssKeyManager::new(http(), server.url().to_string(), "n".into())
            .with_expected_key(PubKey::new(other.public_key(SECP256K1)));

        let err = km.sign(PAYLOAD).await.unwrap_err();
        assert!(matches!(err, SignError::KeyMismatch { .. }), "got {err:?}");
    }

    fn pack(r: U256, s: U256) -> SignPack {
        let pk = SecretKey::from_slice(&[15u8; 32])
            .unwrap()
            .public_key(SECP256K1)
            .serialize_uncompressed();
        SignPack {
            r: r.to_string(),
            s: s.to_string(),
            pub_x: be_u256(&pk[1..33]).to_string(),
            pub_y: be_u256(&pk[33..]).to_string(),
        }
    }

    #[test]
    fn test_out_of_range_scalars_are_rejected() {
        let one = U256::ONE;
        for (r, s) in [
            (one, CURVE_ORDER + one),
            (one, CURVE_ORDER),
            (one, U256::ZERO),
            (U256::ZERO, one),
            (CURVE_ORDER, one),
            (U256::MAX, one),
        ] {
            let res = assemble(&pack(r, s));
            assert!(
                matches!(res, Err(SignError::Tss(TssError::MalformedResponse(_)))),
                "r={r} s={s} should be rejected but got: {res:?}"
            );
        }
    }

    #[test]
    fn test_top_of_range_s_is_flipped() {
        let signed = assemble(&pack(U256::ONE, CURVE_ORDER - U256::ONE)).unwrap();
        assert_eq!(be_u256(&signed.signature[32..]), U256::ONE);
        assert_eq!(signed.signature.len(), 64);
    }

    #[tokio::test]
    async fn test_missing_envelope_is_transient() {
        let server = StubServer::start(vec![Route::post("/", 200, r#"{"Err":"busy"}"#)]).await;
        let km = TssKeyManager::new(http(), server.url().to_string(), "n".into());

        let err = km.sign(PAYLOAD).await.unwrap_err();
        assert!(!err.is_permanent(), "got {err:?}");
    }
}
