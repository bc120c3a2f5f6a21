//! secp256k1 signing keys in Graphene formats
//!
//! Keys arrive either as WIF strings or as a master password from which the
//! role key is derived. Signatures are the 65-byte compact recoverable form
//! Graphene nodes expect, and must be canonical.

use crate::error::ClientError;
use curator_core::Credential;
use k256::ecdsa::signature::hazmat::RandomizedPrehashSigner;
use k256::ecdsa::{RecoveryId, Signature, SigningKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

const WIF_VERSION: u8 = 0x80;
const WIF_LEN: usize = 51;
/// Offset added to the recovery id for compressed keys
const COMPACT_HEADER: u8 = 27 + 4;
const MAX_SIGN_ATTEMPTS: usize = 256;

pub struct PrivateKey {
    key: SigningKey,
}

impl PrivateKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ClientError> {
        let key = SigningKey::from_slice(bytes)
            .map_err(|_| ClientError::Key("scalar out of range".into()))?;
        Ok(Self { key })
    }

    pub fn from_wif(wif: &str) -> Result<Self, ClientError> {
        let raw = bs58::decode(wif)
            .into_vec()
            .map_err(|e| ClientError::Key(format!("invalid base58: {e}")))?;
        if raw.len() != 37 || raw[0] != WIF_VERSION {
            return Err(ClientError::Key("not a WIF private key".into()));
        }
        let (payload, checksum) = raw.split_at(33);
        if double_sha256(payload)[..4] != *checksum {
            return Err(ClientError::Key("WIF checksum mismatch".into()));
        }
        Self::from_bytes(&payload[1..])
    }

    pub fn to_wif(&self) -> String {
        let mut raw = Vec::with_capacity(37);
        raw.push(WIF_VERSION);
        raw.extend_from_slice(&self.key.to_bytes());
        let checksum = double_sha256(&raw);
        raw.extend_from_slice(&checksum[..4]);
        bs58::encode(raw).into_string()
    }

    /// Role key derived from an account's master password
    pub fn from_login(account: &str, role: &str, password: &str) -> Result<Self, ClientError> {
        let seed = format!("{account}{role}{password}");
        let normalized = seed.split_whitespace().collect::<Vec<_>>().join(" ");
        Self::from_bytes(&Sha256::digest(normalized.as_bytes()))
    }

    /// Key for `credential`, treating WIF-shaped secrets as keys and anything else as a password
    pub fn resolve(credential: &Credential) -> Result<Self, ClientError> {
        let secret = credential.secret.expose().trim();
        if secret.is_empty() {
            return Err(ClientError::Key(format!(
                "no {} secret configured for {}",
                credential.role, credential.account
            )));
        }
        if looks_like_wif(secret) {
            return Self::from_wif(secret);
        }
        Self::from_login(&credential.account, credential.role.as_str(), secret)
    }

    /// Canonical compact signature over a 32-byte digest
    pub fn sign_digest(&self, digest: &[u8; 32]) -> Result<[u8; 65], ClientError> {
        for _ in 0..MAX_SIGN_ATTEMPTS {
            let signature: Signature = self
                .key
                .sign_prehash_with_rng(&mut OsRng, digest)
                .map_err(|e| ClientError::Key(format!("signing failed: {e}")))?;
            let signature = signature.normalize_s().unwrap_or(signature);
            let compact = signature.to_bytes();
            if !is_canonical(&compact) {
                continue;
            }
            let recovery =
                RecoveryId::trial_recovery_from_prehash(self.key.verifying_key(), digest, &signature)
                    .map_err(|e| ClientError::Key(format!("recovery failed: {e}")))?;

            let mut out = [0u8; 65];
            out[0] = COMPACT_HEADER + recovery.to_byte();
            out[1..].copy_from_slice(&compact);
            return Ok(out);
        }
        Err(ClientError::Key("no canonical signature found".into()))
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PrivateKey(<redacted>)")
    }
}

fn looks_like_wif(secret: &str) -> bool {
    secret.len() == WIF_LEN && secret.starts_with('5')
}

fn double_sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(Sha256::digest(data)).into()
}

/// Graphene rejects signatures whose r or s have a high bit or a redundant leading zero
pub(crate) fn is_canonical(compact: &[u8]) -> bool {
    let r = &compact[..32];
    let s = &compact[32..64];
    let half = |v: &[u8]| v[0] & 0x80 == 0 && !(v[0] == 0 && v[1] & 0x80 == 0);
    half(r) && half(s)
}
