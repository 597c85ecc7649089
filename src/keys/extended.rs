//! Extended private key - hierarchical key encoding and fingerprints.
//!
//! Wire format is 77 bytes: version(4) | depth(1) | parent fingerprint(4) |
//! child number(4) | chain code(32) | secret(32). A "bare" key is just the
//! trailing 32 secret bytes; `LifecycleManager` embeds those into a freshly
//! randomized envelope to keep the wire format uniform.

use crate::error::{Result, WalletError};
use bitcoin::secp256k1::{PublicKey, Secp256k1, SecretKey};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256, Sha512};

/// Serialized size of an extended private key.
pub const EXTENDED_KEY_LEN: usize = 77;
/// Size of a bare private key.
pub const SECRET_KEY_LEN: usize = 32;

const VERSION: [u8; 4] = [0x04, 0x88, 0xad, 0xe4];
const MASTER_HMAC_KEY: &[u8] = b"walletd seed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedKey {
    depth: u8,
    parent_fingerprint: [u8; 4],
    child_number: u32,
    chain_code: [u8; 32],
    secret: SecretKey,
}

impl ExtendedKey {
    /// Derive a master key from a seed (HMAC-SHA512 split into secret and
    /// chain code).
    pub fn from_seed(seed: &[u8]) -> Result<Self> {
        let mut mac = Hmac::<Sha512>::new_from_slice(MASTER_HMAC_KEY)
            .map_err(|e| WalletError::KeyFormat(e.to_string()))?;
        mac.update(seed);
        let digest = mac.finalize().into_bytes();

        let secret = SecretKey::from_slice(&digest[..32])
            .map_err(|e| WalletError::KeyFormat(format!("derived secret: {e}")))?;
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&digest[32..]);

        Ok(Self { depth: 0, parent_fingerprint: [0; 4], child_number: 0, chain_code, secret })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != EXTENDED_KEY_LEN {
            return Err(WalletError::KeyFormat(format!(
                "extended key must be {EXTENDED_KEY_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        if bytes[..4] != VERSION {
            return Err(WalletError::KeyFormat("bad version prefix".into()));
        }
        let depth = bytes[4];
        let mut parent_fingerprint = [0u8; 4];
        parent_fingerprint.copy_from_slice(&bytes[5..9]);
        let child_number = u32::from_be_bytes(bytes[9..13].try_into().unwrap());
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&bytes[13..45]);
        let secret = SecretKey::from_slice(&bytes[45..])
            .map_err(|e| WalletError::KeyFormat(format!("secret: {e}")))?;
        Ok(Self { depth, parent_fingerprint, child_number, chain_code, secret })
    }

    pub fn from_hex(hexstr: &str) -> Result<Self> {
        let bytes = hex::decode(hexstr).map_err(|e| WalletError::KeyFormat(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    pub fn to_bytes(&self) -> [u8; EXTENDED_KEY_LEN] {
        let mut out = [0u8; EXTENDED_KEY_LEN];
        out[..4].copy_from_slice(&VERSION);
        out[4] = self.depth;
        out[5..9].copy_from_slice(&self.parent_fingerprint);
        out[9..13].copy_from_slice(&self.child_number.to_be_bytes());
        out[13..45].copy_from_slice(&self.chain_code);
        out[45..].copy_from_slice(&self.secret.secret_bytes());
        out
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn public_key(&self) -> PublicKey {
        let secp = Secp256k1::new();
        self.secret.public_key(&secp)
    }

    /// Fingerprint of the public key: first four bytes of its SHA-256,
    /// big-endian.
    pub fn fingerprint(&self) -> u32 {
        let digest = Sha256::digest(self.public_key().serialize());
        u32::from_be_bytes(digest[..4].try_into().unwrap())
    }
}

/// Generate a fresh 24-word mnemonic from 32 bytes of entropy.
pub fn generate_mnemonic() -> String {
    let entropy: [u8; 32] = rand::random();
    bip39::Mnemonic::from_entropy(&entropy)
        .expect("32 bytes of entropy is a valid mnemonic size")
        .to_string()
}

/// Seed for a 24-word mnemonic. Rejects any other word count.
pub fn seed_from_mnemonic(words: &str) -> Result<[u8; 64]> {
    let mnemonic = bip39::Mnemonic::parse(words)
        .map_err(|e| WalletError::KeyFormat(format!("mnemonic: {e}")))?;
    if mnemonic.word_count() != 24 {
        return Err(WalletError::KeyFormat(format!(
            "expected a 24-word mnemonic, got {} words",
            mnemonic.word_count()
        )));
    }
    Ok(mnemonic.to_seed(""))
}
