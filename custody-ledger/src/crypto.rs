//! Cryptographic operations for the audit log
//!
//! This module provides:
//! - Ed25519 key pairs for signing event hashes
//! - SHA-256 hashing of canonical event bytes
//! - Hex seed parsing for configured signing keys
//! - Account ids derived from public keys

use crate::{
    types::{AccountId, Signature},
    Error, Result,
};
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use sha2::{Digest, Sha256};

/// Ed25519 key pair for signing
#[derive(Debug, Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        Self::from_seed(&rand::random::<[u8; 32]>())
    }

    /// Create from seed (32 bytes) - deterministic generation
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        let verifying_key = signing_key.verifying_key();

        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Create from a 64-character hex seed
    pub fn from_hex_seed(seed: &str) -> Result<Self> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(seed.trim(), &mut bytes)
            .map_err(|e| Error::Config(format!("Invalid signing seed: {}", e)))?;
        Ok(Self::from_seed(&bytes))
    }

    /// Get public key bytes
    pub fn public_key(&self) -> [u8; 32] {
        self.verifying_key.to_bytes()
    }

    /// Sign a message
    pub fn sign(&self, message: &[u8]) -> Signature {
        let signature = self.signing_key.sign(message);
        Signature::from_bytes(signature.to_bytes())
    }

    /// Account controlled by this key pair
    pub fn account_id(&self) -> AccountId {
        account_id(&self.public_key())
    }
}

/// Account controlled by `public_key`: the last 20 bytes of its SHA-256
pub fn account_id(public_key: &[u8; 32]) -> AccountId {
    let digest = hash_bytes(public_key);
    let mut bytes = [0u8; AccountId::LEN];
    bytes.copy_from_slice(&digest[32 - AccountId::LEN..]);
    AccountId::from_bytes(bytes)
}

/// Hash an event using SHA-256
///
/// Covers sequence, id, payload, timestamp and the previous hash, so the
/// log forms a chain.
pub fn hash_event(event: &crate::types::LedgerEvent) -> [u8; 32] {
    hash_bytes(&event.canonical_bytes())
}

/// Hash arbitrary bytes using SHA-256
pub fn hash_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}
