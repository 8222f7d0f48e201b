//! Request authentication
//!
//! A command from outside the process travels as a [`SignedCommand`]: the
//! command, a nonce, the signer's Ed25519 public key and a signature over
//! both. The [`Authenticator`] admits it only if
//! - the signature verifies,
//! - the account derived from the key is the command's acting account,
//! - the nonce is above every nonce already accepted from that account.

use crate::{
    crypto::{self, KeyPair},
    ledger::Command,
    types::{AccountId, Signature},
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Domain tag mixed into every signed message
const COMMAND_DOMAIN: &str = "custody-ledger/command/v1";

/// Command with proof of who sent it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedCommand {
    /// The request
    pub command: Command,

    /// Strictly increasing per signer
    pub nonce: u64,

    /// Hex-encoded Ed25519 public key
    pub public_key: String,

    /// Hex-encoded Ed25519 signature over [`SignedCommand::message`]
    pub signature: String,
}

impl SignedCommand {
    /// Sign `command` with `keypair`
    pub fn sign(command: Command, nonce: u64, keypair: &KeyPair) -> Self {
        let signature = keypair.sign(&Self::message(&command, nonce));

        Self {
            command,
            nonce,
            public_key: hex::encode(keypair.public_key()),
            signature: hex::encode(signature.as_bytes()),
        }
    }

    /// Bytes covered by the signature
    pub fn message(command: &Command, nonce: u64) -> Vec<u8> {
        bincode::serialize(&(COMMAND_DOMAIN, nonce, command)).expect("serialization cannot fail")
    }

    /// Check the signature and return the signing account
    pub fn verify(&self) -> Result<AccountId> {
        let mut public_key = [0u8; 32];
        hex::decode_to_slice(&self.public_key, &mut public_key)
            .map_err(|e| Error::SignatureError(format!("Malformed public key: {}", e)))?;

        let mut signature = [0u8; 64];
        hex::decode_to_slice(&self.signature, &mut signature)
            .map_err(|e| Error::SignatureError(format!("Malformed signature: {}", e)))?;

        let message = Self::message(&self.command, self.nonce);
        if !Signature::from_bytes(signature).verify(&message, &public_key) {
            return Err(Error::SignatureError(
                "signature does not match command".to_string(),
            ));
        }

        let signer = crypto::account_id(&public_key);
        let claimed = self.command.actor();
        if claimed != signer {
            return Err(Error::IdentityMismatch { claimed, signer });
        }

        Ok(signer)
    }
}

/// Admits signed commands, rejecting replays
#[derive(Debug, Default)]
pub struct Authenticator {
    /// Highest accepted nonce per account
    nonces: HashMap<AccountId, u64>,
}

impl Authenticator {
    /// Create with no accepted nonces
    pub fn new() -> Self {
        Self::default()
    }

    /// Verify `signed` and hand back its command
    ///
    /// The nonce is consumed even if the ledger later rejects the command.
    pub fn authenticate(&mut self, signed: SignedCommand) -> Result<Command> {
        let account = signed.verify()?;

        if let Some(&last) = self.nonces.get(&account) {
            if signed.nonce <= last {
                return Err(Error::ReplayedRequest {
                    account,
                    nonce: signed.nonce,
                    last,
                });
            }
        }

        self.nonces.insert(account, signed.nonce);
        tracing::debug!(%account, nonce = signed.nonce, "Command authenticated");

        Ok(signed.command)
    }

    /// Highest accepted nonce for `account`
    pub fn last_nonce(&self, account: &AccountId) -> Option<u64> {
        self.nonces.get(account).copied()
    }
}
