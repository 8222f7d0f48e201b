//! Error types for the custody ledger
//!
//! Every variant raised by a public operation aborts that operation before
//! any store is touched; callers may resubmit a corrected request.

use crate::types::{AccountId, Amount};
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Zero amount where a positive amount is required, or an unrepresentable display value
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Withdraw or transfer exceeds the source balance
    #[error("Insufficient balance for {account}: available {available}, requested {requested}")]
    InsufficientBalance {
        /// Source account
        account: AccountId,
        /// Current balance
        available: Amount,
        /// Requested amount
        requested: Amount,
    },

    /// Delegated spend exceeds the remaining allowance
    #[error(
        "Insufficient allowance for {spender} on {owner}: available {available}, requested {requested}"
    )]
    InsufficientAllowance {
        /// Owner of the funds
        owner: AccountId,
        /// Delegated spender
        spender: AccountId,
        /// Remaining allowance
        available: Amount,
        /// Requested amount
        requested: Amount,
    },

    /// Null or malformed account identifier
    #[error("Invalid account: {0}")]
    InvalidAccount(String),

    /// Caller lacks admin privilege
    #[error("Unauthorized: {0} is not an admin")]
    Unauthorized(AccountId),

    /// Removal would leave the admin set empty
    #[error("Role invariant violation: {0}")]
    RoleInvariantViolation(String),

    /// The external release step of a withdraw could not complete
    #[error("External release to {account} failed: {reason}")]
    ExternalReleaseFailure {
        /// Destination account
        account: AccountId,
        /// Reason reported by the sink
        reason: String,
    },

    /// Credit would exceed the representable amount
    #[error("Amount overflow: {0}")]
    AmountOverflow(String),

    /// Internal invariant violation (conservation, hash chain, etc.)
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Signature verification failed
    #[error("Signature verification failed: {0}")]
    SignatureError(String),

    /// A signed command names an acting account other than its signer
    #[error("Identity mismatch: command acts as {claimed} but is signed by {signer}")]
    IdentityMismatch {
        /// Acting account named in the command
        claimed: AccountId,
        /// Account derived from the signing key
        signer: AccountId,
    },

    /// A signed command reuses a nonce already seen for its signer
    #[error("Replayed request from {account}: nonce {nonce} not above {last}")]
    ReplayedRequest {
        /// Signing account
        account: AccountId,
        /// Submitted nonce
        nonce: u64,
        /// Highest nonce accepted so far
        last: u64,
    },

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

}

impl Error {
    /// Stable label used in metrics and wire responses
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidAmount(_) => "invalid_amount",
            Error::InsufficientBalance { .. } => "insufficient_balance",
            Error::InsufficientAllowance { .. } => "insufficient_allowance",
            Error::InvalidAccount(_) => "invalid_account",
            Error::Unauthorized(_) => "unauthorized",
            Error::RoleInvariantViolation(_) => "role_invariant_violation",
            Error::ExternalReleaseFailure { .. } => "external_release_failure",
            Error::AmountOverflow(_) => "amount_overflow",
            Error::InvariantViolation(_) => "invariant_violation",
            Error::SignatureError(_) => "signature_error",
            Error::IdentityMismatch { .. } => "identity_mismatch",
            Error::ReplayedRequest { .. } => "replayed_request",
            Error::Concurrency(_) => "concurrency",
            Error::Config(_) => "config",
            Error::Io(_) => "io",
        }
    }
}
