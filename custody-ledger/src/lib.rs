//! Custody Ledger
//!
//! Holds deposited value on behalf of accounts, lets owners withdraw or move
//! it, delegate spending through allowances, and restricts role management
//! to an admin set.
//!
//! # Architecture
//!
//! - **Explicit State**: Balances, allowances, roles and the audit log live
//!   in one aggregate owned by [`Ledger`]
//! - **Single Writer**: One actor task applies operations in mailbox order
//! - **Hash Chain**: Every accepted operation appends one chained, optionally
//!   signed, audit record
//! - **Replay**: The audit log alone rebuilds the live stores
//! - **Signed Requests**: Outside callers act only as the account derived
//!   from the key that signed the command
//!
//! # Invariants
//!
//! - Money conservation: Σ(balances) == Σ(deposits) − Σ(withdrawals) == custody
//! - Non-negativity: balances and allowances are unsigned and checked
//! - Atomicity: a rejected operation leaves every store untouched
//! - The admin set is never empty

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod actor;
pub mod allowances;
pub mod auth;
pub mod balances;
pub mod config;
pub mod crypto;
pub mod custody;
pub mod error;
pub mod events;
pub mod ledger;
pub mod metrics;
pub mod replay;
pub mod roles;
pub mod types;

// Re-exports
pub use actor::{spawn_ledger_actor, LedgerHandle};
pub use auth::{Authenticator, SignedCommand};
pub use config::Config;
pub use crypto::KeyPair;
pub use custody::{DiscardSink, RecordingSink, ReleaseError, ValueSink};
pub use error::{Error, Result};
pub use events::{EventFilter, EventLog, EventQuery};
pub use ledger::{Command, Ledger, LedgerState};
pub use types::{AccountId, Amount, EventKind, EventPayload, LedgerEvent};
