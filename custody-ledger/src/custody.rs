//! External value release for withdrawals
//!
//! The ledger owns its sink and calls it with `&mut self` held, so a sink
//! cannot call back into the ledger while a withdrawal is in progress.

use crate::types::{AccountId, Amount};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Destination refused or could not accept the release
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ReleaseError(pub String);

/// Receiver of value leaving custody
pub trait ValueSink: Send {
    /// Hand `amount` to the external destination of `to`
    fn release(&mut self, to: &AccountId, amount: Amount) -> Result<(), ReleaseError>;
}

/// Accepts every release
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardSink;

impl ValueSink for DiscardSink {
    fn release(&mut self, to: &AccountId, amount: Amount) -> Result<(), ReleaseError> {
        tracing::debug!(account = %to, %amount, "Released value");
        Ok(())
    }
}

/// A completed release
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    /// Destination account
    pub to: AccountId,
    /// Amount released
    pub amount: Amount,
}

/// Records releases in a shared buffer
///
/// Clones share the buffer, so a caller can keep one clone for inspection
/// after handing the other to the ledger.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    releases: Arc<Mutex<Vec<Release>>>,
}

impl RecordingSink {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Releases so far, in order
    pub fn releases(&self) -> Vec<Release> {
        self.releases.lock().clone()
    }

    /// Sum of all released amounts
    pub fn total_released(&self) -> u128 {
        self.releases
            .lock()
            .iter()
            .fold(0u128, |acc, r| acc.saturating_add(r.amount.value()))
    }
}

impl ValueSink for RecordingSink {
    fn release(&mut self, to: &AccountId, amount: Amount) -> Result<(), ReleaseError> {
        self.releases.lock().push(Release { to: *to, amount });
        Ok(())
    }
}
