//! Allowance registry: (owner, spender) → delegated spend limit
//!
//! `approve` overwrites. The delta forms exist because an overwrite racing
//! an in-flight spend of the old allowance can let the spender use both.

use crate::{
    types::{AccountId, Amount},
    Error, Result,
};
use std::collections::BTreeMap;

/// Delegated-spend limits keyed by (owner, spender)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowanceRegistry {
    allowances: BTreeMap<(AccountId, AccountId), Amount>,
}

impl AllowanceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Remaining allowance, zero if never approved
    pub fn get(&self, owner: &AccountId, spender: &AccountId) -> Amount {
        self.allowances
            .get(&(*owner, *spender))
            .copied()
            .unwrap_or(Amount::ZERO)
    }

    /// Overwrite the allowance
    pub fn approve(&mut self, owner: &AccountId, spender: &AccountId, amount: Amount) {
        self.allowances.insert((*owner, *spender), amount);
    }

    /// Allowance after adding `delta`
    pub fn check_increase(
        &self,
        owner: &AccountId,
        spender: &AccountId,
        delta: Amount,
    ) -> Result<Amount> {
        self.get(owner, spender).checked_add(delta).ok_or_else(|| {
            Error::AmountOverflow(format!("allowance of {spender} on {owner}"))
        })
    }

    /// Allowance after removing `amount`
    pub fn check_decrease(
        &self,
        owner: &AccountId,
        spender: &AccountId,
        amount: Amount,
    ) -> Result<Amount> {
        let available = self.get(owner, spender);
        available
            .checked_sub(amount)
            .ok_or(Error::InsufficientAllowance {
                owner: *owner,
                spender: *spender,
                available,
                requested: amount,
            })
    }

    /// Add `delta` to the allowance, returning the new value
    pub fn increase(
        &mut self,
        owner: &AccountId,
        spender: &AccountId,
        delta: Amount,
    ) -> Result<Amount> {
        let updated = self.check_increase(owner, spender, delta)?;
        self.approve(owner, spender, updated);
        Ok(updated)
    }

    /// Remove `amount` from the allowance, returning the new value
    ///
    /// Used both for explicit decreases and for consuming a delegated spend.
    pub fn decrease(
        &mut self,
        owner: &AccountId,
        spender: &AccountId,
        amount: Amount,
    ) -> Result<Amount> {
        let updated = self.check_decrease(owner, spender, amount)?;
        self.approve(owner, spender, updated);
        Ok(updated)
    }

    /// Iterate over all recorded allowances
    pub fn iter(&self) -> impl Iterator<Item = (&(AccountId, AccountId), &Amount)> {
        self.allowances.iter()
    }
}
