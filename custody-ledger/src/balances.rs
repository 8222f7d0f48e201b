//! Balance store: account → held amount
//!
//! Entries are materialized on first credit and never removed; a drained
//! account keeps an explicit zero. Every mutator validates before it writes,
//! so a returned error means the store is untouched.

use crate::{
    types::{AccountId, Amount},
    Error, Result,
};
use std::collections::BTreeMap;

/// Mapping of account to held amount
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BalanceStore {
    balances: BTreeMap<AccountId, Amount>,
}

impl BalanceStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Balance of `account`, zero if never seen
    pub fn get(&self, account: &AccountId) -> Amount {
        self.balances.get(account).copied().unwrap_or(Amount::ZERO)
    }

    /// Check that `amount` can be credited to `account`
    pub fn check_credit(&self, account: &AccountId, amount: Amount) -> Result<Amount> {
        self.get(account).checked_add(amount).ok_or_else(|| {
            Error::AmountOverflow(format!("crediting {amount} to {account}"))
        })
    }

    /// Check that `account` holds at least `amount`
    pub fn check_debit(&self, account: &AccountId, amount: Amount) -> Result<Amount> {
        let available = self.get(account);
        available
            .checked_sub(amount)
            .ok_or(Error::InsufficientBalance {
                account: *account,
                available,
                requested: amount,
            })
    }

    /// Increase `account` by `amount`
    pub fn credit(&mut self, account: &AccountId, amount: Amount) -> Result<()> {
        let updated = self.check_credit(account, amount)?;
        self.balances.insert(*account, updated);
        Ok(())
    }

    /// Decrease `account` by `amount`
    pub fn debit(&mut self, account: &AccountId, amount: Amount) -> Result<()> {
        let updated = self.check_debit(account, amount)?;
        self.balances.insert(*account, updated);
        Ok(())
    }

    /// Check that `amount` can move from `from` to `to`
    pub fn check_move(&self, from: &AccountId, to: &AccountId, amount: Amount) -> Result<()> {
        self.check_debit(from, amount)?;
        if from != to {
            self.check_credit(to, amount)?;
        }
        Ok(())
    }

    /// Move `amount` from `from` to `to`; both sides update or neither does
    pub fn move_funds(&mut self, from: &AccountId, to: &AccountId, amount: Amount) -> Result<()> {
        self.check_move(from, to, amount)?;
        if from == to {
            return Ok(());
        }
        self.debit(from, amount)?;
        self.credit(to, amount)
    }

    /// Sum of all balances
    ///
    /// Bounded by the custody total, which is itself a checked `Amount`.
    pub fn total(&self) -> Amount {
        Amount::new(
            self.balances
                .values()
                .fold(0u128, |acc, amount| acc.saturating_add(amount.value())),
        )
    }

    /// Iterate over materialized accounts in identifier order
    pub fn iter(&self) -> impl Iterator<Item = (&AccountId, &Amount)> {
        self.balances.iter()
    }

    /// Number of materialized accounts
    pub fn len(&self) -> usize {
        self.balances.len()
    }

    /// Whether no account has been materialized
    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(n: u8) -> AccountId {
        AccountId::from_bytes([n; 20])
    }

    #[test]
    fn test_unseen_account_is_zero() {
        let store = BalanceStore::new();
        assert_eq!(store.get(&account(1)), Amount::ZERO);
        assert!(store.is_empty());
    }

    #[test]
    fn test_debit_to_zero_keeps_entry() {
        let mut store = BalanceStore::new();
        store.credit(&account(1), Amount::new(10)).unwrap();
        store.debit(&account(1), Amount::new(10)).unwrap();
        assert_eq!(store.get(&account(1)), Amount::ZERO);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_overdraft_rejected_without_mutation() {
        let mut store = BalanceStore::new();
        store.credit(&account(1), Amount::new(5)).unwrap();
        let before = store.clone();

        let err = store.debit(&account(1), Amount::new(6)).unwrap_err();
        assert!(matches!(err, Error::InsufficientBalance { .. }));
        assert_eq!(store, before);
    }

    #[test]
    fn test_move_funds() {
        let mut store = BalanceStore::new();
        store.credit(&account(1), Amount::new(100)).unwrap();
        store.move_funds(&account(1), &account(2), Amount::new(30)).unwrap();

        assert_eq!(store.get(&account(1)), Amount::new(70));
        assert_eq!(store.get(&account(2)), Amount::new(30));
        assert_eq!(store.total(), Amount::new(100));
    }

    #[test]
    fn test_self_move_is_noop() {
        let mut store = BalanceStore::new();
        store.credit(&account(1), Amount::new(10)).unwrap();
        store.move_funds(&account(1), &account(1), Amount::new(10)).unwrap();
        assert_eq!(store.get(&account(1)), Amount::new(10));
    }

    #[test]
    fn test_credit_overflow_rejected() {
        let mut store = BalanceStore::new();
        store.credit(&account(1), Amount::new(u128::MAX)).unwrap();
        let err = store.credit(&account(1), Amount::new(1)).unwrap_err();
        assert!(matches!(err, Error::AmountOverflow(_)));
        assert_eq!(store.get(&account(1)), Amount::new(u128::MAX));
    }
}
