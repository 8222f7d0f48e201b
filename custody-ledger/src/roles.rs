//! Role registry: the set of admin accounts
//!
//! Seeded with exactly one admin and never allowed to become empty.

use crate::{types::AccountId, Error, Result};
use std::collections::BTreeSet;

/// Set of accounts with admin privilege
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRegistry {
    admins: BTreeSet<AccountId>,
}

impl RoleRegistry {
    /// Seed the registry with its first admin
    pub fn new(genesis_admin: AccountId) -> Self {
        Self {
            admins: BTreeSet::from([genesis_admin]),
        }
    }

    /// Whether `account` is an admin
    pub fn is_admin(&self, account: &AccountId) -> bool {
        self.admins.contains(account)
    }

    /// Capability check for privileged calls
    pub fn authorize(&self, caller: &AccountId) -> Result<()> {
        if self.is_admin(caller) {
            Ok(())
        } else {
            Err(Error::Unauthorized(*caller))
        }
    }

    /// Add `target`; returns false if it was already an admin
    pub fn add(&mut self, target: AccountId) -> bool {
        self.admins.insert(target)
    }

    /// Check that removing `target` leaves at least one admin
    pub fn check_remove(&self, target: &AccountId) -> Result<()> {
        if self.admins.len() == 1 && self.is_admin(target) {
            return Err(Error::RoleInvariantViolation(format!(
                "{target} is the last remaining admin"
            )));
        }
        Ok(())
    }

    /// Remove `target`; returns false if it was not an admin
    pub fn remove(&mut self, target: &AccountId) -> Result<bool> {
        self.check_remove(target)?;
        Ok(self.admins.remove(target))
    }

    /// Admins in identifier order
    pub fn admins(&self) -> impl Iterator<Item = &AccountId> {
        self.admins.iter()
    }

    /// Number of admins
    pub fn len(&self) -> usize {
        self.admins.len()
    }

    /// Always false once constructed; kept for the invariant check
    pub fn is_empty(&self) -> bool {
        self.admins.is_empty()
    }
}
