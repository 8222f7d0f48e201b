//! Historical reconstruction from the audit log
//!
//! The live stores are authoritative; this is for observers that only hold
//! the event stream, and for cross-checking the live state against it.

use crate::{
    allowances::AllowanceRegistry,
    balances::BalanceStore,
    roles::RoleRegistry,
    types::{AccountId, Amount, EventPayload, LedgerEvent},
    Error, Result,
};

/// Stores rebuilt from events
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Balances
    pub balances: BalanceStore,
    /// Allowances
    pub allowances: AllowanceRegistry,
    /// Admin set
    pub roles: RoleRegistry,
    /// Custody total
    pub custody: Amount,
    /// Sequence of the last applied event (0 when empty)
    pub sequence: u64,
}

impl Snapshot {
    /// Empty snapshot seeded with the first admin
    pub fn genesis(genesis_admin: AccountId) -> Self {
        Self {
            balances: BalanceStore::new(),
            allowances: AllowanceRegistry::new(),
            roles: RoleRegistry::new(genesis_admin),
            custody: Amount::ZERO,
            sequence: 0,
        }
    }

    /// Apply one event
    ///
    /// Events must arrive in ascending, gap-free sequence order.
    pub fn apply_event(&mut self, event: &LedgerEvent) -> Result<()> {
        if event.sequence != self.sequence + 1 {
            return Err(Error::InvariantViolation(format!(
                "Replay expected sequence {}, found {}",
                self.sequence + 1,
                event.sequence
            )));
        }

        match &event.payload {
            EventPayload::Deposit { account, amount } => {
                self.balances.credit(account, *amount)?;
                self.custody = self.custody.checked_add(*amount).ok_or_else(|| {
                    Error::AmountOverflow(format!("replaying sequence {}", event.sequence))
                })?;
            }
            EventPayload::Withdraw { account, amount } => {
                self.balances.debit(account, *amount)?;
                self.custody = self.custody.checked_sub(*amount).ok_or_else(|| {
                    Error::InvariantViolation(format!(
                        "custody underflow at sequence {}",
                        event.sequence
                    ))
                })?;
            }
            EventPayload::Transfer {
                from,
                to,
                amount,
                spender,
            } => {
                if let Some(spender) = spender {
                    self.allowances.decrease(from, spender, *amount)?;
                }
                self.balances.move_funds(from, to, *amount)?;
            }
            EventPayload::Approval {
                owner,
                spender,
                amount,
            } => {
                self.allowances.approve(owner, spender, *amount);
            }
            EventPayload::AdminAdded { admin, .. } => {
                self.roles.add(*admin);
            }
            EventPayload::AdminRemoved { admin, .. } => {
                self.roles.remove(admin)?;
            }
        }

        self.sequence = event.sequence;
        Ok(())
    }
}

/// Rebuild stores from `events`, oldest first
pub fn replay<'a>(
    genesis_admin: AccountId,
    events: impl IntoIterator<Item = &'a LedgerEvent>,
) -> Result<Snapshot> {
    let mut snapshot = Snapshot::genesis(genesis_admin);
    for event in events {
        snapshot.apply_event(event)?;
    }
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventLog;

    const ADMIN: AccountId = AccountId::from_bytes([0xad; 20]);
    const ALICE: AccountId = AccountId::from_bytes([0xa1; 20]);
    const BOB: AccountId = AccountId::from_bytes([0xb0; 20]);

    #[test]
    fn test_replay_rebuilds_balances() {
        let mut log = EventLog::new();
        log.append(
            EventPayload::Deposit {
                account: ALICE,
                amount: Amount::new(10),
            },
            None,
        );
        log.append(
            EventPayload::Transfer {
                from: ALICE,
                to: BOB,
                amount: Amount::new(4),
                spender: None,
            },
            None,
        );
        log.append(
            EventPayload::Withdraw {
                account: BOB,
                amount: Amount::new(1),
            },
            None,
        );

        let snapshot = replay(ADMIN, log.as_slice()).unwrap();
        assert_eq!(snapshot.balances.get(&ALICE), Amount::new(6));
        assert_eq!(snapshot.balances.get(&BOB), Amount::new(3));
        assert_eq!(snapshot.custody, Amount::new(9));
        assert_eq!(snapshot.sequence, 3);
    }

    #[test]
    fn test_replay_rejects_gaps() {
        let mut log = EventLog::new();
        log.append(
            EventPayload::AdminAdded {
                admin: ALICE,
                by: ADMIN,
            },
            None,
        );
        log.append(
            EventPayload::AdminAdded {
                admin: BOB,
                by: ADMIN,
            },
            None,
        );

        let skipped = log.as_slice().iter().skip(1);
        assert!(matches!(
            replay(ADMIN, skipped),
            Err(Error::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_replay_rejects_impossible_withdraw() {
        let mut log = EventLog::new();
        log.append(
            EventPayload::Withdraw {
                account: ALICE,
                amount: Amount::new(1),
            },
            None,
        );

        assert!(matches!(
            replay(ADMIN, log.as_slice()),
            Err(Error::InsufficientBalance { .. })
        ));
    }
}
