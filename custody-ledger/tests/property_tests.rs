//! Property-based tests for ledger invariants
//!
//! These tests use proptest to verify critical invariants over arbitrary
//! operation sequences:
//! - Money conservation: Σ(balances) == Σ(deposits) − Σ(withdrawals)
//! - Atomicity: rejected operations leave every store untouched
//! - Authorization: only admins manage admins; the set never empties
//! - Deterministic replay: the audit log rebuilds the live stores

use custody_ledger::{
    AccountId, Amount, Command, Error, EventFilter, Ledger, ReleaseError, ValueSink,
};
use proptest::prelude::*;

const ACCOUNTS: usize = 4;

/// Account pool; index 0 is the genesis admin
fn account(index: usize) -> AccountId {
    AccountId::from_bytes([index as u8 + 1; 20])
}

/// Rejects every release whose amount is a multiple of 7
struct PickySink;

impl ValueSink for PickySink {
    fn release(&mut self, _to: &AccountId, amount: Amount) -> Result<(), ReleaseError> {
        if amount.value() % 7 == 0 {
            Err(ReleaseError("destination rejected receipt".to_string()))
        } else {
            Ok(())
        }
    }
}

/// Strategy for account selection, occasionally the null account
fn account_strategy() -> impl Strategy<Value = AccountId> {
    prop_oneof![
        10 => (0..ACCOUNTS).prop_map(account),
        1 => Just(AccountId::ZERO),
    ]
}

/// Strategy for amounts, including zero
fn amount_strategy() -> impl Strategy<Value = Amount> {
    (0u128..60).prop_map(Amount::new)
}

/// Strategy for generating commands
fn command_strategy() -> impl Strategy<Value = Command> {
    let a = account_strategy;
    let amt = amount_strategy;
    prop_oneof![
        3 => (a(), amt()).prop_map(|(account, amount)| Command::Deposit { account, amount }),
        2 => (a(), amt()).prop_map(|(account, amount)| Command::Withdraw { account, amount }),
        2 => (a(), a(), amt()).prop_map(|(from, to, amount)| Command::Transfer { from, to, amount }),
        1 => (a(), a(), a(), amt()).prop_map(|(spender, owner, recipient, amount)| {
            Command::TransferFrom { spender, owner, recipient, amount }
        }),
        1 => (a(), a(), amt()).prop_map(|(owner, spender, amount)| Command::Approve { owner, spender, amount }),
        1 => (a(), a(), amt()).prop_map(|(owner, spender, amount)| {
            Command::IncreaseAllowance { owner, spender, amount }
        }),
        1 => (a(), a(), amt()).prop_map(|(owner, spender, amount)| {
            Command::DecreaseAllowance { owner, spender, amount }
        }),
        1 => (a(), a()).prop_map(|(caller, target)| Command::AddAdmin { caller, target }),
        1 => (a(), a()).prop_map(|(caller, target)| Command::RemoveAdmin { caller, target }),
    ]
}

fn create_test_ledger() -> Ledger {
    Ledger::new(account(0)).unwrap().with_sink(PickySink)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: conservation and atomicity hold after every operation
    #[test]
    fn prop_conservation_and_atomicity(commands in prop::collection::vec(command_strategy(), 1..60)) {
        let mut ledger = create_test_ledger();
        let mut deposited: u128 = 0;
        let mut withdrawn: u128 = 0;

        for command in commands {
            let before = ledger.state().clone();
            let log_length = ledger.events().len();

            match ledger.apply(command.clone()) {
                Ok(event) => {
                    prop_assert_eq!(ledger.events().len(), log_length + 1);
                    prop_assert_eq!(event.sequence, log_length as u64 + 1);
                    match command {
                        Command::Deposit { amount, .. } => deposited += amount.value(),
                        Command::Withdraw { amount, .. } => withdrawn += amount.value(),
                        _ => {}
                    }
                }
                Err(_) => {
                    prop_assert_eq!(ledger.state(), &before);
                }
            }

            let total = ledger.state().balances.total().value();
            prop_assert_eq!(total, deposited - withdrawn);
            prop_assert_eq!(ledger.custody_balance().value(), total);
            prop_assert!(!ledger.state().roles.is_empty());
        }

        prop_assert!(ledger.check_invariants().is_ok());
        prop_assert!(ledger.verify_replay().is_ok());
    }

    /// Property: admin management is denied to non-admins in every reachable state
    #[test]
    fn prop_admin_operations_require_admin(commands in prop::collection::vec(command_strategy(), 1..60)) {
        let mut ledger = create_test_ledger();

        for command in commands {
            let (caller, target, removing) = match command {
                Command::AddAdmin { caller, target } => (caller, target, false),
                Command::RemoveAdmin { caller, target } => (caller, target, true),
                other => {
                    let _ = ledger.apply(other);
                    continue;
                }
            };

            let caller_is_admin = ledger.is_admin(&caller);
            let sole_admin = ledger.admins() == vec![target];
            let result = ledger.apply(command);

            if !caller_is_admin {
                prop_assert!(matches!(result, Err(Error::Unauthorized(a)) if a == caller));
            } else if removing && sole_admin {
                prop_assert!(matches!(result, Err(Error::RoleInvariantViolation(_))));
            }
            prop_assert!(!ledger.admins().is_empty());
        }
    }

    /// Property: approve overwrites instead of accumulating
    #[test]
    fn prop_approve_overwrites(amounts in prop::collection::vec(0u128..1_000_000, 1..10)) {
        let mut ledger = create_test_ledger();
        let (owner, spender) = (account(1), account(2));

        for amount in &amounts {
            ledger.approve(owner, spender, Amount::new(*amount)).unwrap();
        }

        prop_assert_eq!(
            ledger.allowance(&owner, &spender),
            Amount::new(*amounts.last().unwrap())
        );
    }

    /// Property: unfiltered queries return every event, newest first
    #[test]
    fn prop_query_descending(commands in prop::collection::vec(command_strategy(), 1..40)) {
        let mut ledger = create_test_ledger();
        for command in commands {
            let _ = ledger.apply(command);
        }

        let sequences: Vec<u64> = ledger
            .query_events(EventFilter::all())
            .iter()
            .map(|e| e.sequence)
            .collect();
        let expected: Vec<u64> = (1..=ledger.events().len() as u64).rev().collect();
        prop_assert_eq!(sequences, expected);
    }

    /// Property: the actor applies commands exactly as the direct ledger does
    #[test]
    fn prop_actor_matches_direct(commands in prop::collection::vec(command_strategy(), 1..30)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let mut direct = create_test_ledger();
            let handle = custody_ledger::spawn_ledger_actor(create_test_ledger(), 8);

            for command in commands {
                let expected = direct.apply(command.clone()).map(|e| e.payload);
                let actual = handle.submit(command).await.map(|e| e.payload);
                match (expected, actual) {
                    (Ok(e), Ok(a)) => prop_assert_eq!(e, a),
                    (Err(e), Err(a)) => prop_assert_eq!(e.code(), a.code()),
                    (e, a) => prop_assert!(false, "diverged: {:?} vs {:?}", e, a),
                }
            }

            let actor_ledger = handle.shutdown().await.unwrap();
            prop_assert_eq!(&actor_ledger.state().balances, &direct.state().balances);
            prop_assert_eq!(&actor_ledger.state().allowances, &direct.state().allowances);
            prop_assert_eq!(&actor_ledger.state().roles, &direct.state().roles);
            Ok(())
        })?;
    }
}
