//! End-to-end scenarios through the ledger actor

use custody_ledger::{
    spawn_ledger_actor, AccountId, Amount, Config, Error, EventFilter, EventKind, EventPayload,
    Ledger, LedgerHandle, RecordingSink,
};
use rust_decimal::Decimal;
use std::io::Write;
use std::str::FromStr;

const ADMIN: AccountId = AccountId::from_bytes([0xad; 20]);
const ALICE: AccountId = AccountId::from_bytes([0xa1; 20]);
const BOB: AccountId = AccountId::from_bytes([0xb0; 20]);
const SPENDER: AccountId = AccountId::from_bytes([0x5e; 20]);

fn eth(value: &str) -> Amount {
    Amount::from_units(Decimal::from_str(value).unwrap(), 18).unwrap()
}

fn setup() -> (LedgerHandle, RecordingSink) {
    let sink = RecordingSink::new();
    let ledger = Ledger::new(ADMIN).unwrap().with_sink(sink.clone());
    (spawn_ledger_actor(ledger, 64), sink)
}

#[tokio::test]
async fn test_deposit_withdraw_transfer_sequence() {
    let (handle, sink) = setup();

    // Deposit 1.0
    handle.deposit(ALICE, eth("1.0")).await.unwrap();
    assert_eq!(handle.balance_of(ALICE).await.unwrap(), eth("1.0"));

    let events = handle.query_events(EventFilter::all()).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0].payload,
        EventPayload::Deposit {
            account: ALICE,
            amount: eth("1.0"),
        }
    );

    // Withdraw 0.5
    handle.withdraw(ALICE, eth("0.5")).await.unwrap();
    assert_eq!(handle.balance_of(ALICE).await.unwrap(), eth("0.5"));
    assert_eq!(sink.total_released(), eth("0.5").value());

    let events = handle.query_events(EventFilter::all()).await.unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(
        events[0].payload,
        EventPayload::Withdraw {
            account: ALICE,
            amount: eth("0.5"),
        }
    );

    // Transfer 0.3 to Bob
    handle.transfer_to(ALICE, BOB, eth("0.3")).await.unwrap();
    assert_eq!(handle.balance_of(ALICE).await.unwrap(), eth("0.2"));
    assert_eq!(handle.balance_of(BOB).await.unwrap(), eth("0.3"));
    assert_eq!(handle.custody_balance().await.unwrap(), eth("0.5"));

    // Overdraw is rejected without side effects
    let result = handle.withdraw(ALICE, eth("10.0")).await;
    assert!(matches!(result, Err(Error::InsufficientBalance { .. })));
    assert_eq!(handle.balance_of(ALICE).await.unwrap(), eth("0.2"));
    assert_eq!(
        handle.query_events(EventFilter::all()).await.unwrap().len(),
        3
    );
    assert_eq!(sink.releases().len(), 1);

    handle.check_invariants().await.unwrap();
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_approve_overwrites() {
    let (handle, _) = setup();

    handle.approve(ALICE, SPENDER, Amount::new(5)).await.unwrap();
    handle.approve(ALICE, SPENDER, Amount::new(2)).await.unwrap();

    assert_eq!(
        handle.allowance(ALICE, SPENDER).await.unwrap(),
        Amount::new(2)
    );

    let approvals = handle
        .query_events(EventFilter::kind(EventKind::Approval))
        .await
        .unwrap();
    assert_eq!(approvals.len(), 2);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_delegated_spend_consumes_allowance() {
    let (handle, _) = setup();

    handle.deposit(ALICE, Amount::new(100)).await.unwrap();
    handle.approve(ALICE, SPENDER, Amount::new(30)).await.unwrap();
    handle
        .increase_allowance(ALICE, SPENDER, Amount::new(10))
        .await
        .unwrap();

    handle
        .transfer_from(SPENDER, ALICE, BOB, Amount::new(25))
        .await
        .unwrap();
    assert_eq!(handle.balance_of(ALICE).await.unwrap(), Amount::new(75));
    assert_eq!(handle.balance_of(BOB).await.unwrap(), Amount::new(25));
    assert_eq!(
        handle.allowance(ALICE, SPENDER).await.unwrap(),
        Amount::new(15)
    );

    let result = handle
        .transfer_from(SPENDER, ALICE, BOB, Amount::new(16))
        .await;
    assert!(matches!(result, Err(Error::InsufficientAllowance { .. })));

    handle
        .decrease_allowance(ALICE, SPENDER, Amount::new(15))
        .await
        .unwrap();
    assert_eq!(handle.allowance(ALICE, SPENDER).await.unwrap(), Amount::ZERO);

    let involving_bob = handle
        .query_events(EventFilter::all().involving(BOB))
        .await
        .unwrap();
    assert_eq!(involving_bob.len(), 1);
    assert!(matches!(
        involving_bob[0].payload,
        EventPayload::Transfer {
            spender: Some(SPENDER),
            ..
        }
    ));

    handle.check_invariants().await.unwrap();
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_admin_lifecycle() {
    let (handle, _) = setup();

    let result = handle.add_admin(ALICE, BOB).await;
    assert!(matches!(result, Err(Error::Unauthorized(caller)) if caller == ALICE));

    handle.add_admin(ADMIN, ALICE).await.unwrap();
    assert!(handle.is_admin(ALICE).await.unwrap());

    handle.remove_admin(ALICE, ADMIN).await.unwrap();
    assert_eq!(handle.admins().await.unwrap(), vec![ALICE]);

    let result = handle.remove_admin(ALICE, ALICE).await;
    assert!(matches!(result, Err(Error::RoleInvariantViolation(_))));
    assert_eq!(handle.admins().await.unwrap(), vec![ALICE]);

    let ledger = handle.shutdown().await.unwrap();
    assert_eq!(ledger.events().len(), 2);
    ledger.verify_replay().unwrap();
}

#[tokio::test]
async fn test_latest_events_first_with_limit() {
    let (handle, _) = setup();

    for i in 1..=5 {
        handle.deposit(ALICE, Amount::new(i)).await.unwrap();
    }

    let latest = handle
        .query_events(EventFilter::all().limit(2))
        .await
        .unwrap();
    let sequences: Vec<u64> = latest.iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, vec![5, 4]);

    let earlier = handle
        .query_events(EventFilter::all().before(3))
        .await
        .unwrap();
    let sequences: Vec<u64> = earlier.iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, vec![2, 1]);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_ledger_from_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
service_name = "custody-test"
genesis_admin = "{}"

[audit]
sign_events = true
signing_seed = "{}"
"#,
        ADMIN,
        "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60"
    )
    .unwrap();

    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.service_name, "custody-test");
    assert_eq!(config.genesis_admin, Some(ADMIN));

    let ledger = Ledger::from_config(&config).unwrap();
    let public_key = ledger.public_key().unwrap();
    assert_eq!(
        hex::encode(public_key),
        "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a"
    );

    let handle = spawn_ledger_actor(ledger, config.actor.mailbox_capacity);
    let event = handle.deposit(ALICE, Amount::new(1)).await.unwrap();
    assert!(event.verify_signature(&public_key));

    handle.check_invariants().await.unwrap();
    handle.shutdown().await.unwrap();
}
