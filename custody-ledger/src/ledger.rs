//! Main ledger orchestration layer
//!
//! This module ties together the balance, allowance and role stores and the
//! audit log into atomic public operations. Each operation validates every
//! precondition, then mutates, then appends exactly one event. A rejected
//! operation leaves all four stores untouched.
//!
//! # Example
//!
//! ```
//! use custody_ledger::{AccountId, Amount, Ledger};
//!
//! let admin = AccountId::from_bytes([1u8; 20]);
//! let alice = AccountId::from_bytes([2u8; 20]);
//!
//! let mut ledger = Ledger::new(admin)?;
//! ledger.deposit(alice, Amount::new(100))?;
//! ledger.withdraw(alice, Amount::new(40))?;
//!
//! assert_eq!(ledger.balance_of(&alice), Amount::new(60));
//! assert_eq!(ledger.events().len(), 2);
//! # Ok::<(), custody_ledger::Error>(())
//! ```

use crate::{
    allowances::AllowanceRegistry,
    balances::BalanceStore,
    crypto::KeyPair,
    custody::{DiscardSink, ValueSink},
    events::{EventFilter, EventLog, EventQuery},
    metrics::Metrics,
    replay,
    roles::RoleRegistry,
    types::{AccountId, Amount, EventPayload, LedgerEvent},
    Config, Error, Result,
};
use serde::{Deserialize, Serialize};

/// Every store the ledger owns, as one aggregate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerState {
    /// Account balances
    pub balances: BalanceStore,

    /// Delegated-spend limits
    pub allowances: AllowanceRegistry,

    /// Admin set
    pub roles: RoleRegistry,

    /// Audit log
    pub events: EventLog,

    /// Value held in custody on behalf of all accounts
    pub custody: Amount,
}

impl LedgerState {
    /// Fresh state with a single admin
    pub fn new(genesis_admin: AccountId) -> Self {
        Self {
            balances: BalanceStore::new(),
            allowances: AllowanceRegistry::new(),
            roles: RoleRegistry::new(genesis_admin),
            events: EventLog::new(),
            custody: Amount::ZERO,
        }
    }
}

/// State-changing request, as submitted by a caller
///
/// The acting account ([`Command::actor`]) is trusted as given. Callers
/// outside the process must come through [`crate::auth::Authenticator`],
/// which only admits commands signed by the key behind that account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    /// Credit `amount` received into custody
    Deposit {
        /// Caller
        account: AccountId,
        /// Amount
        amount: Amount,
    },
    /// Debit and release `amount`
    Withdraw {
        /// Caller
        account: AccountId,
        /// Amount
        amount: Amount,
    },
    /// Move `amount` between accounts
    Transfer {
        /// Caller
        from: AccountId,
        /// Recipient
        to: AccountId,
        /// Amount
        amount: Amount,
    },
    /// Spend from `owner` using an allowance
    TransferFrom {
        /// Caller
        spender: AccountId,
        /// Owner of the funds
        owner: AccountId,
        /// Recipient
        recipient: AccountId,
        /// Amount
        amount: Amount,
    },
    /// Overwrite an allowance
    Approve {
        /// Caller
        owner: AccountId,
        /// Delegated spender
        spender: AccountId,
        /// New allowance
        amount: Amount,
    },
    /// Raise an allowance by a delta
    IncreaseAllowance {
        /// Caller
        owner: AccountId,
        /// Delegated spender
        spender: AccountId,
        /// Delta
        amount: Amount,
    },
    /// Lower an allowance by a delta
    DecreaseAllowance {
        /// Caller
        owner: AccountId,
        /// Delegated spender
        spender: AccountId,
        /// Delta
        amount: Amount,
    },
    /// Grant admin
    AddAdmin {
        /// Caller
        caller: AccountId,
        /// New admin
        target: AccountId,
    },
    /// Revoke admin
    RemoveAdmin {
        /// Caller
        caller: AccountId,
        /// Admin to remove
        target: AccountId,
    },
}

impl Command {
    /// Account on whose authority the command runs
    pub fn actor(&self) -> AccountId {
        match self {
            Command::Deposit { account, .. } | Command::Withdraw { account, .. } => *account,
            Command::Transfer { from, .. } => *from,
            Command::TransferFrom { spender, .. } => *spender,
            Command::Approve { owner, .. }
            | Command::IncreaseAllowance { owner, .. }
            | Command::DecreaseAllowance { owner, .. } => *owner,
            Command::AddAdmin { caller, .. } | Command::RemoveAdmin { caller, .. } => *caller,
        }
    }
}

/// Main ledger interface
pub struct Ledger {
    /// Live stores
    state: LedgerState,

    /// First admin, needed to replay the log
    genesis_admin: AccountId,

    /// Destination for withdrawn value
    sink: Box<dyn ValueSink>,

    /// Key pair for signing events (if enabled)
    keypair: Option<KeyPair>,

    /// Metrics (if enabled)
    metrics: Option<Metrics>,
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("state", &self.state)
            .field("genesis_admin", &self.genesis_admin)
            .field("signing", &self.keypair.is_some())
            .finish_non_exhaustive()
    }
}

impl Ledger {
    /// Create a ledger whose only admin is `genesis_admin`
    pub fn new(genesis_admin: AccountId) -> Result<Self> {
        genesis_admin.require_non_zero("genesis admin")?;

        Ok(Self {
            state: LedgerState::new(genesis_admin),
            genesis_admin,
            sink: Box::new(DiscardSink),
            keypair: None,
            metrics: None,
        })
    }

    /// Create a ledger from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let genesis_admin = config
            .genesis_admin
            .ok_or_else(|| Error::Config("genesis_admin is required".to_string()))?;

        let mut ledger = Self::new(genesis_admin)?;

        if config.audit.sign_events {
            let keypair = match &config.audit.signing_seed {
                Some(seed) => KeyPair::from_hex_seed(seed)?,
                None => KeyPair::generate(),
            };
            ledger = ledger.with_keypair(keypair);
        }

        Ok(ledger)
    }

    /// Set the destination for withdrawn value
    pub fn with_sink(mut self, sink: impl ValueSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    /// Set signing key pair
    pub fn with_keypair(mut self, keypair: KeyPair) -> Self {
        self.keypair = Some(keypair);
        self
    }

    /// Attach metrics
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    // Operations

    /// Apply a submitted command
    pub fn apply(&mut self, command: Command) -> Result<LedgerEvent> {
        match command {
            Command::Deposit { account, amount } => self.deposit(account, amount),
            Command::Withdraw { account, amount } => self.withdraw(account, amount),
            Command::Transfer { from, to, amount } => self.transfer_to(from, to, amount),
            Command::TransferFrom {
                spender,
                owner,
                recipient,
                amount,
            } => self.transfer_from(spender, owner, recipient, amount),
            Command::Approve {
                owner,
                spender,
                amount,
            } => self.approve(owner, spender, amount),
            Command::IncreaseAllowance {
                owner,
                spender,
                amount,
            } => self.increase_allowance(owner, spender, amount),
            Command::DecreaseAllowance {
                owner,
                spender,
                amount,
            } => self.decrease_allowance(owner, spender, amount),
            Command::AddAdmin { caller, target } => self.add_admin(caller, target),
            Command::RemoveAdmin { caller, target } => self.remove_admin(caller, target),
        }
    }

    /// Credit `amount` to `account`; the matching inflow enters custody in the same step
    pub fn deposit(&mut self, account: AccountId, amount: Amount) -> Result<LedgerEvent> {
        self.execute("deposit", |ledger| {
            amount.require_positive()?;
            account.require_non_zero("depositor")?;
            let custody = ledger
                .state
                .custody
                .checked_add(amount)
                .ok_or_else(|| Error::AmountOverflow(format!("custody total plus {amount}")))?;
            ledger.state.balances.check_credit(&account, amount)?;

            ledger.state.balances.credit(&account, amount)?;
            ledger.state.custody = custody;

            Ok(EventPayload::Deposit { account, amount })
        })
    }

    /// Debit `amount` from `account`, then release it externally
    ///
    /// The debit happens before the release. If the release fails the debit
    /// is restored and no event is recorded.
    pub fn withdraw(&mut self, account: AccountId, amount: Amount) -> Result<LedgerEvent> {
        self.execute("withdraw", |ledger| {
            amount.require_positive()?;
            account.require_non_zero("withdrawer")?;
            ledger.state.balances.check_debit(&account, amount)?;
            let previous_custody = ledger.state.custody;
            let custody = previous_custody.checked_sub(amount).ok_or_else(|| {
                Error::InvariantViolation(format!(
                    "custody total {previous_custody} below balance of {account}"
                ))
            })?;

            ledger.state.balances.debit(&account, amount)?;
            ledger.state.custody = custody;

            if let Err(e) = ledger.sink.release(&account, amount) {
                ledger.state.balances.credit(&account, amount)?;
                ledger.state.custody = previous_custody;
                tracing::error!(%account, %amount, reason = %e, "External release failed, debit restored");
                return Err(Error::ExternalReleaseFailure {
                    account,
                    reason: e.to_string(),
                });
            }

            Ok(EventPayload::Withdraw { account, amount })
        })
    }

    /// Move `amount` from `from` to `to`
    pub fn transfer_to(
        &mut self,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> Result<LedgerEvent> {
        self.execute("transfer", |ledger| {
            amount.require_positive()?;
            to.require_non_zero("recipient")?;
            ledger.state.balances.check_move(&from, &to, amount)?;

            ledger.state.balances.move_funds(&from, &to, amount)?;

            Ok(EventPayload::Transfer {
                from,
                to,
                amount,
                spender: None,
            })
        })
    }

    /// Move `amount` out of `owner` on its behalf, consuming `spender`'s allowance
    pub fn transfer_from(
        &mut self,
        spender: AccountId,
        owner: AccountId,
        recipient: AccountId,
        amount: Amount,
    ) -> Result<LedgerEvent> {
        self.execute("transfer_from", |ledger| {
            amount.require_positive()?;
            recipient.require_non_zero("recipient")?;
            ledger.state.allowances.check_decrease(&owner, &spender, amount)?;
            ledger.state.balances.check_move(&owner, &recipient, amount)?;

            ledger.state.allowances.decrease(&owner, &spender, amount)?;
            ledger.state.balances.move_funds(&owner, &recipient, amount)?;

            Ok(EventPayload::Transfer {
                from: owner,
                to: recipient,
                amount,
                spender: Some(spender),
            })
        })
    }

    /// Overwrite the allowance of `spender` on `owner`
    ///
    /// Not checked against the owner's balance; enforcement happens at spend time.
    pub fn approve(
        &mut self,
        owner: AccountId,
        spender: AccountId,
        amount: Amount,
    ) -> Result<LedgerEvent> {
        self.execute("approve", |ledger| {
            spender.require_non_zero("spender")?;

            ledger.state.allowances.approve(&owner, &spender, amount);

            Ok(EventPayload::Approval {
                owner,
                spender,
                amount,
            })
        })
    }

    /// Raise the allowance of `spender` on `owner` by `delta`
    pub fn increase_allowance(
        &mut self,
        owner: AccountId,
        spender: AccountId,
        delta: Amount,
    ) -> Result<LedgerEvent> {
        self.execute("increase_allowance", |ledger| {
            delta.require_positive()?;
            spender.require_non_zero("spender")?;

            let amount = ledger.state.allowances.increase(&owner, &spender, delta)?;

            Ok(EventPayload::Approval {
                owner,
                spender,
                amount,
            })
        })
    }

    /// Lower the allowance of `spender` on `owner` by `delta`
    pub fn decrease_allowance(
        &mut self,
        owner: AccountId,
        spender: AccountId,
        delta: Amount,
    ) -> Result<LedgerEvent> {
        self.execute("decrease_allowance", |ledger| {
            delta.require_positive()?;
            spender.require_non_zero("spender")?;

            let amount = ledger.state.allowances.decrease(&owner, &spender, delta)?;

            Ok(EventPayload::Approval {
                owner,
                spender,
                amount,
            })
        })
    }

    /// Grant admin to `target`; re-granting is accepted
    pub fn add_admin(&mut self, caller: AccountId, target: AccountId) -> Result<LedgerEvent> {
        self.execute("add_admin", |ledger| {
            ledger.state.roles.authorize(&caller)?;
            target.require_non_zero("admin")?;

            if !ledger.state.roles.add(target) {
                tracing::debug!(%target, "Already an admin");
            }

            Ok(EventPayload::AdminAdded {
                admin: target,
                by: caller,
            })
        })
    }

    /// Revoke admin from `target`; fails if it would leave no admin
    pub fn remove_admin(&mut self, caller: AccountId, target: AccountId) -> Result<LedgerEvent> {
        self.execute("remove_admin", |ledger| {
            ledger.state.roles.authorize(&caller)?;
            ledger.state.roles.check_remove(&target)?;

            if !ledger.state.roles.remove(&target)? {
                tracing::debug!(%target, "Not an admin");
            }

            Ok(EventPayload::AdminRemoved {
                admin: target,
                by: caller,
            })
        })
    }

    /// Run one operation and record its outcome
    fn execute<F>(&mut self, operation: &'static str, apply: F) -> Result<LedgerEvent>
    where
        F: FnOnce(&mut Self) -> Result<EventPayload>,
    {
        match apply(self) {
            Ok(payload) => {
                let event = self
                    .state
                    .events
                    .append(payload, self.keypair.as_ref())
                    .clone();

                tracing::info!(
                    operation,
                    sequence = event.sequence,
                    kind = %event.kind(),
                    "Operation applied"
                );

                if let Some(metrics) = &self.metrics {
                    metrics.record_accepted(event.kind(), self.state.events.len(), self.state.custody);
                }

                Ok(event)
            }
            Err(e) => {
                tracing::warn!(operation, code = e.code(), error = %e, "Operation rejected");

                if let Some(metrics) = &self.metrics {
                    metrics.record_rejected(e.code());
                }

                Err(e)
            }
        }
    }

    // Reads

    /// Balance of `account`, zero if never seen
    pub fn balance_of(&self, account: &AccountId) -> Amount {
        self.state.balances.get(account)
    }

    /// Remaining allowance of `spender` on `owner`
    pub fn allowance(&self, owner: &AccountId, spender: &AccountId) -> Amount {
        self.state.allowances.get(owner, spender)
    }

    /// Whether `account` is an admin
    pub fn is_admin(&self, account: &AccountId) -> bool {
        self.state.roles.is_admin(account)
    }

    /// Admins in identifier order
    pub fn admins(&self) -> Vec<AccountId> {
        self.state.roles.admins().copied().collect()
    }

    /// Value currently held in custody
    pub fn custody_balance(&self) -> Amount {
        self.state.custody
    }

    /// The audit log
    pub fn events(&self) -> &EventLog {
        &self.state.events
    }

    /// Matching events, most recent first
    pub fn query_events(&self, filter: EventFilter) -> EventQuery<'_> {
        self.state.events.query(filter)
    }

    /// All stores, read-only
    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    /// First admin
    pub fn genesis_admin(&self) -> AccountId {
        self.genesis_admin
    }

    /// Public key that signs events, if signing is enabled
    pub fn public_key(&self) -> Option<[u8; 32]> {
        self.keypair.as_ref().map(KeyPair::public_key)
    }

    // Verification

    /// Check conservation, admin non-emptiness and audit log integrity
    pub fn check_invariants(&self) -> Result<()> {
        let total = self.state.balances.total();
        if total != self.state.custody {
            return Err(Error::InvariantViolation(format!(
                "Σ balances {} != custody {}",
                total, self.state.custody
            )));
        }

        if self.state.roles.is_empty() {
            return Err(Error::InvariantViolation("Admin set is empty".to_string()));
        }

        let public_key = self.public_key();
        self.state.events.verify_chain(public_key.as_ref())
    }

    /// Rebuild the stores from the audit log and compare with the live state
    pub fn verify_replay(&self) -> Result<()> {
        let snapshot = replay::replay(self.genesis_admin, self.state.events.as_slice())?;

        if snapshot.balances != self.state.balances {
            return Err(Error::InvariantViolation(
                "Replayed balances differ from live state".to_string(),
            ));
        }
        if snapshot.allowances != self.state.allowances {
            return Err(Error::InvariantViolation(
                "Replayed allowances differ from live state".to_string(),
            ));
        }
        if snapshot.roles != self.state.roles {
            return Err(Error::InvariantViolation(
                "Replayed admin set differs from live state".to_string(),
            ));
        }
        if snapshot.custody != self.state.custody {
            return Err(Error::InvariantViolation(
                "Replayed custody total differs from live state".to_string(),
            ));
        }

        Ok(())
    }
}
