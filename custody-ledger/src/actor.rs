//! Actor-based concurrency for the ledger
//!
//! This module implements the single-writer pattern using Tokio actors:
//! - One task owns the [`Ledger`]; nothing else can reach its stores
//! - The mailbox order is the global total order of operations
//! - Callers await a oneshot reply carrying success or rejection
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │          Callers (server loop, services)              │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │               LedgerHandle (Clone)                    │
//! │         Sends messages to actor mailbox               │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       │ mpsc::channel (bounded)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │              LedgerActor (Single Task)                │
//! │   one message at a time: validate → mutate → log      │
//! └───────────────────────────────────────────────────────┘
//! ```

use crate::{
    events::EventFilter,
    ledger::{Command, Ledger},
    types::{AccountId, Amount, LedgerEvent},
    Error, Result,
};
use tokio::sync::{mpsc, oneshot};

/// Message sent to the ledger actor
#[derive(Debug)]
pub enum LedgerMessage {
    /// Apply a state-changing command
    Submit {
        /// Command to apply
        command: Command,
        /// Reply channel
        response: oneshot::Sender<Result<LedgerEvent>>,
    },

    /// Get balance
    GetBalance {
        /// Account to read
        account: AccountId,
        /// Reply channel
        response: oneshot::Sender<Amount>,
    },

    /// Get allowance
    GetAllowance {
        /// Owner of the funds
        owner: AccountId,
        /// Delegated spender
        spender: AccountId,
        /// Reply channel
        response: oneshot::Sender<Amount>,
    },

    /// Check admin status
    IsAdmin {
        /// Account to read
        account: AccountId,
        /// Reply channel
        response: oneshot::Sender<bool>,
    },

    /// List admins
    GetAdmins {
        /// Reply channel
        response: oneshot::Sender<Vec<AccountId>>,
    },

    /// Get custody total
    GetCustodyBalance {
        /// Reply channel
        response: oneshot::Sender<Amount>,
    },

    /// Query events
    QueryEvents {
        /// Selection criteria
        filter: EventFilter,
        /// Reply channel
        response: oneshot::Sender<Vec<LedgerEvent>>,
    },

    /// Verify invariants and replay
    CheckInvariants {
        /// Reply channel
        response: oneshot::Sender<Result<()>>,
    },

    /// Stop the actor and hand the ledger back
    Shutdown {
        /// Reply channel
        response: oneshot::Sender<Ledger>,
    },
}

/// Actor that processes ledger messages
#[derive(Debug)]
pub struct LedgerActor {
    /// The ledger (sole owner)
    ledger: Ledger,

    /// Mailbox for incoming messages
    mailbox: mpsc::Receiver<LedgerMessage>,
}

impl LedgerActor {
    /// Create new actor
    pub fn new(ledger: Ledger, mailbox: mpsc::Receiver<LedgerMessage>) -> Self {
        Self { ledger, mailbox }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                LedgerMessage::Shutdown { response } => {
                    tracing::info!(events = self.ledger.events().len(), "Ledger actor stopping");
                    let _ = response.send(self.ledger);
                    return;
                }
                msg => self.handle_message(msg),
            }
        }

        tracing::info!("Ledger mailbox closed");
    }

    /// Handle a single message
    fn handle_message(&mut self, msg: LedgerMessage) {
        match msg {
            LedgerMessage::Submit { command, response } => {
                let _ = response.send(self.ledger.apply(command));
            }

            LedgerMessage::GetBalance { account, response } => {
                let _ = response.send(self.ledger.balance_of(&account));
            }

            LedgerMessage::GetAllowance {
                owner,
                spender,
                response,
            } => {
                let _ = response.send(self.ledger.allowance(&owner, &spender));
            }

            LedgerMessage::IsAdmin { account, response } => {
                let _ = response.send(self.ledger.is_admin(&account));
            }

            LedgerMessage::GetAdmins { response } => {
                let _ = response.send(self.ledger.admins());
            }

            LedgerMessage::GetCustodyBalance { response } => {
                let _ = response.send(self.ledger.custody_balance());
            }

            LedgerMessage::QueryEvents { filter, response } => {
                let _ = response.send(self.ledger.query_events(filter).to_vec());
            }

            LedgerMessage::CheckInvariants { response } => {
                let result = self
                    .ledger
                    .check_invariants()
                    .and_then(|_| self.ledger.verify_replay());
                let _ = response.send(result);
            }

            LedgerMessage::Shutdown { .. } => {
                // Handled in main loop
            }
        }
    }
}

/// Handle for sending messages to the actor
#[derive(Debug, Clone)]
pub struct LedgerHandle {
    sender: mpsc::Sender<LedgerMessage>,
}

impl LedgerHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<LedgerMessage>) -> Self {
        Self { sender }
    }

    /// Send a message and await its reply
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> LedgerMessage,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))
    }

    /// Submit a command
    pub async fn submit(&self, command: Command) -> Result<LedgerEvent> {
        self.request(|response| LedgerMessage::Submit { command, response })
            .await?
    }

    /// Deposit
    pub async fn deposit(&self, account: AccountId, amount: Amount) -> Result<LedgerEvent> {
        self.submit(Command::Deposit { account, amount }).await
    }

    /// Withdraw
    pub async fn withdraw(&self, account: AccountId, amount: Amount) -> Result<LedgerEvent> {
        self.submit(Command::Withdraw { account, amount }).await
    }

    /// Internal transfer
    pub async fn transfer_to(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> Result<LedgerEvent> {
        self.submit(Command::Transfer { from, to, amount }).await
    }

    /// Delegated transfer
    pub async fn transfer_from(
        &self,
        spender: AccountId,
        owner: AccountId,
        recipient: AccountId,
        amount: Amount,
    ) -> Result<LedgerEvent> {
        self.submit(Command::TransferFrom {
            spender,
            owner,
            recipient,
            amount,
        })
        .await
    }

    /// Overwrite an allowance
    pub async fn approve(
        &self,
        owner: AccountId,
        spender: AccountId,
        amount: Amount,
    ) -> Result<LedgerEvent> {
        self.submit(Command::Approve {
            owner,
            spender,
            amount,
        })
        .await
    }

    /// Raise an allowance
    pub async fn increase_allowance(
        &self,
        owner: AccountId,
        spender: AccountId,
        amount: Amount,
    ) -> Result<LedgerEvent> {
        self.submit(Command::IncreaseAllowance {
            owner,
            spender,
            amount,
        })
        .await
    }

    /// Lower an allowance
    pub async fn decrease_allowance(
        &self,
        owner: AccountId,
        spender: AccountId,
        amount: Amount,
    ) -> Result<LedgerEvent> {
        self.submit(Command::DecreaseAllowance {
            owner,
            spender,
            amount,
        })
        .await
    }

    /// Grant admin
    pub async fn add_admin(&self, caller: AccountId, target: AccountId) -> Result<LedgerEvent> {
        self.submit(Command::AddAdmin { caller, target }).await
    }

    /// Revoke admin
    pub async fn remove_admin(&self, caller: AccountId, target: AccountId) -> Result<LedgerEvent> {
        self.submit(Command::RemoveAdmin { caller, target }).await
    }

    /// Get balance
    pub async fn balance_of(&self, account: AccountId) -> Result<Amount> {
        self.request(|response| LedgerMessage::GetBalance { account, response })
            .await
    }

    /// Get allowance
    pub async fn allowance(&self, owner: AccountId, spender: AccountId) -> Result<Amount> {
        self.request(|response| LedgerMessage::GetAllowance {
            owner,
            spender,
            response,
        })
        .await
    }

    /// Check admin status
    pub async fn is_admin(&self, account: AccountId) -> Result<bool> {
        self.request(|response| LedgerMessage::IsAdmin { account, response })
            .await
    }

    /// List admins
    pub async fn admins(&self) -> Result<Vec<AccountId>> {
        self.request(|response| LedgerMessage::GetAdmins { response })
            .await
    }

    /// Get custody total
    pub async fn custody_balance(&self) -> Result<Amount> {
        self.request(|response| LedgerMessage::GetCustodyBalance { response })
            .await
    }

    /// Query events, most recent first
    pub async fn query_events(&self, filter: EventFilter) -> Result<Vec<LedgerEvent>> {
        self.request(|response| LedgerMessage::QueryEvents { filter, response })
            .await
    }

    /// Verify invariants and replay equivalence
    pub async fn check_invariants(&self) -> Result<()> {
        self.request(|response| LedgerMessage::CheckInvariants { response })
            .await?
    }

    /// Stop the actor, returning the ledger
    pub async fn shutdown(&self) -> Result<Ledger> {
        self.request(|response| LedgerMessage::Shutdown { response })
            .await
    }
}

/// Spawn the ledger actor
pub fn spawn_ledger_actor(ledger: Ledger, mailbox_capacity: usize) -> LedgerHandle {
    let (tx, rx) = mpsc::channel(mailbox_capacity); // Bounded channel for backpressure
    let actor = LedgerActor::new(ledger, rx);

    tokio::spawn(async move {
        actor.run().await;
    });

    LedgerHandle::new(tx)
}
