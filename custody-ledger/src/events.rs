//! Event log: append-only, totally ordered audit trail
//!
//! Each record carries the hash of its predecessor, so any edit or
//! reordering of the stored sequence is detected by [`EventLog::verify_chain`].
//! Queries always run most-recent-first.

use crate::{
    crypto::{hash_event, KeyPair},
    types::{AccountId, EventKind, EventPayload, LedgerEvent},
    Error, Result,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Append-only sequence of accepted operations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventLog {
    events: Vec<LedgerEvent>,
}

impl EventLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record for an already-applied operation
    ///
    /// Assigns the next sequence number, chains the hash and signs it when a
    /// key pair is given. Infallible once called.
    pub fn append(&mut self, payload: EventPayload, signer: Option<&KeyPair>) -> &LedgerEvent {
        let previous_hash = self.events.last().map(|e| e.hash).unwrap_or([0u8; 32]);

        let mut event = LedgerEvent {
            sequence: self.events.len() as u64 + 1,
            event_id: Uuid::now_v7(),
            payload,
            timestamp_nanos: Utc::now().timestamp_nanos_opt().unwrap_or(0),
            previous_hash,
            hash: [0u8; 32],
            signature: None,
        };
        event.hash = hash_event(&event);
        event.signature = signer.map(|keypair| keypair.sign(&event.hash));

        tracing::debug!(
            sequence = event.sequence,
            kind = %event.kind(),
            "Event appended"
        );

        self.events.push(event);
        &self.events[self.events.len() - 1]
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether nothing has been appended
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Record by sequence number
    pub fn get(&self, sequence: u64) -> Option<&LedgerEvent> {
        let index = usize::try_from(sequence.checked_sub(1)?).ok()?;
        self.events.get(index)
    }

    /// Most recent record
    pub fn latest(&self) -> Option<&LedgerEvent> {
        self.events.last()
    }

    /// All records in ascending sequence order
    pub fn as_slice(&self) -> &[LedgerEvent] {
        &self.events
    }

    /// Matching records, most recent first
    pub fn query(&self, filter: EventFilter) -> EventQuery<'_> {
        EventQuery {
            events: &self.events,
            filter,
        }
    }

    /// Verify sequence contiguity, hash links and (optionally) signatures
    pub fn verify_chain(&self, public_key: Option<&[u8; 32]>) -> Result<()> {
        let mut previous_hash = [0u8; 32];

        for (index, event) in self.events.iter().enumerate() {
            let expected_sequence = index as u64 + 1;
            if event.sequence != expected_sequence {
                return Err(Error::InvariantViolation(format!(
                    "Sequence gap: expected {}, found {}",
                    expected_sequence, event.sequence
                )));
            }

            if event.previous_hash != previous_hash {
                return Err(Error::InvariantViolation(format!(
                    "Broken hash link at sequence {}",
                    event.sequence
                )));
            }

            if hash_event(event) != event.hash {
                return Err(Error::InvariantViolation(format!(
                    "Hash mismatch at sequence {}",
                    event.sequence
                )));
            }

            if let Some(key) = public_key {
                if !event.verify_signature(key) {
                    return Err(Error::SignatureError(format!(
                        "Invalid signature at sequence {}",
                        event.sequence
                    )));
                }
            }

            previous_hash = event.hash;
        }

        Ok(())
    }
}

/// Event query parameters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    /// Only this kind; all kinds when absent
    #[serde(default)]
    pub kind: Option<EventKind>,

    /// Only records naming this account
    #[serde(default)]
    pub account: Option<AccountId>,

    /// Only records with a sequence strictly below this (paging cursor)
    #[serde(default)]
    pub before: Option<u64>,

    /// Maximum number of records
    #[serde(default)]
    pub limit: Option<usize>,
}

impl EventFilter {
    /// Every record
    pub fn all() -> Self {
        Self::default()
    }

    /// Records of one kind
    pub fn kind(kind: EventKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    /// Restrict to records naming `account`
    pub fn involving(mut self, account: AccountId) -> Self {
        self.account = Some(account);
        self
    }

    /// Restrict to sequences below `sequence`
    pub fn before(mut self, sequence: u64) -> Self {
        self.before = Some(sequence);
        self
    }

    /// Cap the number of records
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `event` passes this filter (ignoring `limit`)
    pub fn matches(&self, event: &LedgerEvent) -> bool {
        self.kind.map_or(true, |kind| event.kind() == kind)
            && self.account.map_or(true, |account| event.payload.involves(&account))
            && self.before.map_or(true, |before| event.sequence < before)
    }
}

/// Lazy, restartable view over matching records
///
/// Each call to [`EventQuery::iter`] starts again from the newest record.
#[derive(Debug, Clone, Copy)]
pub struct EventQuery<'a> {
    events: &'a [LedgerEvent],
    filter: EventFilter,
}

impl<'a> EventQuery<'a> {
    /// Iterate matching records, most recent first
    pub fn iter(&self) -> impl Iterator<Item = &'a LedgerEvent> + 'a {
        let filter = self.filter;
        self.events
            .iter()
            .rev()
            .filter(move |event| filter.matches(event))
            .take(filter.limit.unwrap_or(usize::MAX))
    }

    /// Number of matching records
    pub fn count(&self) -> usize {
        self.iter().count()
    }

    /// Clone matching records into a vector
    pub fn to_vec(&self) -> Vec<LedgerEvent> {
        self.iter().cloned().collect()
    }
}

impl<'a> IntoIterator for EventQuery<'a> {
    type Item = &'a LedgerEvent;
    type IntoIter = Box<dyn Iterator<Item = &'a LedgerEvent> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}
