//! Core types for the ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Memory safety (no unsafe code)
//! - Exact integer arithmetic in the smallest unit

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Account identifier (20-byte opaque handle)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountId([u8; AccountId::LEN]);

impl AccountId {
    /// Identifier length in bytes
    pub const LEN: usize = 20;

    /// The null account
    pub const ZERO: AccountId = AccountId([0u8; AccountId::LEN]);

    /// Create from raw bytes
    pub const fn from_bytes(bytes: [u8; AccountId::LEN]) -> Self {
        Self(bytes)
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; AccountId::LEN] {
        &self.0
    }

    /// Whether this is the null account
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; AccountId::LEN]
    }

    /// Parse from hex, with or without a `0x` prefix
    pub fn parse(s: &str) -> crate::Result<Self> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let mut bytes = [0u8; AccountId::LEN];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|e| crate::Error::InvalidAccount(format!("{s:?}: {e}")))?;
        Ok(Self(bytes))
    }

    /// Reject the null account where a real account is required
    pub fn require_non_zero(&self, role: &str) -> crate::Result<()> {
        if self.is_zero() {
            return Err(crate::Error::InvalidAccount(format!(
                "{role} must not be the null account"
            )));
        }
        Ok(())
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({self})")
    }
}

impl FromStr for AccountId {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for AccountId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for AccountId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        AccountId::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Amount in the smallest indivisible unit
///
/// Serialized as a decimal string so values above `u64::MAX` survive JSON.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Amount(u128);

impl Amount {
    /// Zero
    pub const ZERO: Amount = Amount(0);

    /// Create from smallest units
    pub const fn new(value: u128) -> Self {
        Self(value)
    }

    /// Raw value in smallest units
    pub fn value(&self) -> u128 {
        self.0
    }

    /// Whether the amount is zero
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checked addition
    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    /// Checked subtraction
    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    /// Reject zero where a positive amount is required
    pub fn require_positive(&self) -> crate::Result<()> {
        if self.is_zero() {
            return Err(crate::Error::InvalidAmount(
                "Amount must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Convert a display value (e.g. `0.5`) into smallest units
    ///
    /// Fails on negative values and on fractions finer than `10^-decimals`.
    pub fn from_units(value: Decimal, decimals: u32) -> crate::Result<Self> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(crate::Error::InvalidAmount(format!("{value} is negative")));
        }
        let factor = 10i128
            .checked_pow(decimals)
            .and_then(|f| Decimal::try_from_i128_with_scale(f, 0).ok())
            .ok_or_else(|| crate::Error::InvalidAmount(format!("{decimals} decimals unsupported")))?;
        let scaled = value
            .checked_mul(factor)
            .ok_or_else(|| crate::Error::InvalidAmount(format!("{value} out of range")))?;
        if !scaled.fract().is_zero() {
            return Err(crate::Error::InvalidAmount(format!(
                "{value} has more than {decimals} decimal places"
            )));
        }
        scaled
            .trunc()
            .to_u128()
            .map(Amount)
            .ok_or_else(|| crate::Error::InvalidAmount(format!("{value} out of range")))
    }

    /// Convert to a display value, `None` if it does not fit a `Decimal`
    pub fn to_units(&self, decimals: u32) -> Option<Decimal> {
        let mantissa = i128::try_from(self.0).ok()?;
        Decimal::try_from_i128_with_scale(mantissa, decimals)
            .ok()
            .map(|d| d.normalize())
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AmountVisitor;

        impl serde::de::Visitor<'_> for AmountVisitor {
            type Value = Amount;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a non-negative integer or decimal string")
            }

            fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Amount, E> {
                Ok(Amount(u128::from(v)))
            }

            fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<Amount, E> {
                u128::try_from(v)
                    .map(Amount)
                    .map_err(|_| E::custom("amount must not be negative"))
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Amount, E> {
                v.parse::<u128>().map(Amount).map_err(E::custom)
            }
        }

        deserializer.deserialize_any(AmountVisitor)
    }
}

impl From<u128> for Amount {
    fn from(value: u128) -> Self {
        Self(value)
    }
}

/// Kind of an accepted operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum EventKind {
    /// Value credited into custody
    Deposit = 1,
    /// Value released out of custody
    Withdraw = 2,
    /// Internal move between accounts
    Transfer = 3,
    /// Allowance set
    Approval = 4,
    /// Admin granted
    AdminAdded = 5,
    /// Admin revoked
    AdminRemoved = 6,
}

impl EventKind {
    /// All kinds, in declaration order
    pub const ALL: [EventKind; 6] = [
        EventKind::Deposit,
        EventKind::Withdraw,
        EventKind::Transfer,
        EventKind::Approval,
        EventKind::AdminAdded,
        EventKind::AdminRemoved,
    ];

    /// Label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Deposit => "deposit",
            EventKind::Withdraw => "withdraw",
            EventKind::Transfer => "transfer",
            EventKind::Approval => "approval",
            EventKind::AdminAdded => "admin_added",
            EventKind::AdminRemoved => "admin_removed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifying fields of an accepted operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    /// Value credited into custody
    Deposit {
        /// Credited account
        account: AccountId,
        /// Amount
        amount: Amount,
    },
    /// Value released out of custody
    Withdraw {
        /// Debited account
        account: AccountId,
        /// Amount
        amount: Amount,
    },
    /// Internal move between accounts
    Transfer {
        /// Debited account
        from: AccountId,
        /// Credited account
        to: AccountId,
        /// Amount
        amount: Amount,
        /// Delegated spender whose allowance was consumed
        #[serde(default, skip_serializing_if = "Option::is_none")]
        spender: Option<AccountId>,
    },
    /// Allowance set to `amount`
    Approval {
        /// Owner of the funds
        owner: AccountId,
        /// Delegated spender
        spender: AccountId,
        /// Resulting allowance
        amount: Amount,
    },
    /// Admin granted
    AdminAdded {
        /// New admin
        admin: AccountId,
        /// Granting admin
        by: AccountId,
    },
    /// Admin revoked
    AdminRemoved {
        /// Removed admin
        admin: AccountId,
        /// Revoking admin
        by: AccountId,
    },
}

impl EventPayload {
    /// Event kind
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::Deposit { .. } => EventKind::Deposit,
            EventPayload::Withdraw { .. } => EventKind::Withdraw,
            EventPayload::Transfer { .. } => EventKind::Transfer,
            EventPayload::Approval { .. } => EventKind::Approval,
            EventPayload::AdminAdded { .. } => EventKind::AdminAdded,
            EventPayload::AdminRemoved { .. } => EventKind::AdminRemoved,
        }
    }

    /// Whether `account` appears in this payload
    pub fn involves(&self, account: &AccountId) -> bool {
        match self {
            EventPayload::Deposit { account: a, .. } | EventPayload::Withdraw { account: a, .. } => {
                a == account
            }
            EventPayload::Transfer {
                from, to, spender, ..
            } => from == account || to == account || spender.as_ref() == Some(account),
            EventPayload::Approval { owner, spender, .. } => owner == account || spender == account,
            EventPayload::AdminAdded { admin, by } | EventPayload::AdminRemoved { admin, by } => {
                admin == account || by == account
            }
        }
    }
}

/// Immutable audit record of an accepted operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    /// Position in the global total order (starts at 1)
    pub sequence: u64,

    /// Unique event ID (UUIDv7 for time-ordering)
    pub event_id: Uuid,

    /// Operation fields
    pub payload: EventPayload,

    /// Event timestamp (nanoseconds since Unix epoch)
    pub timestamp_nanos: i64,

    /// Hash of the preceding event (zero for the first)
    pub previous_hash: [u8; 32],

    /// SHA-256 over the canonical bytes
    pub hash: [u8; 32],

    /// Ed25519 signature over `hash`, when the ledger signs events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<Signature>,
}

/// Fields covered by the event hash
#[derive(Serialize)]
struct CanonicalEvent<'a> {
    sequence: u64,
    event_id: &'a Uuid,
    payload: &'a EventPayload,
    timestamp_nanos: i64,
    previous_hash: &'a [u8; 32],
}

impl LedgerEvent {
    /// Event kind
    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    /// Create canonical bytes for hashing
    pub fn canonical_bytes(&self) -> Vec<u8> {
        // Deterministic serialization for hash verification
        bincode::serialize(&CanonicalEvent {
            sequence: self.sequence,
            event_id: &self.event_id,
            payload: &self.payload,
            timestamp_nanos: self.timestamp_nanos,
            previous_hash: &self.previous_hash,
        })
        .expect("serialization cannot fail")
    }

    /// Verify signature
    pub fn verify_signature(&self, public_key: &[u8; 32]) -> bool {
        match &self.signature {
            Some(signature) => signature.verify(&self.hash, public_key),
            None => false,
        }
    }
}

/// Digital signature (Ed25519)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Signature bytes (64 bytes)
    bytes: Vec<u8>,
}

impl Signature {
    /// Create from bytes
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self {
            bytes: bytes.to_vec(),
        }
    }

    /// Get bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Verify signature
    pub fn verify(&self, message: &[u8], public_key: &[u8; 32]) -> bool {
        use ed25519_dalek::{Signature as DalekSignature, Verifier, VerifyingKey};

        let signature = match DalekSignature::from_slice(&self.bytes) {
            Ok(sig) => sig,
            Err(_) => return false,
        };

        let verifying_key = match VerifyingKey::from_bytes(public_key) {
            Ok(key) => key,
            Err(_) => return false,
        };

        verifying_key.verify(message, &signature).is_ok()
    }
}
