//! Core types for the auction ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Memory safety (no unsafe code)
//! - Exact arithmetic (unsigned integers for attributes and prices)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ledger-assigned record identifier (1-based, sequential per record kind)
pub type RecordId = u64;

/// Wire value meaning "bidder left unassigned" in a stored assignment
pub const UNASSIGNED_SENTINEL: u8 = 255;

/// Account identifier of the party signing a write transaction
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    /// Create new account ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Attribute vector of a bid or an item
///
/// Layout is `(c_1, ..., c_{k-1}, price)`: every slot but the last is a
/// resource attribute (storage size, lease duration, ...), the last slot is
/// the bid price or the item's reserve price.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributeVector(Vec<u64>);

impl AttributeVector {
    /// Create a vector; it must carry at least the trailing price slot
    pub fn new(values: Vec<u64>) -> crate::Result<Self> {
        if values.is_empty() {
            return Err(crate::Error::InvalidRecord(
                "Attribute vector must contain a price slot".to_string(),
            ));
        }
        Ok(Self(values))
    }

    /// Storage-lease schema: size (GB), duration (days), price
    pub fn lease(size: u64, duration: u64, price: u64) -> Self {
        Self(vec![size, duration, price])
    }

    /// Number of slots including the price
    pub fn arity(&self) -> usize {
        self.0.len()
    }

    /// Attribute slots (everything except the trailing price)
    pub fn constraints(&self) -> &[u64] {
        &self.0[..self.0.len() - 1]
    }

    /// Trailing price / reserve slot
    pub fn price(&self) -> u64 {
        self.0[self.0.len() - 1]
    }

    /// All slots
    pub fn as_slice(&self) -> &[u64] {
        &self.0
    }

    /// True when every demanded attribute is covered by the offer
    ///
    /// `self` is the demand (a bid), `offer` the supply (an item). Both must
    /// share the same schema; mismatched arity never counts as covered.
    pub fn is_covered_by(&self, offer: &AttributeVector) -> bool {
        self.arity() == offer.arity()
            && self
                .constraints()
                .iter()
                .zip(offer.constraints())
                .all(|(demand, supply)| demand <= supply)
    }
}

impl fmt::Display for AttributeVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(u64::to_string).collect();
        write!(f, "({})", parts.join(", "))
    }
}

/// The singleton solution stored by the contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSolution {
    /// Item index per bidder, sentinel-encoded
    pub assignment: Vec<u8>,

    /// Clearing price per item
    pub prices: Vec<u64>,

    /// Claimed total value
    pub score: u64,

    /// Account that submitted the solution
    pub submitter: AccountId,

    /// Confirmation time
    pub submitted_at: DateTime<Utc>,
}

/// Accepted misbehavior proof
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisputeRecord {
    /// Sequential dispute ID (1-based)
    pub dispute_id: u64,

    /// Account that submitted the proof
    pub challenger: AccountId,

    /// Account whose solution was removed
    pub penalized: AccountId,

    /// Score claimed by the removed solution
    pub disputed_score: u64,

    /// Score the contract recomputed from stored bids and items
    pub recomputed_score: u64,

    /// First failed check
    pub reason: String,

    /// Confirmation time
    pub accepted_at: DateTime<Utc>,
}

/// Write transactions accepted by the contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transaction {
    /// Append a bid
    SubmitBid {
        /// Bid vector
        vector: AttributeVector,
    },

    /// Append an item
    AddItem {
        /// Item vector
        vector: AttributeVector,
    },

    /// Replace the current solution
    SubmitSolution {
        /// Sentinel-encoded assignment
        assignment: Vec<u8>,
        /// Per-item prices
        prices: Vec<u64>,
        /// Claimed score
        score: u64,
    },

    /// Misbehavior proof against the current solution
    WrongScore,
}

impl Transaction {
    /// Transaction kind
    pub fn kind(&self) -> TransactionKind {
        match self {
            Transaction::SubmitBid { .. } => TransactionKind::SubmitBid,
            Transaction::AddItem { .. } => TransactionKind::AddItem,
            Transaction::SubmitSolution { .. } => TransactionKind::SubmitSolution,
            Transaction::WrongScore => TransactionKind::WrongScore,
        }
    }
}

/// Transaction kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TransactionKind {
    /// Bid appended
    SubmitBid = 1,
    /// Item appended
    AddItem = 2,
    /// Solution replaced
    SubmitSolution = 3,
    /// Misbehavior proof accepted
    WrongScore = 4,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionKind::SubmitBid => "submitBid",
            TransactionKind::AddItem => "addItem",
            TransactionKind::SubmitSolution => "submitSolution",
            TransactionKind::WrongScore => "wrongScore",
        };
        f.write_str(name)
    }
}

/// Receipt of a confirmed write transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    /// blake3 of the sequence number and the serialized transaction
    pub tx_hash: [u8; 32],

    /// Position in the total order of confirmed writes
    pub sequence: u64,

    /// Transaction kind
    pub kind: TransactionKind,

    /// Record created by the transaction (bids, items, disputes)
    pub record_id: Option<RecordId>,

    /// Confirmation time
    pub confirmed_at: DateTime<Utc>,
}

impl Confirmation {
    /// Hex-encoded transaction hash
    pub fn tx_hash_hex(&self) -> String {
        self.tx_hash.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

/// Compute the receipt hash of a transaction at a given sequence number
pub fn transaction_hash(sequence: u64, tx: &Transaction) -> crate::Result<[u8; 32]> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&sequence.to_be_bytes());
    hasher.update(&bincode::serialize(tx)?);
    Ok(*hasher.finalize().as_bytes())
}
