//! Core types for the settlement client

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub use auction_ledger::AttributeVector;

/// Bid vector `(size, duration, ..., price)`
pub type Bid = AttributeVector;

/// Item vector `(size, duration, ..., reserve)`
pub type Item = AttributeVector;

/// Zero-based bidder index (ledger bid id minus one)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BidderId(pub usize);

/// Zero-based item index (ledger item id minus one)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemId(pub usize);

impl fmt::Display for BidderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bidder {}", self.0)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item {}", self.0)
    }
}

/// Item per bidder, `None` for unassigned
pub type Assignment = Vec<Option<ItemId>>;

/// Bidder x item value matrix
///
/// Total over the cross product it was derived for: every pair has an
/// entry, 0 when infeasible.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValuationRelation {
    values: BTreeMap<(BidderId, ItemId), u64>,
    bidder_count: usize,
    item_count: usize,
}

impl ValuationRelation {
    /// Empty relation over `bidder_count x item_count`, every pair 0
    pub fn new(bidder_count: usize, item_count: usize) -> Self {
        let mut values = BTreeMap::new();
        for bidder in 0..bidder_count {
            for item in 0..item_count {
                values.insert((BidderId(bidder), ItemId(item)), 0);
            }
        }
        Self {
            values,
            bidder_count,
            item_count,
        }
    }

    /// Set the value of a pair inside the cross product
    pub fn set(&mut self, bidder: BidderId, item: ItemId, value: u64) {
        debug_assert!(bidder.0 < self.bidder_count && item.0 < self.item_count);
        self.values.insert((bidder, item), value);
    }

    /// Value of a pair; pairs outside the cross product are worth nothing
    pub fn value(&self, bidder: BidderId, item: ItemId) -> u64 {
        self.values.get(&(bidder, item)).copied().unwrap_or(0)
    }

    /// True when the pair is feasible (positive value)
    pub fn is_feasible(&self, bidder: BidderId, item: ItemId) -> bool {
        self.value(bidder, item) > 0
    }

    /// Number of bidders
    pub fn bidder_count(&self) -> usize {
        self.bidder_count
    }

    /// Number of items
    pub fn item_count(&self) -> usize {
        self.item_count
    }

    /// True for an empty cross product
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of defined pairs
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// All pairs in (bidder, item) order
    pub fn iter(&self) -> impl Iterator<Item = (BidderId, ItemId, u64)> + '_ {
        self.values.iter().map(|(&(b, i), &v)| (b, i, v))
    }

    /// Feasible pairs only
    pub fn feasible_pairs(&self) -> impl Iterator<Item = (BidderId, ItemId, u64)> + '_ {
        self.iter().filter(|&(_, _, v)| v > 0)
    }
}

/// Reserve price per item
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MinPrices(BTreeMap<ItemId, u64>);

impl MinPrices {
    /// Build from (item, reserve) pairs
    pub fn from_pairs(pairs: impl IntoIterator<Item = (ItemId, u64)>) -> Self {
        Self(pairs.into_iter().collect())
    }

    /// Reserve of an item
    pub fn get(&self, item: ItemId) -> Option<u64> {
        self.0.get(&item).copied()
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True without items
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// All reserves in item order
    pub fn iter(&self) -> impl Iterator<Item = (ItemId, u64)> + '_ {
        self.0.iter().map(|(&i, &p)| (i, p))
    }
}

/// Solver output in memory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Solution {
    /// Item per bidder
    pub assignment: Assignment,

    /// Clearing price per item
    pub prices: Vec<u64>,

    /// Total value realized by the assignment
    pub score: u64,
}

impl Solution {
    /// Number of bidders that received an item
    pub fn assigned_count(&self) -> usize {
        self.assignment.iter().filter(|a| a.is_some()).count()
    }
}

/// Solution in the ledger's wire form (sentinel-encoded assignment)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EncodedSolution {
    /// One byte per bidder, 255 for unassigned
    pub assignment: Vec<u8>,

    /// Clearing price per item
    pub prices: Vec<u64>,

    /// Claimed score
    pub score: u64,
}

impl EncodedSolution {
    /// The ledger reports "no solution" as all-zero accessors
    pub fn is_absent(&self) -> bool {
        self.score == 0 && self.assignment.is_empty() && self.prices.is_empty()
    }
}

/// Bids and items read from the ledger in id order
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LedgerSnapshot {
    /// Bid vectors, index = bidder
    pub bids: Vec<Bid>,

    /// Item vectors, index = item
    pub items: Vec<Item>,
}

impl LedgerSnapshot {
    /// Bidder indices
    pub fn bidder_ids(&self) -> Vec<BidderId> {
        (0..self.bids.len()).map(BidderId).collect()
    }

    /// Item indices
    pub fn item_ids(&self) -> Vec<ItemId> {
        (0..self.items.len()).map(ItemId).collect()
    }

    /// The first `bids` bids and `items` items, clamped to what is present
    pub fn prefix(&self, bids: usize, items: usize) -> LedgerSnapshot {
        LedgerSnapshot {
            bids: self.bids[..bids.min(self.bids.len())].to_vec(),
            items: self.items[..items.min(self.items.len())].to_vec(),
        }
    }

    /// True when there is nothing to auction
    pub fn is_unsolvable(&self) -> bool {
        self.bids.is_empty() || self.items.is_empty()
    }
}

/// Which record a proposal appends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalKind {
    /// Demand: storage wanted and the price the bidder pays
    Bid,
    /// Supply: storage offered and its reserve price
    Item,
}

impl fmt::Display for ProposalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProposalKind::Bid => write!(f, "bid"),
            ProposalKind::Item => write!(f, "item"),
        }
    }
}

/// Validated storage-lease terms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseTerms {
    /// Storage size (GB)
    pub size: u64,

    /// Lease duration (days)
    pub duration: u64,

    /// Bid price or reserve price
    pub price: u64,
}

impl LeaseTerms {
    /// Validate signed integer terms
    pub fn new(size: i64, duration: i64, price: i64) -> Result<Self> {
        Ok(Self {
            size: non_negative("size", size)?,
            duration: non_negative("duration", duration)?,
            price: non_negative("price", price)?,
        })
    }

    /// Validate textual terms (command line or prompt input)
    pub fn parse(size: &str, duration: &str, price: &str) -> Result<Self> {
        Self::new(
            parse_integer("size", size)?,
            parse_integer("duration", duration)?,
            parse_integer("price", price)?,
        )
    }

    /// Attribute vector in `(size, duration, price)` order
    pub fn to_vector(self) -> AttributeVector {
        AttributeVector::lease(self.size, self.duration, self.price)
    }
}

fn non_negative(field: &'static str, value: i64) -> Result<u64> {
    u64::try_from(value).map_err(|_| Error::InvalidInput {
        field,
        value: value.to_string(),
        reason: "must be non-negative".to_string(),
    })
}

fn parse_integer(field: &'static str, raw: &str) -> Result<i64> {
    raw.trim().parse::<i64>().map_err(|e| Error::InvalidInput {
        field,
        value: raw.to_string(),
        reason: format!("not an integer ({})", e),
    })
}
