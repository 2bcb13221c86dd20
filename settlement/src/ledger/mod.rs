//! Ledger seam
//!
//! Everything the settlement client needs from the auction contract. Reads
//! are one call per record or entry; writes return a [`Confirmation`] only
//! once the transaction is confirmed, and fail otherwise. Retries are left
//! to the implementation.

pub mod mock;
pub mod rocks;

use async_trait::async_trait;
use auction_ledger::{AttributeVector, Confirmation, RecordId};
use std::sync::Arc;

pub use mock::{MockLedger, MockState};

/// Result type of the ledger seam
pub type LedgerResult<T> = auction_ledger::Result<T>;

/// Auction contract accessors and write transactions
#[async_trait]
pub trait AuctionLedger: Send + Sync {
    /// Number of bids; ids run `1..=count`
    async fn bid_count(&self) -> LedgerResult<u64>;

    /// Bid by id
    async fn bid(&self, id: RecordId) -> LedgerResult<AttributeVector>;

    /// Number of items; ids run `1..=count`
    async fn item_count(&self) -> LedgerResult<u64>;

    /// Item by id
    async fn item(&self, id: RecordId) -> LedgerResult<AttributeVector>;

    /// Append a bid
    async fn submit_bid(&self, vector: AttributeVector) -> LedgerResult<Confirmation>;

    /// Append an item
    async fn submit_item(&self, vector: AttributeVector) -> LedgerResult<Confirmation>;

    /// Assignment length of the current solution, 0 without one
    async fn solution_assignment_count(&self) -> LedgerResult<u64>;

    /// Price list length of the current solution, 0 without one
    async fn solution_price_count(&self) -> LedgerResult<u64>;

    /// Score of the current solution, 0 without one
    async fn solution_score(&self) -> LedgerResult<u64>;

    /// Sentinel-encoded assignment entry
    async fn assignment_entry(&self, index: u64) -> LedgerResult<u8>;

    /// Price entry
    async fn price_entry(&self, index: u64) -> LedgerResult<u64>;

    /// Replace the current solution
    async fn submit_solution(
        &self,
        assignment: Vec<u8>,
        prices: Vec<u64>,
        score: u64,
    ) -> LedgerResult<Confirmation>;

    /// Dispute the current solution
    async fn submit_misbehavior_proof(&self) -> LedgerResult<Confirmation>;
}

/// Shared ledgers, e.g. several clients settling against one store
#[async_trait]
impl<T: AuctionLedger + ?Sized> AuctionLedger for Arc<T> {
    async fn bid_count(&self) -> LedgerResult<u64> {
        (**self).bid_count().await
    }

    async fn bid(&self, id: RecordId) -> LedgerResult<AttributeVector> {
        (**self).bid(id).await
    }

    async fn item_count(&self) -> LedgerResult<u64> {
        (**self).item_count().await
    }

    async fn item(&self, id: RecordId) -> LedgerResult<AttributeVector> {
        (**self).item(id).await
    }

    async fn submit_bid(&self, vector: AttributeVector) -> LedgerResult<Confirmation> {
        (**self).submit_bid(vector).await
    }

    async fn submit_item(&self, vector: AttributeVector) -> LedgerResult<Confirmation> {
        (**self).submit_item(vector).await
    }

    async fn solution_assignment_count(&self) -> LedgerResult<u64> {
        (**self).solution_assignment_count().await
    }

    async fn solution_price_count(&self) -> LedgerResult<u64> {
        (**self).solution_price_count().await
    }

    async fn solution_score(&self) -> LedgerResult<u64> {
        (**self).solution_score().await
    }

    async fn assignment_entry(&self, index: u64) -> LedgerResult<u8> {
        (**self).assignment_entry(index).await
    }

    async fn price_entry(&self, index: u64) -> LedgerResult<u64> {
        (**self).price_entry(index).await
    }

    async fn submit_solution(
        &self,
        assignment: Vec<u8>,
        prices: Vec<u64>,
        score: u64,
    ) -> LedgerResult<Confirmation> {
        (**self).submit_solution(assignment, prices, score).await
    }

    async fn submit_misbehavior_proof(&self) -> LedgerResult<Confirmation> {
        (**self).submit_misbehavior_proof().await
    }
}
