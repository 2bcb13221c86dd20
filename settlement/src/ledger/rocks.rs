//! Seam implementation over the RocksDB-backed auction ledger

use super::{AuctionLedger, LedgerResult};
use async_trait::async_trait;
use auction_ledger::{AttributeVector, Confirmation, Ledger, RecordId};

#[async_trait]
impl AuctionLedger for Ledger {
    async fn bid_count(&self) -> LedgerResult<u64> {
        self.bids_counter()
    }

    async fn bid(&self, id: RecordId) -> LedgerResult<AttributeVector> {
        Ledger::bid(self, id)
    }

    async fn item_count(&self) -> LedgerResult<u64> {
        self.items_counter()
    }

    async fn item(&self, id: RecordId) -> LedgerResult<AttributeVector> {
        Ledger::item(self, id)
    }

    async fn submit_bid(&self, vector: AttributeVector) -> LedgerResult<Confirmation> {
        Ledger::submit_bid(self, vector).await
    }

    async fn submit_item(&self, vector: AttributeVector) -> LedgerResult<Confirmation> {
        self.add_item(vector).await
    }

    async fn solution_assignment_count(&self) -> LedgerResult<u64> {
        self.solution_assignment_len()
    }

    async fn solution_price_count(&self) -> LedgerResult<u64> {
        self.solution_prices_len()
    }

    async fn solution_score(&self) -> LedgerResult<u64> {
        Ledger::solution_score(self)
    }

    async fn assignment_entry(&self, index: u64) -> LedgerResult<u8> {
        Ledger::assignment_entry(self, index)
    }

    async fn price_entry(&self, index: u64) -> LedgerResult<u64> {
        Ledger::price_entry(self, index)
    }

    async fn submit_solution(
        &self,
        assignment: Vec<u8>,
        prices: Vec<u64>,
        score: u64,
    ) -> LedgerResult<Confirmation> {
        Ledger::submit_solution(self, assignment, prices, score).await
    }

    async fn submit_misbehavior_proof(&self) -> LedgerResult<Confirmation> {
        self.wrong_score().await
    }
}
