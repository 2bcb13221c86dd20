//! Main ledger interface
//!
//! Ties storage, the contract rules and the writer actor together into the
//! read accessors and write transactions of the auction contract.
//!
//! # Example
//!
//! ```no_run
//! use auction_ledger::{AttributeVector, Config, Ledger};
//!
//! #[tokio::main]
//! async fn main() -> auction_ledger::Result<()> {
//!     let ledger = Ledger::open(Config::default()).await?;
//!
//!     let receipt = ledger.submit_bid(AttributeVector::lease(2, 5, 10)).await?;
//!     println!("bid {:?} confirmed in tx {}", receipt.record_id, receipt.tx_hash_hex());
//!
//!     ledger.shutdown().await
//! }
//! ```

use crate::{
    actor::{spawn_ledger_actor, LedgerHandle},
    metrics::Metrics,
    storage::{RecordKind, Storage},
    types::{
        AccountId, AttributeVector, Confirmation, DisputeRecord, RecordId, StoredSolution,
        Transaction,
    },
    Config, Error, Result,
};
use std::sync::Arc;

/// Auction contract state
pub struct Ledger {
    /// Actor handle for write transactions
    handle: LedgerHandle,

    /// Direct storage access (for reads)
    storage: Arc<Storage>,

    /// Metrics shared with the actor
    metrics: Metrics,

    /// Configuration
    config: Config,
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("data_dir", &self.config.data_dir)
            .field("account", &self.config.account)
            .finish()
    }
}

impl Ledger {
    /// Open ledger with configuration
    pub async fn open(config: Config) -> Result<Self> {
        config.validate()?;

        let storage = Arc::new(Storage::open(&config)?);
        let metrics = Metrics::new().map_err(|e| Error::Other(e.to_string()))?;

        let handle = spawn_ledger_actor(
            storage.clone(),
            AccountId::new(config.account.clone()),
            config.attribute_arity,
            config.mailbox_capacity,
            metrics.clone(),
        );

        tracing::info!(
            account = %config.account,
            arity = config.attribute_arity,
            "Auction ledger opened"
        );

        Ok(Self {
            handle,
            storage,
            metrics,
            config,
        })
    }

    /// Account signing this ledger's writes
    pub fn account(&self) -> AccountId {
        AccountId::new(self.config.account.clone())
    }

    /// Ledger metrics
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    // Write transactions

    /// Append a bid
    pub async fn submit_bid(&self, vector: AttributeVector) -> Result<Confirmation> {
        self.handle.execute(Transaction::SubmitBid { vector }).await
    }

    /// Append an item
    pub async fn add_item(&self, vector: AttributeVector) -> Result<Confirmation> {
        self.handle.execute(Transaction::AddItem { vector }).await
    }

    /// Replace the current solution
    pub async fn submit_solution(
        &self,
        assignment: Vec<u8>,
        prices: Vec<u64>,
        score: u64,
    ) -> Result<Confirmation> {
        self.handle
            .execute(Transaction::SubmitSolution {
                assignment,
                prices,
                score,
            })
            .await
    }

    /// Misbehavior proof against the current solution
    ///
    /// Accepted only if the contract's own recomputation disagrees with the
    /// stored solution; the solution is then removed and its submitter
    /// penalized.
    pub async fn wrong_score(&self) -> Result<Confirmation> {
        self.handle.execute(Transaction::WrongScore).await
    }

    // Read accessors

    /// Number of bids (ids run `1..=count`)
    pub fn bids_counter(&self) -> Result<u64> {
        self.storage.record_count(RecordKind::Bid)
    }

    /// Bid by id
    pub fn bid(&self, id: RecordId) -> Result<AttributeVector> {
        self.storage.get_record(RecordKind::Bid, id)
    }

    /// Number of items (ids run `1..=count`)
    pub fn items_counter(&self) -> Result<u64> {
        self.storage.record_count(RecordKind::Item)
    }

    /// Item by id
    pub fn item(&self, id: RecordId) -> Result<AttributeVector> {
        self.storage.get_record(RecordKind::Item, id)
    }

    /// Current solution, if any
    pub fn solution(&self) -> Result<Option<StoredSolution>> {
        self.storage.get_solution()
    }

    /// Length of the current assignment (0 without a solution)
    pub fn solution_assignment_len(&self) -> Result<u64> {
        Ok(self
            .solution()?
            .map(|s| s.assignment.len() as u64)
            .unwrap_or(0))
    }

    /// Length of the current price list (0 without a solution)
    pub fn solution_prices_len(&self) -> Result<u64> {
        Ok(self.solution()?.map(|s| s.prices.len() as u64).unwrap_or(0))
    }

    /// Score of the current solution (0 without a solution)
    pub fn solution_score(&self) -> Result<u64> {
        Ok(self.solution()?.map(|s| s.score).unwrap_or(0))
    }

    /// Assignment entry `index` of the current solution
    pub fn assignment_entry(&self, index: u64) -> Result<u8> {
        let solution = self.solution()?.ok_or(Error::NoSolution)?;
        solution
            .assignment
            .get(index as usize)
            .copied()
            .ok_or_else(|| Error::RecordNotFound(format!("assignment entry {}", index)))
    }

    /// Price entry `index` of the current solution
    pub fn price_entry(&self, index: u64) -> Result<u64> {
        let solution = self.solution()?.ok_or(Error::NoSolution)?;
        solution
            .prices
            .get(index as usize)
            .copied()
            .ok_or_else(|| Error::RecordNotFound(format!("price entry {}", index)))
    }

    /// Accepted misbehavior proofs
    pub fn disputes(&self) -> Result<Vec<DisputeRecord>> {
        self.storage.get_disputes()
    }

    /// Penalties recorded against an account
    pub fn penalties(&self, account: &AccountId) -> Result<u64> {
        self.storage.penalties(account)
    }

    /// Shutdown ledger
    pub async fn shutdown(self) -> Result<()> {
        tracing::info!("Shutting down auction ledger");
        self.handle.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn create_test_ledger() -> (Ledger, tempfile::TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        config.account = "tester".to_string();

        (Ledger::open(config).await.unwrap(), temp_dir)
    }

    #[tokio::test]
    async fn test_ledger_open() {
        let (ledger, _temp) = create_test_ledger().await;
        assert_eq!(ledger.bids_counter().unwrap(), 0);
        assert_eq!(ledger.items_counter().unwrap(), 0);
        assert_eq!(ledger.solution_score().unwrap(), 0);
        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_submit_and_read_records() {
        let (ledger, _temp) = create_test_ledger().await;

        let receipt = ledger
            .submit_bid(AttributeVector::lease(2, 5, 10))
            .await
            .unwrap();
        assert_eq!(receipt.record_id, Some(1));
        ledger.add_item(AttributeVector::lease(4, 10, 3)).await.unwrap();

        assert_eq!(ledger.bids_counter().unwrap(), 1);
        assert_eq!(ledger.bid(1).unwrap(), AttributeVector::lease(2, 5, 10));
        assert_eq!(ledger.item(1).unwrap().price(), 3);
        assert!(matches!(ledger.bid(2), Err(Error::RecordNotFound(_))));

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_solution_accessors() {
        let (ledger, _temp) = create_test_ledger().await;
        ledger.submit_bid(AttributeVector::lease(2, 5, 10)).await.unwrap();
        ledger.submit_bid(AttributeVector::lease(9, 9, 10)).await.unwrap();
        ledger.add_item(AttributeVector::lease(4, 10, 3)).await.unwrap();

        assert!(matches!(ledger.assignment_entry(0), Err(Error::NoSolution)));

        ledger.submit_solution(vec![0, 255], vec![3], 10).await.unwrap();

        assert_eq!(ledger.solution_assignment_len().unwrap(), 2);
        assert_eq!(ledger.solution_prices_len().unwrap(), 1);
        assert_eq!(ledger.solution_score().unwrap(), 10);
        assert_eq!(ledger.assignment_entry(1).unwrap(), 255);
        assert_eq!(ledger.price_entry(0).unwrap(), 3);
        assert!(ledger.price_entry(1).is_err());
        assert_eq!(ledger.solution().unwrap().unwrap().submitter.as_str(), "tester");

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_solution_rejected() {
        let (ledger, _temp) = create_test_ledger().await;
        ledger.submit_bid(AttributeVector::lease(2, 5, 10)).await.unwrap();
        ledger.add_item(AttributeVector::lease(4, 10, 3)).await.unwrap();

        let result = ledger.submit_solution(vec![0, 0], vec![3], 20).await;
        assert!(matches!(result, Err(Error::InvalidSolution(_))));
        assert!(ledger.solution().unwrap().is_none());

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_wrong_score_removes_inflated_solution() {
        let (ledger, _temp) = create_test_ledger().await;
        ledger.submit_bid(AttributeVector::lease(2, 5, 10)).await.unwrap();
        ledger.add_item(AttributeVector::lease(4, 10, 3)).await.unwrap();
        ledger.submit_solution(vec![0], vec![3], 110).await.unwrap();

        let receipt = ledger.wrong_score().await.unwrap();
        assert_eq!(receipt.record_id, Some(1));
        assert!(ledger.solution().unwrap().is_none());

        let disputes = ledger.disputes().unwrap();
        assert_eq!(disputes.len(), 1);
        assert_eq!(disputes[0].disputed_score, 110);
        assert_eq!(disputes[0].recomputed_score, 10);
        assert_eq!(ledger.penalties(&AccountId::new("tester")).unwrap(), 1);

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_wrong_score_against_valid_solution_rejected() {
        let (ledger, _temp) = create_test_ledger().await;
        ledger.submit_bid(AttributeVector::lease(2, 5, 10)).await.unwrap();
        ledger.add_item(AttributeVector::lease(4, 10, 3)).await.unwrap();
        ledger.submit_solution(vec![0], vec![3], 10).await.unwrap();

        let result = ledger.wrong_score().await;
        assert!(matches!(result, Err(Error::ProofRejected(_))));
        assert_eq!(ledger.solution_score().unwrap(), 10);
        assert_eq!(ledger.metrics().rejected_total.get(), 1);

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_wrong_score_after_new_records_rejected() {
        let (ledger, _temp) = create_test_ledger().await;
        ledger.submit_bid(AttributeVector::lease(2, 5, 10)).await.unwrap();
        ledger.add_item(AttributeVector::lease(4, 10, 3)).await.unwrap();
        ledger.submit_solution(vec![0], vec![3], 10).await.unwrap();
        ledger.submit_bid(AttributeVector::lease(1, 1, 50)).await.unwrap();
        ledger.add_item(AttributeVector::lease(9, 9, 1)).await.unwrap();

        let result = ledger.wrong_score().await;
        assert!(matches!(result, Err(Error::ProofRejected(_))));
        assert_eq!(ledger.solution_score().unwrap(), 10);

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_wrong_score_without_solution() {
        let (ledger, _temp) = create_test_ledger().await;
        assert!(matches!(ledger.wrong_score().await, Err(Error::NoSolution)));
        ledger.shutdown().await.unwrap();
    }
}
