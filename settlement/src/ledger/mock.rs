//! In-memory ledger for tests and dry runs
//!
//! Applies the same contract rules as the RocksDB ledger. On top of that it
//! can fail writes on demand and run a hook that mutates state in the middle
//! of a workflow, to exercise the orchestrator's consistency checks.

use super::{AuctionLedger, LedgerResult};
use async_trait::async_trait;
use auction_ledger::{
    contract, transaction_hash, AttributeVector, Confirmation, Error, RecordId, Transaction,
};
use chrono::Utc;
use parking_lot::Mutex;
use std::fmt;
use tracing::{info, warn};

type StateHook = Box<dyn FnOnce(&mut MockState) + Send>;

/// Contract state held by [`MockLedger`]
#[derive(Debug, Clone, Default)]
pub struct MockState {
    bids: Vec<AttributeVector>,
    items: Vec<AttributeVector>,
    solution: Option<(Vec<u8>, Vec<u64>, u64)>,
    sequence: u64,
    disputes: u64,
}

impl MockState {
    /// Append a bid without going through a write transaction
    pub fn push_bid(&mut self, vector: AttributeVector) {
        self.bids.push(vector);
    }

    /// Append an item without going through a write transaction
    pub fn push_item(&mut self, vector: AttributeVector) {
        self.items.push(vector);
    }

    /// Overwrite the stored solution without any contract checks
    pub fn set_solution(&mut self, assignment: Vec<u8>, prices: Vec<u64>, score: u64) {
        self.solution = Some((assignment, prices, score));
    }

    fn confirm(
        &mut self,
        tx: &Transaction,
        record_id: Option<RecordId>,
    ) -> LedgerResult<Confirmation> {
        self.sequence += 1;
        Ok(Confirmation {
            tx_hash: transaction_hash(self.sequence, tx)?,
            sequence: self.sequence,
            kind: tx.kind(),
            record_id,
            confirmed_at: Utc::now(),
        })
    }
}

#[derive(Default)]
struct Injected {
    failing_writes: usize,
    count_reads: usize,
    hook: Option<(usize, StateHook)>,
}

/// In-memory [`AuctionLedger`]
pub struct MockLedger {
    state: Mutex<MockState>,
    injected: Mutex<Injected>,
    arity: usize,
    writes: Mutex<u64>,
}

impl fmt::Debug for MockLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockLedger")
            .field("state", &*self.state.lock())
            .field("arity", &self.arity)
            .finish()
    }
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new(3)
    }
}

impl MockLedger {
    /// Empty ledger accepting vectors of `arity` attributes
    pub fn new(arity: usize) -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            injected: Mutex::new(Injected::default()),
            arity,
            writes: Mutex::new(0),
        }
    }

    /// Ledger pre-populated with bids and items
    pub fn with_records(bids: Vec<AttributeVector>, items: Vec<AttributeVector>) -> Self {
        let arity = bids.first().or_else(|| items.first()).map_or(3, |v| v.arity());
        let ledger = Self::new(arity);
        {
            let mut state = ledger.state.lock();
            state.bids = bids;
            state.items = items;
        }
        ledger
    }

    /// Fail the next `count` write transactions
    pub fn fail_next_writes(&self, count: usize) {
        self.injected.lock().failing_writes = count;
    }

    /// Run `hook` against the state when the `nth` bid/item count read
    /// (1-based, counted from now) is served, before answering it
    pub fn mutate_on_count_read(
        &self,
        nth: usize,
        hook: impl FnOnce(&mut MockState) + Send + 'static,
    ) {
        let mut injected = self.injected.lock();
        injected.count_reads = 0;
        injected.hook = Some((nth, Box::new(hook)));
    }

    /// Direct state access for test setup
    pub fn with_state<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        f(&mut *self.state.lock())
    }

    /// Confirmed write transactions so far
    pub fn confirmed_writes(&self) -> u64 {
        *self.writes.lock()
    }

    /// Stored solution, if any
    pub fn stored_solution(&self) -> Option<(Vec<u8>, Vec<u64>, u64)> {
        self.state.lock().solution.clone()
    }

    /// Accepted misbehavior proofs
    pub fn disputes(&self) -> u64 {
        self.state.lock().disputes
    }

    fn count_read(&self) {
        let hook = {
            let mut injected = self.injected.lock();
            injected.count_reads += 1;
            match injected.hook.take() {
                Some((nth, hook)) if nth == injected.count_reads => Some(hook),
                other => {
                    injected.hook = other;
                    None
                }
            }
        };

        if let Some(hook) = hook {
            warn!("Mock ledger: mutating state mid-read");
            hook(&mut *self.state.lock());
        }
    }

    fn write(
        &self,
        tx: Transaction,
        apply: impl FnOnce(&mut MockState) -> LedgerResult<Option<RecordId>>,
    ) -> LedgerResult<Confirmation> {
        {
            let mut injected = self.injected.lock();
            if injected.failing_writes > 0 {
                injected.failing_writes -= 1;
                warn!(kind = %tx.kind(), "Mock ledger: simulated write failure");
                return Err(Error::Storage("Simulated write failure".to_string()));
            }
        }

        let mut state = self.state.lock();
        let record_id = apply(&mut *state)?;
        let confirmation = state.confirm(&tx, record_id)?;
        *self.writes.lock() += 1;

        info!(kind = %confirmation.kind, sequence = confirmation.sequence, "Mock ledger: confirmed");
        Ok(confirmation)
    }

    fn read_solution<T>(&self, f: impl FnOnce(&(Vec<u8>, Vec<u64>, u64)) -> T) -> Option<T> {
        self.state.lock().solution.as_ref().map(f)
    }
}

fn record(records: &[AttributeVector], kind: &str, id: RecordId) -> LedgerResult<AttributeVector> {
    id.checked_sub(1)
        .and_then(|index| records.get(index as usize))
        .cloned()
        .ok_or_else(|| Error::RecordNotFound(format!("{} {}", kind, id)))
}

#[async_trait]
impl AuctionLedger for MockLedger {
    async fn bid_count(&self) -> LedgerResult<u64> {
        self.count_read();
        Ok(self.state.lock().bids.len() as u64)
    }

    async fn bid(&self, id: RecordId) -> LedgerResult<AttributeVector> {
        record(&self.state.lock().bids, "bid", id)
    }

    async fn item_count(&self) -> LedgerResult<u64> {
        self.count_read();
        Ok(self.state.lock().items.len() as u64)
    }

    async fn item(&self, id: RecordId) -> LedgerResult<AttributeVector> {
        record(&self.state.lock().items, "item", id)
    }

    async fn submit_bid(&self, vector: AttributeVector) -> LedgerResult<Confirmation> {
        contract::validate_vector(&vector, self.arity)?;
        self.write(Transaction::SubmitBid { vector: vector.clone() }, |state| {
            state.bids.push(vector);
            Ok(Some(state.bids.len() as u64))
        })
    }

    async fn submit_item(&self, vector: AttributeVector) -> LedgerResult<Confirmation> {
        contract::validate_vector(&vector, self.arity)?;
        self.write(Transaction::AddItem { vector: vector.clone() }, |state| {
            state.items.push(vector);
            Ok(Some(state.items.len() as u64))
        })
    }

    async fn solution_assignment_count(&self) -> LedgerResult<u64> {
        Ok(self.read_solution(|s| s.0.len() as u64).unwrap_or(0))
    }

    async fn solution_price_count(&self) -> LedgerResult<u64> {
        Ok(self.read_solution(|s| s.1.len() as u64).unwrap_or(0))
    }

    async fn solution_score(&self) -> LedgerResult<u64> {
        Ok(self.read_solution(|s| s.2).unwrap_or(0))
    }

    async fn assignment_entry(&self, index: u64) -> LedgerResult<u8> {
        self.read_solution(|s| s.0.get(index as usize).copied())
            .ok_or(Error::NoSolution)?
            .ok_or_else(|| Error::RecordNotFound(format!("assignment entry {}", index)))
    }

    async fn price_entry(&self, index: u64) -> LedgerResult<u64> {
        self.read_solution(|s| s.1.get(index as usize).copied())
            .ok_or(Error::NoSolution)?
            .ok_or_else(|| Error::RecordNotFound(format!("price entry {}", index)))
    }

    async fn submit_solution(
        &self,
        assignment: Vec<u8>,
        prices: Vec<u64>,
        score: u64,
    ) -> LedgerResult<Confirmation> {
        let tx = Transaction::SubmitSolution {
            assignment: assignment.clone(),
            prices: prices.clone(),
            score,
        };
        self.write(tx, |state| {
            contract::check_solution_shape(
                state.bids.len() as u64,
                state.items.len() as u64,
                &assignment,
                &prices,
            )?;
            state.solution = Some((assignment, prices, score));
            Ok(None)
        })
    }

    async fn submit_misbehavior_proof(&self) -> LedgerResult<Confirmation> {
        self.write(Transaction::WrongScore, |state| {
            let (assignment, prices, score) = state.solution.clone().ok_or(Error::NoSolution)?;
            let audit =
                contract::audit_records(&state.bids, &state.items, &assignment, &prices, score);

            match audit.violation {
                None => Err(Error::ProofRejected(format!(
                    "Stored solution realizes its claimed score {}",
                    score
                ))),
                Some(reason) => {
                    info!(%reason, recomputed = audit.recomputed_score, "Mock ledger: dispute accepted");
                    state.solution = None;
                    state.disputes += 1;
                    Ok(Some(state.disputes))
                }
            }
        })
    }
}
