//! Single-writer actor for contract transactions
//!
//! Every write (bid, item, solution, misbehavior proof) is funneled through
//! one Tokio task, which gives all confirmed writes a total order. Two
//! clients racing to submit a solution are resolved by that order: the
//! last confirmed write wins.
//!
//! ```text
//! LedgerHandle (Clone) ──mpsc (bounded)──▶ LedgerActor ──WriteBatch──▶ RocksDB
//!          ▲                                    │
//!          └────────── oneshot<Confirmation> ───┘
//! ```

use crate::{
    contract,
    metrics::Metrics,
    storage::{RecordKind, Storage},
    types::{transaction_hash, AccountId, Confirmation, DisputeRecord, StoredSolution, Transaction},
    Error, Result,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};

/// Message sent to the ledger actor
#[derive(Debug)]
pub enum LedgerMessage {
    /// Execute a write transaction
    Execute {
        /// Transaction to apply
        tx: Transaction,
        /// Channel for the confirmation
        response: oneshot::Sender<Result<Confirmation>>,
    },

    /// Shutdown actor
    Shutdown,
}

/// Actor that applies write transactions
pub struct LedgerActor {
    /// Storage backend
    storage: Arc<Storage>,

    /// Mailbox for incoming messages
    mailbox: mpsc::Receiver<LedgerMessage>,

    /// Signing account
    account: AccountId,

    /// Required attribute arity of bids and items
    attribute_arity: usize,

    /// Metrics
    metrics: Metrics,
}

impl std::fmt::Debug for LedgerActor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerActor")
            .field("account", &self.account)
            .field("attribute_arity", &self.attribute_arity)
            .finish()
    }
}

impl LedgerActor {
    /// Create new actor
    pub fn new(
        storage: Arc<Storage>,
        mailbox: mpsc::Receiver<LedgerMessage>,
        account: AccountId,
        attribute_arity: usize,
        metrics: Metrics,
    ) -> Self {
        Self {
            storage,
            mailbox,
            account,
            attribute_arity,
            metrics,
        }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                LedgerMessage::Execute { tx, response } => {
                    let kind = tx.kind();
                    let started = Instant::now();
                    let result = self.execute(tx);

                    match &result {
                        Ok(confirmation) => {
                            self.metrics
                                .record_confirmed(kind, started.elapsed().as_secs_f64());
                            tracing::debug!(
                                %kind,
                                sequence = confirmation.sequence,
                                "Transaction confirmed"
                            );
                        }
                        Err(e) => {
                            self.metrics.record_rejected();
                            tracing::warn!(%kind, error = %e, "Transaction rejected");
                        }
                    }

                    let _ = response.send(result);
                }
                LedgerMessage::Shutdown => break,
            }
        }

        tracing::debug!("Ledger actor stopped");
    }

    /// Apply one transaction against current storage
    fn execute(&mut self, tx: Transaction) -> Result<Confirmation> {
        let sequence = self.storage.tx_sequence()? + 1;
        let tx_hash = transaction_hash(sequence, &tx)?;
        let kind = tx.kind();

        let record_id = match tx {
            Transaction::SubmitBid { vector } => {
                contract::validate_vector(&vector, self.attribute_arity)?;
                Some(self.storage.append_record(RecordKind::Bid, &vector, sequence)?)
            }

            Transaction::AddItem { vector } => {
                contract::validate_vector(&vector, self.attribute_arity)?;
                Some(self.storage.append_record(RecordKind::Item, &vector, sequence)?)
            }

            Transaction::SubmitSolution {
                assignment,
                prices,
                score,
            } => {
                contract::validate_solution(&self.storage, &assignment, &prices)?;
                let solution = StoredSolution {
                    assignment,
                    prices,
                    score,
                    submitter: self.account.clone(),
                    submitted_at: Utc::now(),
                };
                self.storage.put_solution(&solution, sequence)?;
                None
            }

            Transaction::WrongScore => {
                let solution = self.storage.get_solution()?.ok_or(Error::NoSolution)?;
                let audit = contract::audit_solution(&self.storage, &solution)?;

                let reason = audit.violation.ok_or_else(|| {
                    Error::ProofRejected(format!(
                        "Stored score {} matches the recomputed assignment",
                        solution.score
                    ))
                })?;

                let record = DisputeRecord {
                    dispute_id: self.storage.disputes_count()? + 1,
                    challenger: self.account.clone(),
                    penalized: solution.submitter.clone(),
                    disputed_score: solution.score,
                    recomputed_score: audit.recomputed_score,
                    reason,
                    accepted_at: Utc::now(),
                };
                self.storage.resolve_dispute(&record, sequence)?;
                Some(record.dispute_id)
            }
        };

        Ok(Confirmation {
            tx_hash,
            sequence,
            kind,
            record_id,
            confirmed_at: Utc::now(),
        })
    }
}

/// Handle for sending messages to the actor
#[derive(Clone, Debug)]
pub struct LedgerHandle {
    sender: mpsc::Sender<LedgerMessage>,
}

impl LedgerHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<LedgerMessage>) -> Self {
        Self { sender }
    }

    /// Submit a transaction and wait for its confirmation
    pub async fn execute(&self, tx: Transaction) -> Result<Confirmation> {
        let (response, rx) = oneshot::channel();
        self.sender
            .send(LedgerMessage::Execute { tx, response })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(LedgerMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;
        Ok(())
    }
}

/// Spawn the ledger actor
pub fn spawn_ledger_actor(
    storage: Arc<Storage>,
    account: AccountId,
    attribute_arity: usize,
    mailbox_capacity: usize,
    metrics: Metrics,
) -> LedgerHandle {
    let (tx, rx) = mpsc::channel(mailbox_capacity);
    let actor = LedgerActor::new(storage, rx, account, attribute_arity, metrics);

    tokio::spawn(async move {
        actor.run().await;
    });

    LedgerHandle::new(tx)
}
