//! Settlement orchestrator
//!
//! Drives the propose, solve and verify workflows against an
//! [`AuctionLedger`] and a [`Solver`]. Every solve and every verify reads
//! bids and items afresh and re-derives the valuation; nothing is cached
//! between calls.
//!
//! Verification is two-phase. [`SettlementOrchestrator::verify`] never
//! writes; when it finds a provable discrepancy it hands back a
//! [`DisputeTicket`], and only [`SettlementOrchestrator::submit_dispute`]
//! turns a ticket into a misbehavior proof.
//!
//! Concurrent solves from several clients are not coordinated here: the
//! ledger orders the writes and the last confirmed solution wins.

use crate::{
    codec,
    config::VerificationConfig,
    ledger::AuctionLedger,
    metrics::Metrics,
    solver::{Solver, SolverInput},
    types::{EncodedSolution, LeaseTerms, LedgerSnapshot, ProposalKind, Solution},
    valuation,
    verify::{self, VerificationReport, VerifyPhase},
    Error, Result,
};
use auction_ledger::Confirmation;
use parking_lot::Mutex;
use std::fmt;

/// Result of a solve run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolveOutcome {
    /// No bids or no items on the ledger; nothing was written
    NothingToSolve {
        /// Bids read
        bids: usize,
        /// Items read
        items: usize,
    },

    /// Solver found no trade worth anything; nothing was written
    NoBeneficialTrade,

    /// Solution written to the ledger
    Submitted {
        /// Solution as computed
        solution: Solution,
        /// Ledger receipt
        confirmation: Confirmation,
    },
}

/// Result of a verify run; none of these has written anything
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// No solution on the ledger
    NothingToVerify,

    /// Solution consistent with the ledger
    Valid(VerificationReport),

    /// Only advisory checks failed; the contract would reject a dispute
    Unprovable(VerificationReport),

    /// Provable discrepancies; submit the ticket to dispute
    Disputable(DisputeTicket),

    /// Ledger state moved while verifying; no verdict
    StateChanged {
        /// What moved
        reason: String,
    },
}

impl VerifyOutcome {
    /// Short label for logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            VerifyOutcome::NothingToVerify => "nothing_to_verify",
            VerifyOutcome::Valid(_) => "valid",
            VerifyOutcome::Unprovable(_) => "unprovable",
            VerifyOutcome::Disputable(_) => "disputable",
            VerifyOutcome::StateChanged { .. } => "state_changed",
        }
    }
}

/// Evidence that a specific stored solution is disputable
///
/// Only [`SettlementOrchestrator::verify`] creates tickets. A ticket pins the
/// ledger state it was issued against and is refused once that state moves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisputeTicket {
    report: VerificationReport,
    encoded: EncodedSolution,
    bid_count: u64,
    item_count: u64,
}

impl DisputeTicket {
    /// Discrepancies backing the dispute
    pub fn report(&self) -> &VerificationReport {
        &self.report
    }
}

/// Verify run with its confirmation decision applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyResolution {
    /// Outcome of the verify run
    pub outcome: VerifyOutcome,

    /// Receipt of the misbehavior proof, when one was confirmed and sent
    pub dispute: Option<Confirmation>,
}

/// Current auction state for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuctionListing {
    /// Bids and items
    pub snapshot: LedgerSnapshot,

    /// Current solution, decoded
    pub solution: Option<Solution>,
}

impl fmt::Display for AuctionListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Bids ({}):", self.snapshot.bids.len())?;
        for (index, bid) in self.snapshot.bids.iter().enumerate() {
            writeln!(f, "  #{} {}", index + 1, bid)?;
        }

        writeln!(f, "Items ({}):", self.snapshot.items.len())?;
        for (index, item) in self.snapshot.items.iter().enumerate() {
            writeln!(f, "  #{} {}", index + 1, item)?;
        }

        match &self.solution {
            None => write!(f, "Solution: none"),
            Some(solution) => {
                writeln!(f, "Solution (score {}):", solution.score)?;
                for (index, entry) in solution.assignment.iter().enumerate() {
                    match entry {
                        Some(item) => writeln!(f, "  bid #{} -> item #{}", index + 1, item.0 + 1)?,
                        None => writeln!(f, "  bid #{} -> unassigned", index + 1)?,
                    }
                }
                let prices: Vec<String> =
                    solution.prices.iter().map(|p| p.to_string()).collect();
                write!(f, "  prices [{}]", prices.join(", "))
            }
        }
    }
}

/// Settlement orchestrator
pub struct SettlementOrchestrator<L, S> {
    ledger: L,
    solver: S,
    verification: VerificationConfig,
    metrics: Metrics,
    phase: Mutex<VerifyPhase>,
}

impl<L, S> fmt::Debug for SettlementOrchestrator<L, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettlementOrchestrator")
            .field("verification", &self.verification)
            .field("phase", &*self.phase.lock())
            .finish()
    }
}

impl<L: AuctionLedger, S: Solver> SettlementOrchestrator<L, S> {
    /// Create an orchestrator over a ledger and a solver
    pub fn new(ledger: L, solver: S, verification: VerificationConfig) -> Result<Self> {
        let metrics = Metrics::new().map_err(|e| Error::Other(e.to_string()))?;
        Ok(Self {
            ledger,
            solver,
            verification,
            metrics,
            phase: Mutex::new(VerifyPhase::Idle),
        })
    }

    /// Underlying ledger
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Release the ledger, e.g. to shut it down
    pub fn into_ledger(self) -> L {
        self.ledger
    }

    /// Settlement metrics
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Phase the last verify run reached
    pub fn verify_phase(&self) -> VerifyPhase {
        *self.phase.lock()
    }

    // Propose

    /// Append a bid or an item built from validated lease terms
    pub async fn propose(&self, kind: ProposalKind, terms: LeaseTerms) -> Result<Confirmation> {
        let vector = terms.to_vector();

        let confirmation = match kind {
            ProposalKind::Bid => self
                .ledger
                .submit_bid(vector)
                .await
                .map_err(|e| Error::transaction("submit bid", e))?,
            ProposalKind::Item => self
                .ledger
                .submit_item(vector)
                .await
                .map_err(|e| Error::transaction("submit item", e))?,
        };

        self.metrics.record_proposal(&kind.to_string());
        tracing::info!(
            %kind,
            size = terms.size,
            duration = terms.duration,
            price = terms.price,
            record_id = ?confirmation.record_id,
            tx = %confirmation.tx_hash_hex(),
            "Proposal confirmed"
        );

        Ok(confirmation)
    }

    // Reads

    /// Read every bid and item, in id order
    pub async fn fetch_snapshot(&self) -> Result<LedgerSnapshot> {
        let bid_count = self.ledger.bid_count().await?;
        let mut bids = Vec::with_capacity(bid_count as usize);
        for id in 1..=bid_count {
            let bid = self.ledger.bid(id).await?;
            tracing::debug!(id, %bid, "Read bid");
            bids.push(bid);
        }

        let item_count = self.ledger.item_count().await?;
        let mut items = Vec::with_capacity(item_count as usize);
        for id in 1..=item_count {
            let item = self.ledger.item(id).await?;
            tracing::debug!(id, %item, "Read item");
            items.push(item);
        }

        Ok(LedgerSnapshot { bids, items })
    }

    /// Read the current solution in wire form
    ///
    /// An absent solution reads as all zero and comes back as the default
    /// (empty) value.
    async fn fetch_encoded_solution(&self) -> Result<EncodedSolution> {
        let score = self.ledger.solution_score().await?;
        let assignment_count = self.ledger.solution_assignment_count().await?;
        let price_count = self.ledger.solution_price_count().await?;

        if score == 0 && assignment_count == 0 && price_count == 0 {
            return Ok(EncodedSolution::default());
        }

        let mut assignment = Vec::with_capacity(assignment_count as usize);
        for index in 0..assignment_count {
            assignment.push(self.ledger.assignment_entry(index).await?);
        }

        let mut prices = Vec::with_capacity(price_count as usize);
        for index in 0..price_count {
            prices.push(self.ledger.price_entry(index).await?);
        }

        Ok(EncodedSolution {
            assignment,
            prices,
            score,
        })
    }

    /// Current bids, items and decoded solution
    pub async fn list(&self) -> Result<AuctionListing> {
        let encoded = self.fetch_encoded_solution().await?;
        let snapshot = self.fetch_snapshot().await?;

        let solution = if encoded.is_absent() {
            None
        } else {
            Some(codec::decode_solution(&encoded))
        };

        Ok(AuctionListing { snapshot, solution })
    }

    fn solver_input(&self, snapshot: &LedgerSnapshot) -> Result<SolverInput> {
        let derived = valuation::derive(&snapshot.bids, &snapshot.items)?;
        Ok(SolverInput {
            item_ids: snapshot.item_ids(),
            min_prices: derived.min_prices,
            bidder_ids: snapshot.bidder_ids(),
            valuations: derived.relation,
        })
    }

    // Solve

    /// Compute and submit a solution for the current bids and items
    pub async fn solve(&self) -> Result<SolveOutcome> {
        tracing::info!("Starting solve");

        // Step 1: Read ledger state
        let snapshot = self.fetch_snapshot().await?;
        if snapshot.is_unsolvable() {
            tracing::info!(
                bid_count = snapshot.bids.len(),
                item_count = snapshot.items.len(),
                "Nothing to solve"
            );
            self.metrics.record_solve("nothing_to_solve");
            return Ok(SolveOutcome::NothingToSolve {
                bids: snapshot.bids.len(),
                items: snapshot.items.len(),
            });
        }

        // Step 2: Derive valuations and solve
        let input = self.solver_input(&snapshot)?;
        let solution = self.solver.solve(&input)?;

        tracing::info!(
            bid_count = snapshot.bids.len(),
            item_count = snapshot.items.len(),
            assigned = solution.assigned_count(),
            score = solution.score,
            "Solver finished"
        );

        // Step 3: Keep any existing solution when there is nothing to gain
        if solution.score == 0 {
            tracing::info!("No beneficial trade, leaving ledger untouched");
            self.metrics.record_solve("no_beneficial_trade");
            return Ok(SolveOutcome::NoBeneficialTrade);
        }

        // Step 4: Encode and submit as one transaction
        let encoded = codec::encode_solution(&solution)?;
        let confirmation = self
            .ledger
            .submit_solution(encoded.assignment, encoded.prices, encoded.score)
            .await
            .map_err(|e| Error::transaction("submit solution", e))?;

        self.metrics.record_solve("submitted");
        tracing::info!(
            score = solution.score,
            tx = %confirmation.tx_hash_hex(),
            sequence = confirmation.sequence,
            "Solution submitted"
        );

        Ok(SolveOutcome::Submitted {
            solution,
            confirmation,
        })
    }

    // Verify

    fn enter_phase(&self, next: VerifyPhase) {
        let mut phase = self.phase.lock();
        let from = *phase;
        if next != VerifyPhase::Idle && !from.can_advance_to(next) {
            tracing::warn!(%from, to = %next, "Unexpected verify phase transition");
        }
        tracing::debug!(phase = %next, "Verify phase");
        *phase = next;
    }

    /// Re-check the current solution against fresh ledger state
    ///
    /// Never writes. A provable discrepancy yields
    /// [`VerifyOutcome::Disputable`]; pass its ticket to
    /// [`submit_dispute`](Self::submit_dispute) to act on it.
    pub async fn verify(&self) -> Result<VerifyOutcome> {
        let outcome = self.run_verify().await?;
        self.metrics.record_verification(outcome.label());
        Ok(outcome)
    }

    async fn run_verify(&self) -> Result<VerifyOutcome> {
        self.enter_phase(VerifyPhase::Idle);
        tracing::info!("Starting verification");

        // Step 1: Read the claimed solution
        let encoded = self.fetch_encoded_solution().await?;
        if encoded.is_absent() {
            tracing::info!("No solution to verify");
            self.enter_phase(VerifyPhase::Aborted);
            return Ok(VerifyOutcome::NothingToVerify);
        }
        let claimed = codec::decode_solution(&encoded);
        self.enter_phase(VerifyPhase::Fetched);

        // Step 2: Re-derive everything from ledger state
        let snapshot = self.fetch_snapshot().await?;
        let input = self.solver_input(&snapshot)?;
        let covered = snapshot.prefix(claimed.assignment.len(), claimed.prices.len());
        if covered.bids.len() < snapshot.bids.len() || covered.items.len() < snapshot.items.len() {
            tracing::info!(
                covered_bids = covered.bids.len(),
                covered_items = covered.items.len(),
                bid_count = snapshot.bids.len(),
                item_count = snapshot.items.len(),
                "Solution predates newer records"
            );
        }
        let reference = if self.verification.check_optimality {
            Some(self.solver.solve(&self.solver_input(&covered)?)?)
        } else {
            None
        };
        let derived = valuation::Valuation {
            relation: input.valuations,
            min_prices: input.min_prices,
        };
        let report = verify::check_solution(
            &derived,
            &claimed,
            reference.as_ref(),
            self.verification.check_price_ceiling,
        );
        self.enter_phase(VerifyPhase::Recomputed);

        // Step 3: Refuse a verdict if the ledger moved underneath us
        let bid_count = self.ledger.bid_count().await?;
        let item_count = self.ledger.item_count().await?;
        let current = self.fetch_encoded_solution().await?;

        if bid_count != snapshot.bids.len() as u64 || item_count != snapshot.items.len() as u64 {
            let reason = format!(
                "bids {} -> {}, items {} -> {}",
                snapshot.bids.len(),
                bid_count,
                snapshot.items.len(),
                item_count
            );
            tracing::warn!(%reason, "Ledger state changed during verification");
            self.enter_phase(VerifyPhase::Aborted);
            return Ok(VerifyOutcome::StateChanged { reason });
        }
        if current != encoded {
            let reason = format!("solution score {} -> {}", encoded.score, current.score);
            tracing::warn!(%reason, "Solution replaced during verification");
            self.enter_phase(VerifyPhase::Aborted);
            return Ok(VerifyOutcome::StateChanged { reason });
        }

        // Step 4: Verdict
        if report.is_consistent() {
            tracing::info!(score = report.claimed.score, "Solution verified");
            self.enter_phase(VerifyPhase::Valid);
            return Ok(VerifyOutcome::Valid(report));
        }

        for discrepancy in &report.discrepancies {
            tracing::warn!(
                %discrepancy,
                provable = discrepancy.is_provable(),
                "Discrepancy found"
            );
        }

        if !report.is_provable() {
            tracing::info!("Only advisory discrepancies, not disputable");
            self.enter_phase(VerifyPhase::Valid);
            return Ok(VerifyOutcome::Unprovable(report));
        }

        tracing::warn!(
            claimed = report.claimed.score,
            recomputed = report.recomputed_score,
            discrepancies = report.discrepancies.len(),
            "Solution is disputable"
        );
        self.enter_phase(VerifyPhase::Disputable);

        Ok(VerifyOutcome::Disputable(DisputeTicket {
            report,
            encoded,
            bid_count,
            item_count,
        }))
    }

    /// Submit a misbehavior proof for a ticket issued by [`verify`](Self::verify)
    ///
    /// The ticket is refused if bids, items or the solution changed since it
    /// was issued.
    pub async fn submit_dispute(&self, ticket: DisputeTicket) -> Result<Confirmation> {
        let bid_count = self.ledger.bid_count().await?;
        let item_count = self.ledger.item_count().await?;
        let current = self.fetch_encoded_solution().await?;

        if bid_count != ticket.bid_count || item_count != ticket.item_count {
            return Err(Error::StaleTicket(format!(
                "ticket issued for {} bids and {} items, ledger now has {} and {}",
                ticket.bid_count, ticket.item_count, bid_count, item_count
            )));
        }
        if current != ticket.encoded {
            return Err(Error::StaleTicket(
                "disputed solution is no longer current".to_string(),
            ));
        }

        let confirmation = self
            .ledger
            .submit_misbehavior_proof()
            .await
            .map_err(|e| Error::transaction("misbehavior proof", e))?;

        self.metrics.disputes_total.inc();
        self.enter_phase(VerifyPhase::DisputeSubmitted);
        tracing::info!(
            disputed_score = ticket.report.claimed.score,
            recomputed = ticket.report.recomputed_score,
            tx = %confirmation.tx_hash_hex(),
            "Misbehavior proof confirmed"
        );

        Ok(confirmation)
    }

    /// Verify, then dispute only if `confirm` approves the report
    pub async fn verify_with_confirmation<F>(&self, confirm: F) -> Result<VerifyResolution>
    where
        F: FnOnce(&VerificationReport) -> bool + Send,
    {
        let outcome = self.verify().await?;

        let ticket = match &outcome {
            VerifyOutcome::Disputable(ticket) => ticket,
            _ => {
                return Ok(VerifyResolution {
                    outcome,
                    dispute: None,
                })
            }
        };

        if !confirm(ticket.report()) {
            tracing::info!("Dispute declined");
            return Ok(VerifyResolution {
                outcome,
                dispute: None,
            });
        }

        let dispute = self.submit_dispute(ticket.clone()).await?;
        Ok(VerifyResolution {
            outcome,
            dispute: Some(dispute),
        })
    }
}
