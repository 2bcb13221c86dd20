//! End-to-end settlement scenarios
//!
//! Run against the in-memory ledger and the RocksDB ledger. The fault
//! injecting solvers below stand in for a dishonest or buggy solution
//! submitter.

use auction_ledger::{AccountId, Config as LedgerConfig, Ledger};
use auction_settlement::{
    AssignmentSolver, AttributeVector, Discrepancy, Error, ItemId, LeaseTerms, MockLedger,
    ProposalKind, SettlementOrchestrator, Solution, SolveOutcome, Solver, SolverInput,
    VerificationConfig, VerifyOutcome,
};
use std::sync::Arc;
use tempfile::TempDir;

fn lease(size: u64, duration: u64, price: u64) -> AttributeVector {
    AttributeVector::lease(size, duration, price)
}

/// Reference solver with its score inflated by a fixed amount
struct InflatingSolver {
    inner: AssignmentSolver,
    inflation: u64,
}

impl Solver for InflatingSolver {
    fn solve(&self, input: &SolverInput) -> auction_settlement::Result<Solution> {
        let mut solution = self.inner.solve(input)?;
        solution.score += self.inflation;
        Ok(solution)
    }
}

/// Always returns the same solution
struct FixedSolver(Solution);

impl Solver for FixedSolver {
    fn solve(&self, _input: &SolverInput) -> auction_settlement::Result<Solution> {
        Ok(self.0.clone())
    }
}

async fn rocks_ledger(account: &str) -> (Ledger, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = LedgerConfig::default();
    config.data_dir = temp_dir.path().to_path_buf();
    config.account = account.to_string();

    (Ledger::open(config).await.unwrap(), temp_dir)
}

async fn seed<S: Solver>(
    orchestrator: &SettlementOrchestrator<impl auction_settlement::AuctionLedger, S>,
    bids: &[(i64, i64, i64)],
    items: &[(i64, i64, i64)],
) {
    for &(size, duration, price) in bids {
        let terms = LeaseTerms::new(size, duration, price).unwrap();
        orchestrator.propose(ProposalKind::Bid, terms).await.unwrap();
    }
    for &(size, duration, price) in items {
        let terms = LeaseTerms::new(size, duration, price).unwrap();
        orchestrator.propose(ProposalKind::Item, terms).await.unwrap();
    }
}

#[tokio::test]
async fn test_feasible_bid_settles_and_verifies() {
    let (ledger, _temp) = rocks_ledger("solver").await;
    let orchestrator =
        SettlementOrchestrator::new(ledger, AssignmentSolver, VerificationConfig::default())
            .unwrap();
    seed(&orchestrator, &[(2, 5, 10)], &[(4, 10, 3)]).await;

    let outcome = orchestrator.solve().await.unwrap();
    let solution = match outcome {
        SolveOutcome::Submitted { solution, .. } => solution,
        other => panic!("expected submission, got {:?}", other),
    };
    assert_eq!(solution.assignment, vec![Some(ItemId(0))]);
    assert_eq!(solution.prices, vec![3]);
    assert_eq!(solution.score, 10);

    let stored = orchestrator.ledger().solution().unwrap().unwrap();
    assert_eq!(stored.assignment, vec![0]);

    match orchestrator.verify().await.unwrap() {
        VerifyOutcome::Valid(report) => assert_eq!(report.recomputed_score, 10),
        other => panic!("expected valid, got {:?}", other),
    }

    orchestrator.into_ledger().shutdown().await.unwrap();
}

#[tokio::test]
async fn test_infeasible_claim_is_disputable() {
    let claim = Solution {
        assignment: vec![Some(ItemId(0))],
        prices: vec![3],
        score: 10,
    };
    let (ledger, _temp) = rocks_ledger("cheater").await;
    let orchestrator = SettlementOrchestrator::new(
        ledger,
        FixedSolver(claim),
        VerificationConfig::default(),
    )
    .unwrap();
    seed(&orchestrator, &[(5, 5, 10)], &[(2, 10, 3)]).await;

    assert!(matches!(
        orchestrator.solve().await.unwrap(),
        SolveOutcome::Submitted { .. }
    ));

    let ticket = match orchestrator.verify().await.unwrap() {
        VerifyOutcome::Disputable(ticket) => ticket,
        other => panic!("expected dispute, got {:?}", other),
    };
    assert!(ticket
        .report()
        .discrepancies
        .contains(&Discrepancy::InfeasibleAssignment {
            bidder: auction_settlement::BidderId(0),
            item: ItemId(0),
        }));

    // Nothing happens until the ticket is submitted
    assert!(orchestrator.ledger().solution().unwrap().is_some());

    orchestrator.submit_dispute(ticket).await.unwrap();

    let ledger = orchestrator.into_ledger();
    assert!(ledger.solution().unwrap().is_none());
    assert_eq!(ledger.penalties(&AccountId::new("cheater")).unwrap(), 1);
    ledger.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_infeasible_bidder_left_unassigned() {
    let orchestrator = SettlementOrchestrator::new(
        MockLedger::default(),
        AssignmentSolver,
        VerificationConfig::default(),
    )
    .unwrap();
    seed(&orchestrator, &[(5, 5, 10), (2, 5, 8)], &[(4, 10, 3)]).await;

    orchestrator.solve().await.unwrap();

    let (wire, _, score) = orchestrator.ledger().stored_solution().unwrap();
    assert_eq!(wire, vec![255, 0]);
    assert_eq!(score, 8);

    let listing = orchestrator.list().await.unwrap();
    assert_eq!(
        listing.solution.unwrap().assignment,
        vec![None, Some(ItemId(0))]
    );
}

#[tokio::test]
async fn test_fake_solve_is_caught_and_penalized() {
    let (ledger, _temp) = rocks_ledger("faker").await;
    let orchestrator = SettlementOrchestrator::new(
        ledger,
        InflatingSolver {
            inner: AssignmentSolver,
            inflation: 100,
        },
        VerificationConfig::default(),
    )
    .unwrap();
    seed(&orchestrator, &[(2, 5, 10)], &[(4, 10, 3)]).await;

    orchestrator.solve().await.unwrap();
    assert_eq!(orchestrator.ledger().solution_score().unwrap(), 110);

    let resolution = orchestrator
        .verify_with_confirmation(|report| {
            report.discrepancies
                == vec![Discrepancy::ScoreMismatch {
                    claimed: 110,
                    recomputed: 10,
                }]
        })
        .await
        .unwrap();
    assert!(resolution.dispute.is_some());

    let ledger = orchestrator.into_ledger();
    assert_eq!(ledger.solution_score().unwrap(), 0);
    assert_eq!(ledger.penalties(&AccountId::new("faker")).unwrap(), 1);
    assert_eq!(ledger.disputes().unwrap()[0].recomputed_score, 10);
    ledger.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_suboptimal_solution_only_reported() {
    let ledger = MockLedger::with_records(
        vec![lease(1, 1, 5), lease(1, 1, 9)],
        vec![lease(2, 2, 1)],
    );
    // Consistent but leaves value on the table
    ledger.with_state(|state| state.set_solution(vec![0, 255], vec![1], 5));

    let verification = VerificationConfig {
        check_optimality: true,
        check_price_ceiling: true,
    };
    let orchestrator = SettlementOrchestrator::new(ledger, AssignmentSolver, verification).unwrap();

    match orchestrator.verify().await.unwrap() {
        VerifyOutcome::Unprovable(report) => {
            assert_eq!(report.reference_score, Some(9));
            assert_eq!(
                report.discrepancies,
                vec![Discrepancy::Suboptimal {
                    claimed: 5,
                    optimal: 9
                }]
            );
        }
        other => panic!("expected unprovable, got {:?}", other),
    }
    assert_eq!(orchestrator.ledger().confirmed_writes(), 0);
}

#[tokio::test]
async fn test_concurrent_solvers_last_write_wins() {
    let (ledger, _temp) = rocks_ledger("shared").await;
    let ledger = Arc::new(ledger);

    let honest = SettlementOrchestrator::new(
        ledger.clone(),
        AssignmentSolver,
        VerificationConfig::default(),
    )
    .unwrap();
    let inflated = SettlementOrchestrator::new(
        ledger.clone(),
        InflatingSolver {
            inner: AssignmentSolver,
            inflation: 1,
        },
        VerificationConfig::default(),
    )
    .unwrap();
    seed(&honest, &[(1, 1, 5)], &[(1, 1, 1)]).await;

    let (a, b) = tokio::join!(honest.solve(), inflated.solve());
    let sequence = |outcome: SolveOutcome| match outcome {
        SolveOutcome::Submitted { confirmation, .. } => confirmation.sequence,
        other => panic!("expected submission, got {:?}", other),
    };
    let (honest_seq, inflated_seq) = (sequence(a.unwrap()), sequence(b.unwrap()));

    let expected = if honest_seq > inflated_seq { 5 } else { 6 };
    assert_eq!(ledger.solution_score().unwrap(), expected);
}

#[tokio::test]
async fn test_item_beyond_sentinel_range_rejected() {
    // Only the 256th item (index 255) covers the bid
    let mut items = vec![lease(1, 1, 0); 255];
    items.push(lease(9, 9, 0));
    let orchestrator = SettlementOrchestrator::new(
        MockLedger::with_records(vec![lease(5, 5, 1)], items),
        AssignmentSolver,
        VerificationConfig::default(),
    )
    .unwrap();

    let err = orchestrator.solve().await.unwrap_err();
    assert!(matches!(err, Error::EncodingRange { item: 255, .. }));
    assert_eq!(orchestrator.ledger().confirmed_writes(), 0);
}

#[tokio::test]
async fn test_mixed_schema_rejected() {
    let orchestrator = SettlementOrchestrator::new(
        MockLedger::with_records(
            vec![lease(2, 5, 10)],
            vec![AttributeVector::new(vec![4, 3]).unwrap()],
        ),
        AssignmentSolver,
        VerificationConfig::default(),
    )
    .unwrap();

    assert!(matches!(
        orchestrator.solve().await,
        Err(Error::SchemaMismatch { .. })
    ));
}

#[tokio::test]
async fn test_invalid_terms_never_reach_ledger() {
    let orchestrator = SettlementOrchestrator::new(
        MockLedger::default(),
        AssignmentSolver,
        VerificationConfig::default(),
    )
    .unwrap();

    async fn propose_raw<L: auction_settlement::AuctionLedger, S: Solver>(
        orchestrator: &SettlementOrchestrator<L, S>,
        raw: (&str, &str, &str),
    ) -> auction_settlement::Result<()> {
        let terms = LeaseTerms::parse(raw.0, raw.1, raw.2)?;
        orchestrator.propose(ProposalKind::Bid, terms).await?;
        Ok(())
    }

    for raw in [("2", "-5", "10"), ("2", "5", "ten"), ("1.5", "5", "10")] {
        let result = propose_raw(&orchestrator, raw).await;
        assert!(
            matches!(result, Err(Error::InvalidInput { .. })),
            "{:?} gave {:?}",
            raw,
            result
        );
    }
    assert_eq!(orchestrator.ledger().confirmed_writes(), 0);

    propose_raw(&orchestrator, ("2", "5", "10")).await.unwrap();
    assert_eq!(orchestrator.ledger().confirmed_writes(), 1);
    assert_eq!(
        orchestrator.fetch_snapshot().await.unwrap().bids,
        vec![lease(2, 5, 10)]
    );
}

#[tokio::test]
async fn test_solve_without_bids_is_noop() {
    let orchestrator = SettlementOrchestrator::new(
        MockLedger::with_records(vec![], vec![lease(4, 10, 3)]),
        AssignmentSolver,
        VerificationConfig::default(),
    )
    .unwrap();

    assert_eq!(
        orchestrator.solve().await.unwrap(),
        SolveOutcome::NothingToSolve { bids: 0, items: 1 }
    );
    assert_eq!(orchestrator.ledger().confirmed_writes(), 0);
    assert!(orchestrator.ledger().stored_solution().is_none());
}

#[tokio::test]
async fn test_records_after_solve_do_not_invalidate_it() {
    let (ledger, _temp) = rocks_ledger("early").await;
    let orchestrator = SettlementOrchestrator::new(
        ledger,
        AssignmentSolver,
        VerificationConfig {
            check_optimality: true,
            check_price_ceiling: true,
        },
    )
    .unwrap();
    seed(&orchestrator, &[(2, 5, 10)], &[(4, 10, 3)]).await;
    orchestrator.solve().await.unwrap();

    // A bid and an item that would change the optimum, appended afterwards
    seed(&orchestrator, &[(1, 1, 50)], &[(9, 9, 1)]).await;

    match orchestrator.verify().await.unwrap() {
        VerifyOutcome::Valid(report) => {
            assert_eq!(report.recomputed_score, 10);
            assert_eq!(report.reference_score, Some(10));
        }
        other => panic!("expected valid, got {:?}", other),
    }

    let ledger = orchestrator.into_ledger();
    assert!(matches!(
        ledger.wrong_score().await,
        Err(auction_ledger::Error::ProofRejected(_))
    ));
    assert_eq!(ledger.solution_score().unwrap(), 10);
    assert_eq!(ledger.penalties(&AccountId::new("early")).unwrap(), 0);
    ledger.shutdown().await.unwrap();
}
