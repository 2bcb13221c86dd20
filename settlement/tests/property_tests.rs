//! Property-based tests for settlement invariants
//!
//! - Feasibility: a pair is worth the bid price iff every attribute is covered
//! - Codec: item indices below the sentinel survive the wire, others are rejected
//! - Solver: reference solutions always pass verification and reach the
//!   exhaustive-search optimum
//! - Verification: an inflated score is a provable discrepancy

use auction_settlement::{
    codec, valuation, verify, AssignmentSolver, AttributeVector, BidderId, Discrepancy, Error,
    ItemId, LedgerSnapshot, Solver, SolverInput,
};
use proptest::prelude::*;

/// Strategy for storage-lease vectors
fn lease_strategy() -> impl Strategy<Value = AttributeVector> {
    (0u64..12, 0u64..12, 1u64..40)
        .prop_map(|(size, duration, price)| AttributeVector::lease(size, duration, price))
}

/// Best total value over every one-to-one assignment of tradable pairs
fn exhaustive_optimum(derived: &valuation::Valuation, bidder: usize, taken: &mut [bool]) -> u64 {
    if bidder == derived.relation.bidder_count() {
        return 0;
    }

    let mut best = exhaustive_optimum(derived, bidder + 1, taken);
    for item in 0..taken.len() {
        let value = derived.relation.value(BidderId(bidder), ItemId(item));
        let reserve = derived.min_prices.get(ItemId(item)).unwrap_or(0);
        if taken[item] || value == 0 || value < reserve {
            continue;
        }
        taken[item] = true;
        best = best.max(value + exhaustive_optimum(derived, bidder + 1, taken));
        taken[item] = false;
    }
    best
}

fn solver_input(bids: &[AttributeVector], items: &[AttributeVector]) -> SolverInput {
    let snapshot = LedgerSnapshot {
        bids: bids.to_vec(),
        items: items.to_vec(),
    };
    let derived = valuation::derive(bids, items).unwrap();
    SolverInput {
        item_ids: snapshot.item_ids(),
        min_prices: derived.min_prices,
        bidder_ids: snapshot.bidder_ids(),
        valuations: derived.relation,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: value is the bid price exactly when the item covers the bid
    #[test]
    fn prop_feasibility_matches_coverage(bid in lease_strategy(), item in lease_strategy()) {
        let value = valuation::pair_value(&bid, &item);
        let covered = bid
            .constraints()
            .iter()
            .zip(item.constraints())
            .all(|(demand, offer)| demand <= offer);

        prop_assert_eq!(value != 0, covered);
        if covered {
            prop_assert_eq!(value, bid.price());
        }
    }

    /// Property: assignments within range survive encoding unchanged
    #[test]
    fn prop_codec_preserves_assignment(
        raw in prop::collection::vec(prop::option::of(0usize..codec::MAX_ITEMS), 0..20),
    ) {
        let assignment: Vec<Option<ItemId>> = raw.into_iter().map(|i| i.map(ItemId)).collect();
        let encoded = codec::encode_assignment(&assignment).unwrap();
        prop_assert_eq!(codec::decode_assignment(&encoded), assignment);
    }

    /// Property: an index at or above the sentinel never reaches the wire
    #[test]
    fn prop_codec_rejects_sentinel_collision(item in codec::MAX_ITEMS..1000) {
        let result = codec::encode_assignment(&[None, Some(ItemId(item))]);
        let rejected = matches!(result, Err(Error::EncodingRange { item: i, .. }) if i == item);
        prop_assert!(rejected);
    }

    /// Property: the reference solver's output is always consistent
    #[test]
    fn prop_solver_output_verifies(
        bids in prop::collection::vec(lease_strategy(), 1..6),
        items in prop::collection::vec(lease_strategy(), 1..6),
    ) {
        let input = solver_input(&bids, &items);
        let solution = AssignmentSolver.solve(&input).unwrap();
        let derived = valuation::derive(&bids, &items).unwrap();

        let report = verify::check_solution(&derived, &solution, None, true);
        prop_assert!(report.is_consistent(), "{:?}", report.discrepancies);
        prop_assert_eq!(report.recomputed_score, solution.score);

        for (bidder, assigned) in solution.assignment.iter().enumerate() {
            if let Some(item) = assigned {
                let value = derived.relation.value(BidderId(bidder), *item);
                let price = solution.prices[item.0];
                prop_assert!(price >= items[item.0].price());
                prop_assert!(price <= value);
            }
        }
    }

    /// Property: the solver's score equals the exhaustive-search optimum,
    /// with more bidders than items and the other way round
    #[test]
    fn prop_solver_matches_exhaustive_optimum(
        bids in prop::collection::vec(lease_strategy(), 1..=5),
        items in prop::collection::vec(lease_strategy(), 1..=5),
    ) {
        let input = solver_input(&bids, &items);
        let solution = AssignmentSolver.solve(&input).unwrap();
        let derived = valuation::derive(&bids, &items).unwrap();

        let optimum = exhaustive_optimum(&derived, 0, &mut vec![false; items.len()]);
        prop_assert_eq!(solution.score, optimum);
    }

    /// Property: any inflated score is caught and provable
    #[test]
    fn prop_inflated_score_provable(
        bids in prop::collection::vec(lease_strategy(), 1..6),
        items in prop::collection::vec(lease_strategy(), 1..6),
        inflation in 1u64..1000,
    ) {
        let input = solver_input(&bids, &items);
        let mut solution = AssignmentSolver.solve(&input).unwrap();
        let honest = solution.score;
        solution.score += inflation;

        let derived = valuation::derive(&bids, &items).unwrap();
        let report = verify::check_solution(&derived, &solution, None, false);

        prop_assert!(report.is_provable());
        let expected = Discrepancy::ScoreMismatch {
            claimed: honest + inflation,
            recomputed: honest,
        };
        prop_assert!(report.discrepancies.contains(&expected));
    }
}
