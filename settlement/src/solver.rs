//! Solver seam and the reference assignment solver
//!
//! The settlement client only relies on the [`Solver`] contract: given item
//! ids, reserve prices, bidder ids and the valuation relation, return an
//! assignment, a price per item and a score. Implementations must be
//! deterministic, since verification re-runs them on the same inputs.

use crate::{
    types::{BidderId, ItemId, MinPrices, Solution, ValuationRelation},
    Error, Result,
};

/// Solver inputs, in the order the auction hands them over
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolverInput {
    /// Item indices
    pub item_ids: Vec<ItemId>,

    /// Reserve price per item
    pub min_prices: MinPrices,

    /// Bidder indices
    pub bidder_ids: Vec<BidderId>,

    /// Bidder x item values
    pub valuations: ValuationRelation,
}

impl SolverInput {
    /// Check that ids, reserves and relation describe the same auction
    pub fn validate(&self) -> Result<()> {
        if self.valuations.bidder_count() != self.bidder_ids.len()
            || self.valuations.item_count() != self.item_ids.len()
        {
            return Err(Error::Solver(format!(
                "Valuation relation is {}x{} but {} bidders and {} items were given",
                self.valuations.bidder_count(),
                self.valuations.item_count(),
                self.bidder_ids.len(),
                self.item_ids.len()
            )));
        }

        if let Some(missing) = self
            .item_ids
            .iter()
            .find(|&&item| self.min_prices.get(item).is_none())
        {
            return Err(Error::Solver(format!("No reserve price for {}", missing)));
        }

        Ok(())
    }

    /// Reserve of an item (validated inputs always carry one)
    fn reserve(&self, item: ItemId) -> u64 {
        self.min_prices.get(item).unwrap_or(0)
    }

    /// Value of a pair if it clears the item's reserve, else 0
    fn eligible_value(&self, bidder: BidderId, item: ItemId) -> u64 {
        let value = self.valuations.value(bidder, item);
        if value > 0 && value >= self.reserve(item) {
            value
        } else {
            0
        }
    }
}

/// Assignment and pricing engine
pub trait Solver: Send + Sync {
    /// Compute assignment, prices and score
    fn solve(&self, input: &SolverInput) -> Result<Solution>;
}

/// Welfare-maximizing assignment with reserve-respecting clearing prices
///
/// - Each bidder receives at most one item and each item goes to at most one
///   bidder; only pairs whose value is positive and at least the item's
///   reserve are tradable.
/// - The assignment maximizes the total value (Hungarian algorithm on the
///   padded square matrix). Among assignments of equal value, the one with
///   the smallest sum of bidder and item indices over its traded pairs wins.
/// - An unsold item is priced at its reserve. A sold item is priced at the
///   highest competing value among bidders left without an item, floored at
///   the reserve and capped at the winner's own value.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssignmentSolver;

impl AssignmentSolver {
    /// Create a new solver
    pub fn new() -> Self {
        Self
    }
}

impl Solver for AssignmentSolver {
    fn solve(&self, input: &SolverInput) -> Result<Solution> {
        input.validate()?;

        let bidders = input.bidder_ids.len();
        let items = input.item_ids.len();

        let mut assignment = vec![None; bidders];
        if bidders > 0 && items > 0 {
            let size = bidders.max(items);
            // Index penalties sum to less than `scale`, so one unit of value
            // always outweighs them
            let scale = 2 * (size as i128) * (size as i128) + 1;
            let mut cost = vec![vec![0i128; size]; size];
            for (b, &bidder) in input.bidder_ids.iter().enumerate() {
                for (i, &item) in input.item_ids.iter().enumerate() {
                    let value = input.eligible_value(bidder, item);
                    if value > 0 {
                        let weighted = i128::from(value).checked_mul(scale).ok_or_else(|| {
                            Error::Solver(format!("Value {} too large to weigh", value))
                        })?;
                        cost[b][i] = (b + i) as i128 - weighted;
                    }
                }
            }

            for (row, col) in hungarian(&cost).into_iter().enumerate() {
                if row < bidders
                    && col < items
                    && input.eligible_value(input.bidder_ids[row], input.item_ids[col]) > 0
                {
                    assignment[row] = Some(input.item_ids[col]);
                }
            }
        }

        let mut score = 0u64;
        for (b, entry) in assignment.iter().enumerate() {
            if let Some(item) = entry {
                score = score
                    .checked_add(input.valuations.value(input.bidder_ids[b], *item))
                    .ok_or_else(|| Error::Solver("Score overflows u64".to_string()))?;
            }
        }

        let prices = input
            .item_ids
            .iter()
            .map(|&item| clearing_price(input, &assignment, item))
            .collect();

        tracing::debug!(
            bidders,
            items,
            assigned = assignment.iter().filter(|a| a.is_some()).count(),
            score,
            "Assignment solved"
        );

        Ok(Solution {
            assignment,
            prices,
            score,
        })
    }
}

fn clearing_price(input: &SolverInput, assignment: &[Option<ItemId>], item: ItemId) -> u64 {
    let reserve = input.reserve(item);

    let winner = match assignment.iter().position(|&a| a == Some(item)) {
        Some(b) => input.bidder_ids[b],
        None => return reserve,
    };
    let winning_value = input.valuations.value(winner, item);

    let competing = input
        .bidder_ids
        .iter()
        .zip(assignment)
        .filter(|(_, entry)| entry.is_none())
        .map(|(&bidder, _)| input.eligible_value(bidder, item))
        .max()
        .unwrap_or(0);

    reserve.max(competing).min(winning_value)
}

/// Minimum-cost perfect matching on a square matrix
///
/// Returns the column matched to each row. O(n^3) potentials-based
/// Hungarian algorithm; deterministic for a given matrix.
fn hungarian(cost: &[Vec<i128>]) -> Vec<usize> {
    let n = cost.len();
    let inf = i128::MAX / 4;

    // 1-based potentials and matching; column 0 is the virtual start
    let mut u = vec![0i128; n + 1];
    let mut v = vec![0i128; n + 1];
    let mut row_of_col = vec![0usize; n + 1];
    let mut way = vec![0usize; n + 1];

    for row in 1..=n {
        row_of_col[0] = row;
        let mut col0 = 0usize;
        let mut min_v = vec![inf; n + 1];
        let mut used = vec![false; n + 1];

        loop {
            used[col0] = true;
            let row0 = row_of_col[col0];
            let mut delta = inf;
            let mut col1 = 0usize;

            for col in 1..=n {
                if used[col] {
                    continue;
                }
                let reduced = cost[row0 - 1][col - 1] - u[row0] - v[col];
                if reduced < min_v[col] {
                    min_v[col] = reduced;
                    way[col] = col0;
                }
                if min_v[col] < delta {
                    delta = min_v[col];
                    col1 = col;
                }
            }

            for col in 0..=n {
                if used[col] {
                    u[row_of_col[col]] += delta;
                    v[col] -= delta;
                } else {
                    min_v[col] -= delta;
                }
            }

            col0 = col1;
            if row_of_col[col0] == 0 {
                break;
            }
        }

        // Augment along the alternating path
        loop {
            let col1 = way[col0];
            row_of_col[col0] = row_of_col[col1];
            col0 = col1;
            if col0 == 0 {
                break;
            }
        }
    }

    let mut col_of_row = vec![0usize; n];
    for col in 1..=n {
        if row_of_col[col] > 0 {
            col_of_row[row_of_col[col] - 1] = col - 1;
        }
    }
    col_of_row
}
