//! Independent re-check of a submitted solution
//!
//! [`check_solution`] compares a claimed solution against a freshly derived
//! valuation and lists every [`Discrepancy`] it finds. It never talks to the
//! ledger; the orchestrator owns fetching, snapshot consistency and the
//! confirmation gate before a dispute.
//!
//! Discrepancies come in two strengths. Shape, feasibility, reserve and
//! score checks are the ones the contract re-runs when it judges a
//! misbehavior proof, so a dispute built on them is accepted. The price
//! ceiling and optimality checks are opt-in and advisory: the contract does
//! not enforce them, so they are reported but never turned into a dispute.

use crate::{
    types::{BidderId, ItemId, Solution},
    valuation::Valuation,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A failed consistency check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Discrepancy {
    /// Assignment has more entries than there are bidders
    AssignmentLength {
        /// Entries in the claimed assignment
        claimed: usize,
        /// Bidders on the ledger
        bidders: usize,
    },

    /// Price list has more entries than there are items
    PriceListLength {
        /// Entries in the claimed price list
        claimed: usize,
        /// Items on the ledger
        items: usize,
    },

    /// Bidder assigned to an item outside the solution's price list
    UnknownItem {
        /// Bidder
        bidder: BidderId,
        /// Claimed item
        item: ItemId,
    },

    /// Item assigned to more than one bidder
    DuplicateItem {
        /// Item
        item: ItemId,
        /// First holder
        first: BidderId,
        /// Second holder
        second: BidderId,
    },

    /// Bidder assigned to an item that does not cover its demand
    InfeasibleAssignment {
        /// Bidder
        bidder: BidderId,
        /// Item
        item: ItemId,
    },

    /// Clearing price below the item's reserve
    PriceBelowReserve {
        /// Item
        item: ItemId,
        /// Claimed price
        price: u64,
        /// Reserve
        reserve: u64,
    },

    /// Clearing price above what the winner bid
    PriceAboveValuation {
        /// Item
        item: ItemId,
        /// Winner
        bidder: BidderId,
        /// Claimed price
        price: u64,
        /// Winner's value for the item
        value: u64,
    },

    /// Claimed score differs from the value the assignment realizes
    ScoreMismatch {
        /// Claimed score
        claimed: u64,
        /// Recomputed score
        recomputed: u64,
    },

    /// Claimed score below what the reference solver reaches
    Suboptimal {
        /// Claimed score
        claimed: u64,
        /// Reference score
        optimal: u64,
    },
}

impl Discrepancy {
    /// True when the contract re-checks this condition on a misbehavior proof
    pub fn is_provable(&self) -> bool {
        !matches!(
            self,
            Discrepancy::PriceAboveValuation { .. } | Discrepancy::Suboptimal { .. }
        )
    }
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Discrepancy::AssignmentLength { claimed, bidders } => {
                write!(f, "assignment has {} entries for {} bidders", claimed, bidders)
            }
            Discrepancy::PriceListLength { claimed, items } => {
                write!(f, "price list has {} entries for {} items", claimed, items)
            }
            Discrepancy::UnknownItem { bidder, item } => {
                write!(f, "{} assigned to unknown {}", bidder, item)
            }
            Discrepancy::DuplicateItem {
                item,
                first,
                second,
            } => write!(f, "{} assigned to both {} and {}", item, first, second),
            Discrepancy::InfeasibleAssignment { bidder, item } => {
                write!(f, "{} is infeasible for {}", bidder, item)
            }
            Discrepancy::PriceBelowReserve {
                item,
                price,
                reserve,
            } => write!(f, "{} priced {} below reserve {}", item, price, reserve),
            Discrepancy::PriceAboveValuation {
                item,
                bidder,
                price,
                value,
            } => write!(
                f,
                "{} priced {} above the {} value of {}",
                item, price, bidder, value
            ),
            Discrepancy::ScoreMismatch {
                claimed,
                recomputed,
            } => write!(
                f,
                "claimed score {} but assignment realizes {}",
                claimed, recomputed
            ),
            Discrepancy::Suboptimal { claimed, optimal } => {
                write!(f, "claimed score {} below reachable {}", claimed, optimal)
            }
        }
    }
}

/// Result of re-checking one solution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    /// Solution as read from the ledger, decoded
    pub claimed: Solution,

    /// Value the claimed assignment realizes under the fresh valuation
    pub recomputed_score: u64,

    /// Reference solver score, when optimality was checked
    pub reference_score: Option<u64>,

    /// Every failed check, in detection order
    pub discrepancies: Vec<Discrepancy>,
}

impl VerificationReport {
    /// No check failed
    pub fn is_consistent(&self) -> bool {
        self.discrepancies.is_empty()
    }

    /// At least one failed check would be upheld by the contract
    pub fn is_provable(&self) -> bool {
        self.discrepancies.iter().any(Discrepancy::is_provable)
    }
}

/// Verify workflow state machine
///
/// `Idle -> Fetched -> Recomputed -> {Valid, Disputable}`, and
/// `Disputable -> DisputeSubmitted` only on explicit confirmation. `Aborted`
/// covers the no-op exits (nothing to verify, state changed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VerifyPhase {
    /// Nothing read yet
    Idle,
    /// Solution read from the ledger
    Fetched,
    /// Valuation re-derived and solution re-checked
    Recomputed,
    /// Solution consistent (or only advisory discrepancies)
    Valid,
    /// Provable discrepancies found, awaiting confirmation
    Disputable,
    /// Misbehavior proof confirmed
    DisputeSubmitted,
    /// Ended without a verdict
    Aborted,
}

impl VerifyPhase {
    /// Whether `next` is a legal successor
    pub fn can_advance_to(self, next: VerifyPhase) -> bool {
        use VerifyPhase::*;
        matches!(
            (self, next),
            (Idle, Fetched)
                | (Idle, Aborted)
                | (Fetched, Recomputed)
                | (Fetched, Aborted)
                | (Recomputed, Valid)
                | (Recomputed, Disputable)
                | (Recomputed, Aborted)
                | (Disputable, DisputeSubmitted)
        )
    }

    /// Terminal phases
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            VerifyPhase::Valid | VerifyPhase::DisputeSubmitted | VerifyPhase::Aborted
        )
    }
}

impl fmt::Display for VerifyPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Re-check `claimed` against a fresh valuation
///
/// The solution is judged on the bidders and items it covers: the first
/// `assignment.len()` bidders and `prices.len()` items. Records appended
/// after it was stored are out of its scope. `reference` is the reference
/// solver's answer for that same prefix and enables the optimality check.
/// `price_ceiling` enables the check that no winner pays more than its own
/// value.
pub fn check_solution(
    valuation: &Valuation,
    claimed: &Solution,
    reference: Option<&Solution>,
    price_ceiling: bool,
) -> VerificationReport {
    let relation = &valuation.relation;
    let mut discrepancies = Vec::new();

    if claimed.assignment.len() > relation.bidder_count() {
        discrepancies.push(Discrepancy::AssignmentLength {
            claimed: claimed.assignment.len(),
            bidders: relation.bidder_count(),
        });
    }
    if claimed.prices.len() > relation.item_count() {
        discrepancies.push(Discrepancy::PriceListLength {
            claimed: claimed.prices.len(),
            items: relation.item_count(),
        });
    }
    let bidders = claimed.assignment.len().min(relation.bidder_count());
    let items = claimed.prices.len().min(relation.item_count());

    let mut holders: BTreeMap<ItemId, BidderId> = BTreeMap::new();
    let mut recomputed_score = 0u64;

    for (index, entry) in claimed.assignment.iter().enumerate().take(bidders) {
        let bidder = BidderId(index);
        let item = match entry {
            Some(item) => *item,
            None => continue,
        };

        if item.0 >= items {
            discrepancies.push(Discrepancy::UnknownItem { bidder, item });
            continue;
        }

        if let Some(&first) = holders.get(&item) {
            discrepancies.push(Discrepancy::DuplicateItem {
                item,
                first,
                second: bidder,
            });
        } else {
            holders.insert(item, bidder);
        }

        if relation.is_feasible(bidder, item) {
            recomputed_score = recomputed_score.saturating_add(relation.value(bidder, item));
        } else {
            discrepancies.push(Discrepancy::InfeasibleAssignment { bidder, item });
        }
    }

    for (index, &price) in claimed.prices.iter().enumerate().take(items) {
        let item = ItemId(index);
        let reserve = valuation.min_prices.get(item).unwrap_or(0);
        if price < reserve {
            discrepancies.push(Discrepancy::PriceBelowReserve {
                item,
                price,
                reserve,
            });
        }

        if price_ceiling {
            if let Some(&bidder) = holders.get(&item) {
                let value = relation.value(bidder, item);
                if relation.is_feasible(bidder, item) && price > value {
                    discrepancies.push(Discrepancy::PriceAboveValuation {
                        item,
                        bidder,
                        price,
                        value,
                    });
                }
            }
        }
    }

    if recomputed_score != claimed.score {
        discrepancies.push(Discrepancy::ScoreMismatch {
            claimed: claimed.score,
            recomputed: recomputed_score,
        });
    }

    let reference_score = reference.map(|r| r.score);
    if let Some(optimal) = reference_score {
        if claimed.score < optimal {
            discrepancies.push(Discrepancy::Suboptimal {
                claimed: claimed.score,
                optimal,
            });
        }
    }

    VerificationReport {
        claimed: claimed.clone(),
        recomputed_score,
        reference_score,
        discrepancies,
    }
}
