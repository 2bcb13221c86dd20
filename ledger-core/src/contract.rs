//! Contract rules enforced on every write transaction
//!
//! These run inside the single writer, against the state the transaction
//! will actually be applied to.

use crate::{
    storage::{RecordKind, Storage},
    types::{AttributeVector, StoredSolution, UNASSIGNED_SENTINEL},
    Error, Result,
};
use std::collections::HashSet;

/// Reject vectors that do not follow the auction's attribute schema
pub fn validate_vector(vector: &AttributeVector, arity: usize) -> Result<()> {
    if vector.arity() != arity {
        return Err(Error::InvalidRecord(format!(
            "Expected {} attributes, got {} in {}",
            arity,
            vector.arity(),
            vector
        )));
    }
    Ok(())
}

/// Reject solutions whose shape does not match the current auction state
pub fn validate_solution(storage: &Storage, assignment: &[u8], prices: &[u64]) -> Result<()> {
    let bids = storage.record_count(RecordKind::Bid)?;
    let items = storage.record_count(RecordKind::Item)?;
    check_solution_shape(bids, items, assignment, prices)
}

/// Shape rules for a solution against `bids` bids and `items` items
pub fn check_solution_shape(bids: u64, items: u64, assignment: &[u8], prices: &[u64]) -> Result<()> {
    if assignment.len() as u64 != bids {
        return Err(Error::InvalidSolution(format!(
            "Assignment has {} entries for {} bids",
            assignment.len(),
            bids
        )));
    }

    if prices.len() as u64 != items {
        return Err(Error::InvalidSolution(format!(
            "Price list has {} entries for {} items",
            prices.len(),
            items
        )));
    }

    for (bidder, &entry) in assignment.iter().enumerate() {
        if entry != UNASSIGNED_SENTINEL && u64::from(entry) >= items {
            return Err(Error::InvalidSolution(format!(
                "Bidder {} assigned to unknown item {}",
                bidder, entry
            )));
        }
    }

    Ok(())
}

/// Outcome of the contract's own re-check of a stored solution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Audit {
    /// Score realized by the stored assignment under stored bids and items
    pub recomputed_score: u64,

    /// First failed check, `None` if the solution is consistent
    pub violation: Option<String>,
}

/// Recompute a stored solution from stored bids and items
pub fn audit_solution(storage: &Storage, solution: &StoredSolution) -> Result<Audit> {
    let bids = load_all(storage, RecordKind::Bid)?;
    let items = load_all(storage, RecordKind::Item)?;
    Ok(audit_records(
        &bids,
        &items,
        &solution.assignment,
        &solution.prices,
        solution.score,
    ))
}

fn load_all(storage: &Storage, kind: RecordKind) -> Result<Vec<AttributeVector>> {
    let count = storage.record_count(kind)?;
    (1..=count).map(|id| storage.get_record(kind, id)).collect()
}

/// Recompute a solution against explicit bid and item vectors
///
/// Bidder `b` is `bids[b]`, item `i` is `items[i]`. The first failed check
/// wins; the recomputed score only counts feasible pairs. Every listed
/// price, sold or not, must clear its item's reserve.
///
/// Records are append-only, so a solution is judged against the first
/// `assignment.len()` bids and `prices.len()` items it was computed for.
/// Records appended after it was stored do not make it wrong.
pub fn audit_records(
    bids: &[AttributeVector],
    items: &[AttributeVector],
    assignment: &[u8],
    prices: &[u64],
    score: u64,
) -> Audit {
    let mut recomputed_score = 0u64;
    let mut violation = None;
    let mut taken = HashSet::new();

    if assignment.len() > bids.len() || prices.len() > items.len() {
        violation = Some(format!(
            "Solution shape {}x{} exceeds {} bids and {} items",
            assignment.len(),
            prices.len(),
            bids.len(),
            items.len()
        ));
    }
    let bids = &bids[..assignment.len().min(bids.len())];
    let items = &items[..prices.len().min(items.len())];

    for (bidder, &entry) in assignment.iter().enumerate() {
        if entry == UNASSIGNED_SENTINEL {
            continue;
        }

        let (bid, item) = match (bids.get(bidder), items.get(entry as usize)) {
            (Some(bid), Some(item)) => (bid, item),
            _ => {
                violation.get_or_insert_with(|| {
                    format!("Bidder {} assigned to unknown item {}", bidder, entry)
                });
                continue;
            }
        };

        if !taken.insert(entry) {
            violation.get_or_insert_with(|| format!("Item {} assigned twice", entry));
        }

        // A zero-price bid is worth nothing, so it cannot win an item
        if bid.is_covered_by(item) && bid.price() > 0 {
            recomputed_score = recomputed_score.saturating_add(bid.price());
        } else {
            violation.get_or_insert_with(|| {
                format!("Bidder {} is infeasible for item {}", bidder, entry)
            });
        }
    }

    for (index, (price, item)) in prices.iter().zip(items).enumerate() {
        if *price < item.price() {
            violation.get_or_insert_with(|| {
                format!(
                    "Item {} priced {} below reserve {}",
                    index,
                    price,
                    item.price()
                )
            });
        }
    }

    if recomputed_score != score {
        violation.get_or_insert_with(|| {
            format!(
                "Claimed score {} but assignment realizes {}",
                score, recomputed_score
            )
        });
    }

    Audit {
        recomputed_score,
        violation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AccountId;
    use crate::Config;
    use chrono::Utc;
    use tempfile::TempDir;

    fn storage_with(bids: &[AttributeVector], items: &[AttributeVector]) -> (Storage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        let storage = Storage::open(&config).unwrap();

        let mut seq = 0;
        for bid in bids {
            seq += 1;
            storage.append_record(RecordKind::Bid, bid, seq).unwrap();
        }
        for item in items {
            seq += 1;
            storage.append_record(RecordKind::Item, item, seq).unwrap();
        }
        (storage, temp_dir)
    }

    fn solution(assignment: Vec<u8>, prices: Vec<u64>, score: u64) -> StoredSolution {
        StoredSolution {
            assignment,
            prices,
            score,
            submitter: AccountId::new("solver"),
            submitted_at: Utc::now(),
        }
    }

    #[test]
    fn test_validate_vector_arity() {
        assert!(validate_vector(&AttributeVector::lease(1, 2, 3), 3).is_ok());
        let short = AttributeVector::new(vec![1, 2]).unwrap();
        assert!(matches!(
            validate_vector(&short, 3),
            Err(Error::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_validate_solution_shape() {
        let (storage, _temp) = storage_with(
            &[AttributeVector::lease(2, 5, 10)],
            &[AttributeVector::lease(4, 10, 3)],
        );

        assert!(validate_solution(&storage, &[0], &[3]).is_ok());
        assert!(validate_solution(&storage, &[255], &[3]).is_ok());
        assert!(validate_solution(&storage, &[0, 0], &[3]).is_err());
        assert!(validate_solution(&storage, &[0], &[]).is_err());
        assert!(validate_solution(&storage, &[1], &[3]).is_err());
    }

    #[test]
    fn test_audit_consistent_solution() {
        let (storage, _temp) = storage_with(
            &[AttributeVector::lease(2, 5, 10)],
            &[AttributeVector::lease(4, 10, 3)],
        );

        let audit = audit_solution(&storage, &solution(vec![0], vec![3], 10)).unwrap();
        assert_eq!(audit.recomputed_score, 10);
        assert!(audit.violation.is_none());
    }

    #[test]
    fn test_audit_inflated_score() {
        let (storage, _temp) = storage_with(
            &[AttributeVector::lease(2, 5, 10)],
            &[AttributeVector::lease(4, 10, 3)],
        );

        let audit = audit_solution(&storage, &solution(vec![0], vec![3], 110)).unwrap();
        assert_eq!(audit.recomputed_score, 10);
        assert!(audit.violation.unwrap().contains("Claimed score 110"));
    }

    #[test]
    fn test_audit_infeasible_pair() {
        let (storage, _temp) = storage_with(
            &[AttributeVector::lease(5, 5, 10)],
            &[AttributeVector::lease(2, 10, 3)],
        );

        let audit = audit_solution(&storage, &solution(vec![0], vec![3], 10)).unwrap();
        assert_eq!(audit.recomputed_score, 0);
        assert!(audit.violation.unwrap().contains("infeasible"));
    }

    #[test]
    fn test_audit_records_without_storage() {
        let bids = [AttributeVector::lease(2, 5, 10), AttributeVector::lease(1, 1, 4)];
        let items = [AttributeVector::lease(4, 10, 3)];

        let audit = audit_records(&bids, &items, &[0, 0], &[3], 14);
        assert!(audit.violation.unwrap().contains("assigned twice"));

        let audit = audit_records(&bids, &items, &[0, 255], &[3], 10);
        assert_eq!(audit.recomputed_score, 10);
        assert!(audit.violation.is_none());

        // Unsold items are held to their reserve too
        let audit = audit_records(&bids, &items, &[255, 255], &[1], 0);
        assert!(audit.violation.unwrap().contains("below reserve"));
    }

    #[test]
    fn test_audit_ignores_later_records() {
        let bids = [AttributeVector::lease(2, 5, 10), AttributeVector::lease(3, 3, 50)];
        let items = [AttributeVector::lease(4, 10, 3), AttributeVector::lease(9, 9, 1)];

        // Stored for one bid and one item, then a richer bid and item arrived
        let audit = audit_records(&bids, &items, &[0], &[3], 10);
        assert_eq!(audit.recomputed_score, 10);
        assert!(audit.violation.is_none());

        // The solution still cannot reach an item it did not price
        let audit = audit_records(&bids, &items, &[1], &[3], 10);
        assert!(audit.violation.unwrap().contains("unknown item"));

        let audit = audit_records(&bids[..1], &items, &[0, 255], &[3], 10);
        assert!(audit.violation.unwrap().contains("exceeds"));
    }

    #[test]
    fn test_check_solution_shape() {
        assert!(check_solution_shape(2, 1, &[0, 255], &[3]).is_ok());
        assert!(check_solution_shape(2, 1, &[0], &[3]).is_err());
        assert!(check_solution_shape(0, 0, &[], &[]).is_ok());
    }

    #[test]
    fn test_audit_price_below_reserve() {
        let (storage, _temp) = storage_with(
            &[AttributeVector::lease(2, 5, 10)],
            &[AttributeVector::lease(4, 10, 3)],
        );

        let audit = audit_solution(&storage, &solution(vec![0], vec![2], 10)).unwrap();
        assert!(audit.violation.unwrap().contains("below reserve"));
    }

    #[test]
    fn test_zero_price_bid_cannot_win() {
        let bids = [AttributeVector::lease(1, 1, 0)];
        let items = [AttributeVector::lease(4, 10, 0)];

        let audit = audit_records(&bids, &items, &[0], &[0], 0);
        assert_eq!(audit.recomputed_score, 0);
        assert!(audit.violation.unwrap().contains("infeasible"));
    }
}
