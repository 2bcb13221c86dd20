//! Valuation derivation
//!
//! Turns raw bid and item vectors into the bidder x item value matrix and
//! the per-item reserve prices fed to the solver.
//!
//! # Feasibility
//!
//! A bid is feasible against an item iff every demanded attribute is
//! covered by the offered one (`bid[j] <= item[j]` for every slot but the
//! trailing price). A feasible pair is valued at the bidder's own declared
//! price, independent of the item's reserve; an infeasible pair is worth 0.
//!
//! ```text
//! bid  (2, 5, 10)   item (4, 10, 3)   → 2 <= 4, 5 <= 10 → value 10
//! bid  (5, 5, 10)   item (2, 10, 3)   → 5 >  2          → value 0
//! ```
//!
//! The derivation is a pure function of its inputs and is recomputed from
//! ledger state on every solve and every verification. Nothing is cached.

use crate::{
    types::{Bid, BidderId, Item, ItemId, MinPrices, ValuationRelation},
    Error, Result,
};

/// Derived solver inputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Valuation {
    /// Bidder x item values
    pub relation: ValuationRelation,

    /// Reserve price per item
    pub min_prices: MinPrices,
}

/// Derive the valuation relation and reserve prices
///
/// Empty bid or item sets are legal and yield an empty relation. Vectors
/// that do not share one arity are rejected rather than coerced.
pub fn derive(bids: &[Bid], items: &[Item]) -> Result<Valuation> {
    check_schema(bids, items)?;

    let mut relation = ValuationRelation::new(bids.len(), items.len());
    for (b, bid) in bids.iter().enumerate() {
        for (i, item) in items.iter().enumerate() {
            relation.set(BidderId(b), ItemId(i), pair_value(bid, item));
        }
    }

    let min_prices = MinPrices::from_pairs(
        items
            .iter()
            .enumerate()
            .map(|(i, item)| (ItemId(i), item.price())),
    );

    tracing::debug!(
        bidders = bids.len(),
        items = items.len(),
        feasible = relation.feasible_pairs().count(),
        "Derived valuations"
    );

    Ok(Valuation {
        relation,
        min_prices,
    })
}

/// Value of a single bid/item pair
pub fn pair_value(bid: &Bid, item: &Item) -> u64 {
    if bid.is_covered_by(item) {
        bid.price()
    } else {
        0
    }
}

fn check_schema(bids: &[Bid], items: &[Item]) -> Result<()> {
    let reference = match bids.first().or_else(|| items.first()) {
        Some(v) => v.arity(),
        None => return Ok(()),
    };

    let odd_bid = bids.iter().position(|b| b.arity() != reference);
    let odd_item = items.iter().position(|i| i.arity() != reference);

    match (odd_bid, odd_item) {
        (None, None) => Ok(()),
        (Some(b), _) => Err(Error::SchemaMismatch {
            bid: b,
            bid_arity: bids[b].arity(),
            item: 0,
            item_arity: items.first().map(|i| i.arity()).unwrap_or(reference),
        }),
        (None, Some(i)) => Err(Error::SchemaMismatch {
            bid: 0,
            bid_arity: reference,
            item: i,
            item_arity: items[i].arity(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AttributeVector;

    fn lease(size: u64, duration: u64, price: u64) -> AttributeVector {
        AttributeVector::lease(size, duration, price)
    }

    #[test]
    fn test_single_feasible_pair() {
        let valuation = derive(&[lease(2, 5, 10)], &[lease(4, 10, 3)]).unwrap();
        assert_eq!(valuation.relation.value(BidderId(0), ItemId(0)), 10);
        assert_eq!(valuation.min_prices.get(ItemId(0)), Some(3));
        assert_eq!(valuation.relation.len(), 1);
    }

    #[test]
    fn test_single_infeasible_pair() {
        let valuation = derive(&[lease(5, 5, 10)], &[lease(2, 10, 3)]).unwrap();
        assert_eq!(valuation.relation.value(BidderId(0), ItemId(0)), 0);
        // Still defined over the full cross product
        assert_eq!(valuation.relation.len(), 1);
    }

    #[test]
    fn test_value_is_bid_price_not_reserve() {
        // Reserve above the bid price does not change the valuation
        let valuation = derive(&[lease(1, 1, 5)], &[lease(1, 1, 50)]).unwrap();
        assert_eq!(valuation.relation.value(BidderId(0), ItemId(0)), 5);
    }

    #[test]
    fn test_cross_product() {
        let bids = [lease(2, 5, 10), lease(8, 1, 7)];
        let items = [lease(4, 10, 3), lease(8, 2, 1), lease(1, 1, 0)];
        let valuation = derive(&bids, &items).unwrap();

        let r = &valuation.relation;
        assert_eq!(r.len(), 6);
        assert_eq!(r.value(BidderId(0), ItemId(0)), 10);
        assert_eq!(r.value(BidderId(0), ItemId(1)), 0);
        assert_eq!(r.value(BidderId(0), ItemId(2)), 0);
        assert_eq!(r.value(BidderId(1), ItemId(0)), 0);
        assert_eq!(r.value(BidderId(1), ItemId(1)), 7);
        assert_eq!(r.value(BidderId(1), ItemId(2)), 0);
        assert_eq!(valuation.min_prices.len(), 3);
        assert_eq!(valuation.min_prices.get(ItemId(2)), Some(0));
    }

    #[test]
    fn test_empty_inputs() {
        let no_bids = derive(&[], &[lease(4, 10, 3)]).unwrap();
        assert!(no_bids.relation.is_empty());
        assert_eq!(no_bids.min_prices.len(), 1);

        let no_items = derive(&[lease(2, 5, 10)], &[]).unwrap();
        assert!(no_items.relation.is_empty());
        assert!(no_items.min_prices.is_empty());

        assert!(derive(&[], &[]).unwrap().relation.is_empty());
    }

    #[test]
    fn test_mismatched_arity_rejected() {
        let short = AttributeVector::new(vec![2, 10]).unwrap();
        let err = derive(&[lease(2, 5, 10)], &[short]).unwrap_err();
        assert!(matches!(
            err,
            Error::SchemaMismatch {
                item: 0,
                item_arity: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_derivation_is_reproducible() {
        let bids = [lease(2, 5, 10), lease(3, 3, 4)];
        let items = [lease(4, 10, 3), lease(3, 3, 2)];
        assert_eq!(derive(&bids, &items).unwrap(), derive(&bids, &items).unwrap());
    }
}
