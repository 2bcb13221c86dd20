//! Assignment wire codec
//!
//! The ledger stores one byte per bidder, with 255 meaning "unassigned".
//! This is the only place the sentinel exists; everything above this module
//! works with `Option<ItemId>`.

use crate::{
    types::{Assignment, EncodedSolution, ItemId, Solution},
    Error, Result,
};

/// Wire value for an unassigned bidder
pub const SENTINEL: u8 = auction_ledger::UNASSIGNED_SENTINEL;

/// Number of distinct item indices the wire format can carry (`0..=254`)
pub const MAX_ITEMS: usize = SENTINEL as usize;

/// Encode an assignment, rejecting item indices that collide with the sentinel
pub fn encode_assignment(assignment: &[Option<ItemId>]) -> Result<Vec<u8>> {
    assignment
        .iter()
        .map(|entry| match entry {
            None => Ok(SENTINEL),
            Some(item) if item.0 < MAX_ITEMS => Ok(item.0 as u8),
            Some(item) => Err(Error::EncodingRange {
                item: item.0,
                sentinel: SENTINEL,
            }),
        })
        .collect()
}

/// Decode a wire assignment
pub fn decode_assignment(encoded: &[u8]) -> Assignment {
    encoded
        .iter()
        .map(|&raw| {
            if raw == SENTINEL {
                None
            } else {
                Some(ItemId(raw as usize))
            }
        })
        .collect()
}

/// Encode a full solution for submission
pub fn encode_solution(solution: &Solution) -> Result<EncodedSolution> {
    Ok(EncodedSolution {
        assignment: encode_assignment(&solution.assignment)?,
        prices: solution.prices.clone(),
        score: solution.score,
    })
}

/// Decode a solution read from the ledger
pub fn decode_solution(encoded: &EncodedSolution) -> Solution {
    Solution {
        assignment: decode_assignment(&encoded.assignment),
        prices: encoded.prices.clone(),
        score: encoded.score,
    }
}
