//! Auction Ledger
//!
//! Local, durable rendition of the multi-attribute Dutch auction contract:
//! bids, items, the current solution and accepted misbehavior proofs.
//!
//! # Architecture
//!
//! - **Append-only records**: bids and items get sequential 1-based ids and
//!   are never modified
//! - **Singleton solution**: each accepted solution fully replaces the
//!   previous one
//! - **Single Writer**: one actor task applies every write transaction, so
//!   concurrent submitters are totally ordered (last confirmed write wins)
//! - **Misbehavior proofs**: the contract recomputes a disputed solution
//!   from stored records and removes it only if the recomputation disagrees
//!
//! # Invariants
//!
//! - Every bid and item shares the configured attribute arity
//! - A stored solution has one entry per bid and one price per item
//! - Record ids are dense: `1..=counter`

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod types;
pub mod storage;
pub mod contract;
pub mod ledger;
pub mod error;
pub mod actor;
pub mod config;
pub mod metrics;

// Re-exports
pub use error::{Error, Result};
pub use types::{
    AccountId, AttributeVector, Confirmation, DisputeRecord, RecordId, StoredSolution,
    Transaction, TransactionKind, transaction_hash, UNASSIGNED_SENTINEL,
};
pub use ledger::Ledger;
pub use config::Config;
pub use storage::Storage;
