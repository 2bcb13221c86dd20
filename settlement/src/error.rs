//! Error types for the settlement client

use thiserror::Error;

/// Result type for settlement operations
pub type Result<T> = std::result::Result<T, Error>;

/// Settlement errors
///
/// Empty auction state and disputable solutions are workflow outcomes,
/// not errors; see [`crate::orchestrator`].
#[derive(Error, Debug)]
pub enum Error {
    /// Ledger error
    #[error("Ledger error: {0}")]
    Ledger(#[from] auction_ledger::Error),

    /// Rejected proposal input (negative or non-integer attribute)
    #[error("Invalid {field} {value:?}: {reason}")]
    InvalidInput {
        /// Offending field
        field: &'static str,
        /// Raw value as supplied
        value: String,
        /// Why it was rejected
        reason: String,
    },

    /// Bid and item vectors do not share one attribute schema
    #[error("Schema mismatch: bid {bid} has arity {bid_arity}, item {item} has arity {item_arity}")]
    SchemaMismatch {
        /// Bidder index
        bid: usize,
        /// Bid arity
        bid_arity: usize,
        /// Item index
        item: usize,
        /// Item arity
        item_arity: usize,
    },

    /// Item index cannot be represented next to the unassigned sentinel
    #[error("Encoding range: item {item} is not below sentinel {sentinel}")]
    EncodingRange {
        /// Offending item index
        item: usize,
        /// Sentinel value
        sentinel: u8,
    },

    /// Solver failure
    #[error("Solver error: {0}")]
    Solver(String),

    /// Write transaction was not confirmed
    #[error("{operation} transaction failed: {source}")]
    TransactionFailed {
        /// Workflow step that issued the write
        operation: &'static str,
        /// Ledger error reported for the write
        #[source]
        source: auction_ledger::Error,
    },

    /// Dispute ticket no longer matches ledger state
    #[error("Stale dispute ticket: {0}")]
    StaleTicket(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Wrap a failed write with the operation that issued it
    pub fn transaction(operation: &'static str, source: auction_ledger::Error) -> Self {
        Error::TransactionFailed { operation, source }
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}
