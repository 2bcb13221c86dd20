//! Error types for the auction ledger

use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Bid or item rejected by the contract
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Bid, item or solution entry not found
    #[error("Record not found: {0}")]
    RecordNotFound(String),

    /// No solution is currently stored
    #[error("No solution submitted")]
    NoSolution,

    /// Solution rejected by the contract
    #[error("Invalid solution: {0}")]
    InvalidSolution(String),

    /// Misbehavior proof rejected because the stored solution is consistent
    #[error("Misbehavior proof rejected: {0}")]
    ProofRejected(String),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
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
