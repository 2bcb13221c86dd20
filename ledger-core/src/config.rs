//! Configuration for the auction ledger

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Account that signs write transactions
    pub account: String,

    /// Number of slots every bid and item vector must carry
    /// (size, duration, price by default)
    pub attribute_arity: usize,

    /// Capacity of the writer actor's mailbox
    pub mailbox_capacity: usize,

    /// RocksDB configuration
    pub rocksdb: RocksDBConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/ledger"),
            service_name: "auction-ledger".to_string(),
            account: "local".to_string(),
            attribute_arity: 3,
            mailbox_capacity: 1000,
            rocksdb: RocksDBConfig::default(),
        }
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocksDBConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// Enable statistics
    pub enable_statistics: bool,
}

impl Default for RocksDBConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 16,
            max_write_buffer_number: 2,
            max_background_jobs: 2,
            enable_statistics: false,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("AUCTION_LEDGER_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(account) = std::env::var("AUCTION_ACCOUNT") {
            config.account = account;
        }

        if let Ok(arity) = std::env::var("AUCTION_ATTRIBUTE_ARITY") {
            config.attribute_arity = arity.parse().map_err(|e| {
                crate::Error::Config(format!("Invalid AUCTION_ATTRIBUTE_ARITY {}: {}", arity, e))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check invariants that serde cannot express
    pub fn validate(&self) -> crate::Result<()> {
        if self.attribute_arity == 0 {
            return Err(crate::Error::Config(
                "attribute_arity must include the price slot".to_string(),
            ));
        }
        if self.mailbox_capacity == 0 {
            return Err(crate::Error::Config(
                "mailbox_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
