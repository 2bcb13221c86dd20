//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `bids` - Append-only bid vectors (key: bid id, big-endian)
//! - `items` - Append-only item vectors (key: item id, big-endian)
//! - `solution` - The singleton current solution
//! - `disputes` - Accepted misbehavior proofs (key: dispute id)
//! - `penalties` - Penalty count per account (key: account id)
//! - `meta` - Counters (`bids_counter`, `items_counter`, ...)
//!
//! Every mutating method commits one `WriteBatch`, so a record and the
//! counters describing it are never observed out of step. Callers are
//! expected to serialize writes (see [`crate::actor`]).

use crate::{
    error::{Error, Result},
    types::{AccountId, AttributeVector, DisputeRecord, RecordId, StoredSolution},
    Config,
};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};
use std::sync::Arc;

/// Column family names
const CF_BIDS: &str = "bids";
const CF_ITEMS: &str = "items";
const CF_SOLUTION: &str = "solution";
const CF_DISPUTES: &str = "disputes";
const CF_PENALTIES: &str = "penalties";
const CF_META: &str = "meta";

/// Meta keys
const KEY_BIDS_COUNTER: &[u8] = b"bids_counter";
const KEY_ITEMS_COUNTER: &[u8] = b"items_counter";
const KEY_DISPUTES_COUNTER: &[u8] = b"disputes_counter";
const KEY_TX_SEQUENCE: &[u8] = b"tx_sequence";
const KEY_SOLUTION: &[u8] = b"current";

/// Record kinds sharing the append-only layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// Bid vectors
    Bid,
    /// Item vectors
    Item,
}

impl RecordKind {
    fn cf_name(self) -> &'static str {
        match self {
            RecordKind::Bid => CF_BIDS,
            RecordKind::Item => CF_ITEMS,
        }
    }

    fn counter_key(self) -> &'static [u8] {
        match self {
            RecordKind::Bid => KEY_BIDS_COUNTER,
            RecordKind::Item => KEY_ITEMS_COUNTER,
        }
    }

    fn label(self) -> &'static str {
        match self {
            RecordKind::Bid => "bid",
            RecordKind::Item => "item",
        }
    }
}

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage").field("path", &self.db.path()).finish()
    }
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        // Create directory if not exists
        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_BIDS, Self::cf_options_records()),
            ColumnFamilyDescriptor::new(CF_ITEMS, Self::cf_options_records()),
            ColumnFamilyDescriptor::new(CF_SOLUTION, Options::default()),
            ColumnFamilyDescriptor::new(CF_DISPUTES, Self::cf_options_records()),
            ColumnFamilyDescriptor::new(CF_PENALTIES, Options::default()),
            ColumnFamilyDescriptor::new(CF_META, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(path = ?path, "Opened auction ledger storage");

        Ok(Self { db: Arc::new(db) })
    }

    fn cf_options_records() -> Options {
        let mut opts = Options::default();
        // Append-only, read sequentially by id
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    fn read_counter(&self, key: &[u8]) -> Result<u64> {
        let cf = self.cf_handle(CF_META)?;
        match self.db.get_cf(cf, key)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    Error::Storage(format!(
                        "Corrupt counter {}",
                        String::from_utf8_lossy(key)
                    ))
                })?;
                Ok(u64::from_be_bytes(raw))
            }
            None => Ok(0),
        }
    }

    fn put_counter(&self, batch: &mut WriteBatch, key: &[u8], value: u64) -> Result<()> {
        let cf = self.cf_handle(CF_META)?;
        batch.put_cf(cf, key, value.to_be_bytes());
        Ok(())
    }

    // Record operations

    /// Number of records of a kind (ids run `1..=count`)
    pub fn record_count(&self, kind: RecordKind) -> Result<u64> {
        self.read_counter(kind.counter_key())
    }

    /// Append a record and bump its counter (atomic)
    pub fn append_record(
        &self,
        kind: RecordKind,
        vector: &AttributeVector,
        sequence: u64,
    ) -> Result<RecordId> {
        let id = self.record_count(kind)? + 1;
        let cf = self.cf_handle(kind.cf_name())?;

        let mut batch = WriteBatch::default();
        batch.put_cf(cf, id.to_be_bytes(), bincode::serialize(vector)?);
        self.put_counter(&mut batch, kind.counter_key(), id)?;
        self.put_counter(&mut batch, KEY_TX_SEQUENCE, sequence)?;
        self.db.write(batch)?;

        tracing::debug!(kind = kind.label(), id, %vector, "Record appended");

        Ok(id)
    }

    /// Get record by id
    pub fn get_record(&self, kind: RecordKind, id: RecordId) -> Result<AttributeVector> {
        let cf = self.cf_handle(kind.cf_name())?;
        let value = self
            .db
            .get_cf(cf, id.to_be_bytes())?
            .ok_or_else(|| Error::RecordNotFound(format!("{} {}", kind.label(), id)))?;

        Ok(bincode::deserialize(&value)?)
    }

    // Solution operations

    /// Replace the current solution (atomic)
    pub fn put_solution(&self, solution: &StoredSolution, sequence: u64) -> Result<()> {
        let cf = self.cf_handle(CF_SOLUTION)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(cf, KEY_SOLUTION, bincode::serialize(solution)?);
        self.put_counter(&mut batch, KEY_TX_SEQUENCE, sequence)?;
        self.db.write(batch)?;

        tracing::info!(
            score = solution.score,
            bidders = solution.assignment.len(),
            items = solution.prices.len(),
            submitter = %solution.submitter,
            "Solution stored"
        );

        Ok(())
    }

    /// Current solution, if any
    pub fn get_solution(&self) -> Result<Option<StoredSolution>> {
        let cf = self.cf_handle(CF_SOLUTION)?;
        match self.db.get_cf(cf, KEY_SOLUTION)? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    // Dispute operations

    /// Remove the current solution, record the dispute and penalize the
    /// submitter (atomic)
    pub fn resolve_dispute(&self, record: &DisputeRecord, sequence: u64) -> Result<()> {
        let cf_solution = self.cf_handle(CF_SOLUTION)?;
        let cf_disputes = self.cf_handle(CF_DISPUTES)?;
        let cf_penalties = self.cf_handle(CF_PENALTIES)?;

        let penalties = self.penalties(&record.penalized)? + 1;

        let mut batch = WriteBatch::default();
        batch.delete_cf(cf_solution, KEY_SOLUTION);
        batch.put_cf(
            cf_disputes,
            record.dispute_id.to_be_bytes(),
            bincode::serialize(record)?,
        );
        batch.put_cf(
            cf_penalties,
            record.penalized.as_str().as_bytes(),
            penalties.to_be_bytes(),
        );
        self.put_counter(&mut batch, KEY_DISPUTES_COUNTER, record.dispute_id)?;
        self.put_counter(&mut batch, KEY_TX_SEQUENCE, sequence)?;
        self.db.write(batch)?;

        tracing::warn!(
            dispute_id = record.dispute_id,
            penalized = %record.penalized,
            reason = %record.reason,
            "Solution removed by misbehavior proof"
        );

        Ok(())
    }

    /// Number of accepted disputes
    pub fn disputes_count(&self) -> Result<u64> {
        self.read_counter(KEY_DISPUTES_COUNTER)
    }

    /// All accepted disputes in id order
    pub fn get_disputes(&self) -> Result<Vec<DisputeRecord>> {
        let cf = self.cf_handle(CF_DISPUTES)?;
        let mut disputes = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            disputes.push(bincode::deserialize(&value)?);
        }
        Ok(disputes)
    }

    /// Penalty count of an account
    pub fn penalties(&self, account: &AccountId) -> Result<u64> {
        let cf = self.cf_handle(CF_PENALTIES)?;
        match self.db.get_cf(cf, account.as_str().as_bytes())? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    Error::Storage(format!("Corrupt penalty counter for {}", account))
                })?;
                Ok(u64::from_be_bytes(raw))
            }
            None => Ok(0),
        }
    }

    /// Sequence number of the last confirmed write
    pub fn tx_sequence(&self) -> Result<u64> {
        self.read_counter(KEY_TX_SEQUENCE)
    }
}
