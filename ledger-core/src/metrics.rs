//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring the ledger.
//!
//! # Metrics
//!
//! - `auction_ledger_bids_total` - Bids appended
//! - `auction_ledger_items_total` - Items appended
//! - `auction_ledger_solutions_total` - Solutions stored
//! - `auction_ledger_disputes_total` - Misbehavior proofs accepted
//! - `auction_ledger_rejected_total` - Write transactions rejected by the contract
//! - `auction_ledger_write_duration_seconds` - Histogram of write latencies

use crate::types::TransactionKind;
use prometheus::{Histogram, HistogramOpts, IntCounter, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Bids appended
    pub bids_total: IntCounter,

    /// Items appended
    pub items_total: IntCounter,

    /// Solutions stored
    pub solutions_total: IntCounter,

    /// Misbehavior proofs accepted
    pub disputes_total: IntCounter,

    /// Transactions rejected
    pub rejected_total: IntCounter,

    /// Write duration histogram
    pub write_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("bids_total", &self.bids_total.get())
            .field("items_total", &self.items_total.get())
            .field("solutions_total", &self.solutions_total.get())
            .field("disputes_total", &self.disputes_total.get())
            .finish()
    }
}

impl Metrics {
    /// Create new metrics collector on a private registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let bids_total = IntCounter::new("auction_ledger_bids_total", "Bids appended")?;
        registry.register(Box::new(bids_total.clone()))?;

        let items_total = IntCounter::new("auction_ledger_items_total", "Items appended")?;
        registry.register(Box::new(items_total.clone()))?;

        let solutions_total =
            IntCounter::new("auction_ledger_solutions_total", "Solutions stored")?;
        registry.register(Box::new(solutions_total.clone()))?;

        let disputes_total = IntCounter::new(
            "auction_ledger_disputes_total",
            "Misbehavior proofs accepted",
        )?;
        registry.register(Box::new(disputes_total.clone()))?;

        let rejected_total = IntCounter::new(
            "auction_ledger_rejected_total",
            "Write transactions rejected by the contract",
        )?;
        registry.register(Box::new(rejected_total.clone()))?;

        let write_duration = Histogram::with_opts(
            HistogramOpts::new(
                "auction_ledger_write_duration_seconds",
                "Histogram of write latencies",
            )
            .buckets(vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0]),
        )?;
        registry.register(Box::new(write_duration.clone()))?;

        Ok(Self {
            bids_total,
            items_total,
            solutions_total,
            disputes_total,
            rejected_total,
            write_duration,
            registry,
        })
    }

    /// Record a confirmed write
    pub fn record_confirmed(&self, kind: TransactionKind, duration_seconds: f64) {
        match kind {
            TransactionKind::SubmitBid => self.bids_total.inc(),
            TransactionKind::AddItem => self.items_total.inc(),
            TransactionKind::SubmitSolution => self.solutions_total.inc(),
            TransactionKind::WrongScore => self.disputes_total.inc(),
        }
        self.write_duration.observe(duration_seconds);
    }

    /// Record a rejected write
    pub fn record_rejected(&self) {
        self.rejected_total.inc();
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.bids_total.get(), 0);
        assert_eq!(metrics.disputes_total.get(), 0);

        // Private registries do not collide
        assert!(Metrics::new().is_ok());
    }

    #[test]
    fn test_record_confirmed() {
        let metrics = Metrics::new().unwrap();
        metrics.record_confirmed(TransactionKind::SubmitBid, 0.001);
        metrics.record_confirmed(TransactionKind::SubmitBid, 0.002);
        metrics.record_confirmed(TransactionKind::WrongScore, 0.001);

        assert_eq!(metrics.bids_total.get(), 2);
        assert_eq!(metrics.disputes_total.get(), 1);
        assert_eq!(metrics.items_total.get(), 0);
    }

    #[test]
    fn test_record_rejected() {
        let metrics = Metrics::new().unwrap();
        metrics.record_rejected();
        assert_eq!(metrics.rejected_total.get(), 1);
    }
}
