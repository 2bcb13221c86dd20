//! Settlement metrics
//!
//! - `auction_settlement_proposals_total{kind}` - Bids and items proposed
//! - `auction_settlement_solves_total{outcome}` - Solve runs by outcome
//! - `auction_settlement_verifications_total{outcome}` - Verify runs by outcome
//! - `auction_settlement_disputes_total` - Misbehavior proofs confirmed

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Proposals by kind
    pub proposals_total: IntCounterVec,

    /// Solve runs by outcome
    pub solves_total: IntCounterVec,

    /// Verify runs by outcome
    pub verifications_total: IntCounterVec,

    /// Disputes confirmed by the ledger
    pub disputes_total: IntCounter,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("disputes_total", &self.disputes_total.get())
            .finish()
    }
}

impl Metrics {
    /// Create new metrics collector on a private registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let proposals_total = IntCounterVec::new(
            Opts::new("auction_settlement_proposals_total", "Bids and items proposed"),
            &["kind"],
        )?;
        registry.register(Box::new(proposals_total.clone()))?;

        let solves_total = IntCounterVec::new(
            Opts::new("auction_settlement_solves_total", "Solve runs by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(solves_total.clone()))?;

        let verifications_total = IntCounterVec::new(
            Opts::new(
                "auction_settlement_verifications_total",
                "Verify runs by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(verifications_total.clone()))?;

        let disputes_total = IntCounter::new(
            "auction_settlement_disputes_total",
            "Misbehavior proofs confirmed",
        )?;
        registry.register(Box::new(disputes_total.clone()))?;

        Ok(Self {
            proposals_total,
            solves_total,
            verifications_total,
            disputes_total,
            registry,
        })
    }

    /// Count a confirmed proposal
    pub fn record_proposal(&self, kind: &str) {
        self.proposals_total.with_label_values(&[kind]).inc();
    }

    /// Count a finished solve run
    pub fn record_solve(&self, outcome: &str) {
        self.solves_total.with_label_values(&[outcome]).inc();
    }

    /// Count a finished verify run
    pub fn record_verification(&self, outcome: &str) {
        self.verifications_total.with_label_values(&[outcome]).inc();
    }
}

/// Render a registry in the Prometheus text format
pub fn encode_text(registry: &Registry) -> prometheus::Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
