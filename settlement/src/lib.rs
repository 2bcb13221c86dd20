//! Auction Settlement
//!
//! Off-ledger settlement and verification for the multi-attribute Dutch
//! auction recorded by [`auction_ledger`].
//!
//! # Architecture
//!
//! 1. **Propose**: validate lease terms and append a bid or an item
//! 2. **Solve**: read every bid and item, derive the valuation relation,
//!    run the [`Solver`], encode the assignment and submit it
//! 3. **Verify**: read the stored solution, re-derive the valuation from
//!    ledger state and re-check the claim; a provable discrepancy yields a
//!    dispute ticket that the caller must explicitly submit
//!
//! # Valuation
//!
//! A bid is feasible against an item when every demanded attribute is
//! covered by the offer. A feasible pair is worth the bidder's declared
//! price; the item's trailing attribute is its reserve.
//!
//! # Example
//!
//! ```no_run
//! use auction_settlement::{
//!     AssignmentSolver, Config, LeaseTerms, ProposalKind, SettlementOrchestrator, VerifyOutcome,
//! };
//!
//! #[tokio::main]
//! async fn main() -> auction_settlement::Result<()> {
//!     let config = Config::default();
//!     let ledger = auction_ledger::Ledger::open(config.ledger.clone()).await?;
//!     let orchestrator =
//!         SettlementOrchestrator::new(ledger, AssignmentSolver, config.verification)?;
//!
//!     orchestrator
//!         .propose(ProposalKind::Bid, LeaseTerms::new(2, 5, 10)?)
//!         .await?;
//!     orchestrator
//!         .propose(ProposalKind::Item, LeaseTerms::new(4, 10, 3)?)
//!         .await?;
//!
//!     orchestrator.solve().await?;
//!     if let VerifyOutcome::Disputable(ticket) = orchestrator.verify().await? {
//!         orchestrator.submit_dispute(ticket).await?;
//!     }
//!
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod types;
pub mod valuation;
pub mod codec;
pub mod solver;
pub mod verify;
pub mod ledger;
pub mod orchestrator;
pub mod error;
pub mod config;
pub mod metrics;

// Re-exports
pub use error::{Error, Result};
pub use types::*;
pub use config::{Config, VerificationConfig};
pub use ledger::{AuctionLedger, MockLedger};
pub use solver::{AssignmentSolver, Solver, SolverInput};
pub use verify::{Discrepancy, VerificationReport, VerifyPhase};
pub use orchestrator::{
    AuctionListing, DisputeTicket, SettlementOrchestrator, SolveOutcome, VerifyOutcome,
    VerifyResolution,
};
