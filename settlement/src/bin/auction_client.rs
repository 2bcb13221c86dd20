//! Auction settlement client
//!
//! ```text
//! auction-client bid --size 2 --duration 5 --price 10
//! auction-client item --size 4 --duration 10 --price 3
//! auction-client list
//! auction-client solve
//! auction-client verify
//! ```

use anyhow::{Context, Result};
use auction_ledger::Ledger;
use auction_settlement::{
    metrics, AssignmentSolver, Config, LeaseTerms, ProposalKind, SettlementOrchestrator,
    SolveOutcome, VerificationReport, VerifyOutcome,
};
use clap::{Args, Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "auction-client", version, about = "Storage-lease auction settlement client")]
struct Cli {
    /// TOML configuration file (defaults to environment variables)
    #[arg(long, env = "AUCTION_CLIENT_CONFIG")]
    config: Option<PathBuf>,

    /// Override the ledger data directory
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Override the account signing write transactions
    #[arg(long)]
    account: Option<String>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit a bid for storage
    Bid(LeaseArgs),
    /// Offer storage as an item
    Item(LeaseArgs),
    /// Show bids, items and the current solution
    List,
    /// Compute and submit a solution
    Solve,
    /// Re-check the current solution and offer to dispute it
    Verify,
}

/// Missing values are asked for interactively
#[derive(Args)]
struct LeaseArgs {
    /// Storage size (GB)
    #[arg(long, allow_hyphen_values = true)]
    size: Option<String>,

    /// Lease duration (days)
    #[arg(long, allow_hyphen_values = true)]
    duration: Option<String>,

    /// Bid price, or reserve price for an item
    #[arg(long, allow_hyphen_values = true)]
    price: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => Config::from_env()?,
    };
    if let Some(dir) = cli.data_dir {
        config.ledger.data_dir = dir;
    }
    if let Some(account) = cli.account {
        config.ledger.account = account;
    }

    tracing::debug!(?config, "Configuration loaded");

    let ledger = Ledger::open(config.ledger.clone())
        .await
        .context("opening ledger")?;
    let orchestrator: Client =
        SettlementOrchestrator::new(ledger, AssignmentSolver::new(), config.verification.clone())?;

    let result = run(&orchestrator, cli.cmd).await;

    if config.print_metrics {
        print!("{}", metrics::encode_text(&orchestrator.metrics().registry)?);
        print!(
            "{}",
            metrics::encode_text(&orchestrator.ledger().metrics().registry)?
        );
    }

    orchestrator.into_ledger().shutdown().await?;
    result
}

type Client = SettlementOrchestrator<Ledger, AssignmentSolver>;

async fn run(orchestrator: &Client, cmd: Command) -> Result<()> {
    match cmd {
        Command::Bid(args) => propose(orchestrator, ProposalKind::Bid, args).await,
        Command::Item(args) => propose(orchestrator, ProposalKind::Item, args).await,
        Command::List => {
            println!("{}", orchestrator.list().await?);
            Ok(())
        }
        Command::Solve => {
            match orchestrator.solve().await? {
                SolveOutcome::NothingToSolve { bids, items } => {
                    println!("Nothing to solve ({} bids, {} items)", bids, items);
                }
                SolveOutcome::NoBeneficialTrade => {
                    println!("No beneficial trade; existing solution left in place");
                }
                SolveOutcome::Submitted {
                    solution,
                    confirmation,
                } => {
                    println!(
                        "Submitted solution with score {} ({} of {} bids assigned), tx {}",
                        solution.score,
                        solution.assigned_count(),
                        solution.assignment.len(),
                        confirmation.tx_hash_hex()
                    );
                }
            }
            Ok(())
        }
        Command::Verify => verify(orchestrator).await,
    }
}

async fn propose(orchestrator: &Client, kind: ProposalKind, args: LeaseArgs) -> Result<()> {
    let size = value_or_prompt(args.size, "Size (GB)")?;
    let duration = value_or_prompt(args.duration, "Duration (days)")?;
    let price = value_or_prompt(
        args.price,
        match kind {
            ProposalKind::Bid => "Price",
            ProposalKind::Item => "Reserve price",
        },
    )?;

    let terms = LeaseTerms::parse(&size, &duration, &price)?;
    let confirmation = orchestrator.propose(kind, terms).await?;

    println!(
        "Submitted {} #{} ({}, {}, {}), tx {}",
        kind,
        confirmation.record_id.unwrap_or_default(),
        terms.size,
        terms.duration,
        terms.price,
        confirmation.tx_hash_hex()
    );
    Ok(())
}

async fn verify(orchestrator: &Client) -> Result<()> {
    let resolution = orchestrator.verify_with_confirmation(confirm_dispute).await?;

    match &resolution.outcome {
        VerifyOutcome::NothingToVerify => println!("No solution to verify"),
        VerifyOutcome::Valid(report) => {
            println!("Solution verified (score {})", report.claimed.score)
        }
        VerifyOutcome::Unprovable(report) => {
            println!("Solution stands, with advisory findings:");
            print_discrepancies(report);
        }
        VerifyOutcome::StateChanged { reason } => {
            println!("Ledger changed during verification ({}); run verify again", reason)
        }
        VerifyOutcome::Disputable(_) => match &resolution.dispute {
            Some(confirmation) => println!(
                "Misbehavior proof accepted, tx {}",
                confirmation.tx_hash_hex()
            ),
            None => println!("Dispute not submitted"),
        },
    }
    Ok(())
}

fn print_discrepancies(report: &VerificationReport) {
    for discrepancy in &report.discrepancies {
        println!("  - {}", discrepancy);
    }
}

fn confirm_dispute(report: &VerificationReport) -> bool {
    println!(
        "Solution claims score {} but re-derivation gives {}:",
        report.claimed.score, report.recomputed_score
    );
    print_discrepancies(report);

    match prompt("Submit misbehavior proof? [y/n]") {
        Ok(answer) => matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes"),
        Err(e) => {
            tracing::warn!(error = %e, "Could not read confirmation, not disputing");
            false
        }
    }
}

fn value_or_prompt(value: Option<String>, label: &str) -> Result<String> {
    match value {
        Some(value) => Ok(value),
        None => prompt(label),
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;

    let mut line = String::new();
    let read = io::stdin().lock().read_line(&mut line)?;
    if read == 0 {
        anyhow::bail!("no input for {}", label);
    }
    Ok(line.trim().to_string())
}
