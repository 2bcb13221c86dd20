//! Configuration for the settlement client

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Settlement client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Print the Prometheus text exposition after each command
    pub print_metrics: bool,

    /// Ledger the client settles against
    pub ledger: auction_ledger::Config,

    /// Verification checks
    pub verification: VerificationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "auction-settlement".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            print_metrics: false,
            ledger: auction_ledger::Config::default(),
            verification: VerificationConfig::default(),
        }
    }
}

/// Optional verification checks
///
/// Both are advisory: the contract does not re-check them, so a solution
/// failing only these is reported but never disputed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// Re-solve with the reference solver and flag lower claimed scores
    pub check_optimality: bool,

    /// Flag items priced above their winner's value
    pub check_price_ceiling: bool,
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.ledger.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config {
            ledger: auction_ledger::Config::from_env()?,
            ..Config::default()
        };

        if let Ok(dir) = std::env::var("SETTLEMENT_LEDGER_DIR") {
            config.ledger.data_dir = PathBuf::from(dir);
        }

        if let Ok(flag) = std::env::var("SETTLEMENT_PRINT_METRICS") {
            config.print_metrics = parse_flag("SETTLEMENT_PRINT_METRICS", &flag)?;
        }

        if let Ok(flag) = std::env::var("SETTLEMENT_CHECK_OPTIMALITY") {
            config.verification.check_optimality =
                parse_flag("SETTLEMENT_CHECK_OPTIMALITY", &flag)?;
        }

        if let Ok(flag) = std::env::var("SETTLEMENT_CHECK_PRICE_CEILING") {
            config.verification.check_price_ceiling =
                parse_flag("SETTLEMENT_CHECK_PRICE_CEILING", &flag)?;
        }

        Ok(config)
    }
}

fn parse_flag(name: &str, raw: &str) -> crate::Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(crate::Error::Config(format!("Invalid {} {:?}", name, raw))),
    }
}
