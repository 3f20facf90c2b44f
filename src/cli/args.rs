use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::Parser;
use rust_decimal::Decimal;

use crate::clock::{Clock, FixedClock, SystemClock};
use crate::core::EngineConfig;

fn parse_rfc3339(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("invalid RFC 3339 timestamp '{}': {}", s, e))
}

/// Replay marketplace lifecycle scenarios through the transaction engine
#[derive(Parser, Debug)]
#[command(name = "growshare-engine")]
#[command(about = "Replay marketplace lifecycle scenarios through the transaction engine", long_about = None)]
pub struct CliArgs {
    /// Input CSV file path containing scenario commands
    #[arg(value_name = "INPUT", help = "Path to the input scenario CSV file")]
    pub input_file: PathBuf,

    /// Pin the engine clock to a fixed instant for deterministic replays
    #[arg(
        long = "now",
        value_name = "RFC3339",
        value_parser = parse_rfc3339,
        help = "Fix 'now' to this instant (default: system clock)"
    )]
    pub now: Option<DateTime<Utc>>,

    /// Secret the simulated provider verifies webhook signatures against
    #[arg(
        long = "webhook-secret",
        value_name = "SECRET",
        default_value = "whsec_simulated",
        help = "Webhook signing secret for the simulated provider"
    )]
    pub webhook_secret: String,

    /// Platform fee percentage applied to gross payment amounts
    #[arg(
        long = "fee-percent",
        value_name = "PERCENT",
        default_value_t = 10,
        help = "Platform fee percentage (default: 10)"
    )]
    pub fee_percent: u32,

    /// Bound on external payment-provider calls, in milliseconds
    #[arg(
        long = "provider-timeout-ms",
        value_name = "MILLIS",
        default_value_t = 5000,
        help = "Payment provider call timeout in milliseconds (default: 5000)"
    )]
    pub provider_timeout_ms: u64,
}

impl CliArgs {
    /// Engine configuration from CLI arguments
    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig {
            fee_percent: Decimal::from(self.fee_percent),
            provider_timeout: Duration::from_millis(self.provider_timeout_ms),
        }
    }

    /// The clock this replay runs on: fixed if `--now` was given
    pub fn clock(&self) -> Arc<dyn Clock> {
        match self.now {
            Some(at) => Arc::new(FixedClock::new(at)),
            None => Arc::new(SystemClock),
        }
    }
}
