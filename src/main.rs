//! GrowShare Lifecycle Engine CLI
//!
//! Replays a CSV scenario of marketplace lifecycle commands through the
//! transaction engine and writes the final entity states to stdout.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- scenario.csv > states.csv
//! cargo run -- --now 2026-03-01T09:00:00Z scenario.csv > states.csv
//! cargo run -- --webhook-secret whsec_demo --fee-percent 10 scenario.csv
//! ```
//!
//! The engine runs against the simulated payment provider, so scenarios
//! carry their own webhook payloads and signatures (signed with the
//! configured secret). `--now` pins the clock, which makes refund-tier
//! outcomes reproducible.
//!
//! Rejected commands are logged to stderr with the HTTP status they would
//! answer with and do not abort the replay; I/O failures do.
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (missing arguments, file not found, output not writable, etc.)

use std::process;
use std::sync::Arc;

use growshare_engine::cli;
use growshare_engine::core::LifecycleEngine;
use growshare_engine::provider::SimulatedProvider;
use growshare_engine::replay;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Diagnostics go to stderr; stdout carries the state CSV
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = cli::parse_args();

    let provider = Arc::new(SimulatedProvider::new(args.webhook_secret.clone()));
    let engine = LifecycleEngine::new(provider, args.clock(), args.to_engine_config());

    let mut output = std::io::stdout();
    if let Err(e) = replay::replay(&engine, &args.input_file, &mut output).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
