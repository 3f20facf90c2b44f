//! End-to-end integration tests
//!
//! These tests validate the complete replay pipeline using predefined CSV
//! scenario fixtures. Each test:
//! 1. Reads input.csv from a fixture directory
//! 2. Replays all commands through an engine wired to the simulated
//!    provider (secret `whsec_simulated`) with the clock pinned to
//!    2026-03-01T09:00:00Z
//! 3. Generates the final-state CSV
//! 4. Compares actual output with expected.csv
//!
//! Fixtures live in tests/fixtures/ and cover the happy paths, refunds,
//! sell-out behavior, and webhook replay/rejection handling.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use growshare_engine::core::EngineConfig;
use growshare_engine::{replay, FixedClock, LifecycleEngine, SimulatedProvider};
use rstest::rstest;

/// Replay a fixture's input.csv and compare the output with expected.csv
fn run_test_fixture(fixture_name: &str) {
    let fixture_dir = format!("tests/fixtures/{}", fixture_name);
    let input_path = format!("{}/input.csv", fixture_dir);
    let expected_path = format!("{}/expected.csv", fixture_dir);

    assert!(
        Path::new(&input_path).exists(),
        "Input file not found: {}",
        input_path
    );
    assert!(
        Path::new(&expected_path).exists(),
        "Expected file not found: {}",
        expected_path
    );

    let engine = LifecycleEngine::new(
        Arc::new(SimulatedProvider::new("whsec_simulated")),
        Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
        )),
        EngineConfig::default(),
    );

    let mut output = Vec::new();
    tokio::runtime::Runtime::new()
        .expect("Failed to create runtime")
        .block_on(replay::replay(&engine, Path::new(&input_path), &mut output))
        .unwrap_or_else(|e| panic!("Failed to replay fixture {}: {}", fixture_name, e));

    let actual_output = String::from_utf8(output).expect("Output is not UTF-8");
    let expected_output = fs::read_to_string(&expected_path)
        .unwrap_or_else(|e| panic!("Failed to read expected file {}: {}", expected_path, e));

    assert_eq!(
        actual_output, expected_output,
        "\n\nOutput mismatch for fixture: {}\n\nActual output:\n{}\n\nExpected output:\n{}\n",
        fixture_name, actual_output, expected_output
    );
}

/// End-to-end test for all fixtures
#[rstest]
#[case("booking_happy_path")]
#[case("rental_cancel_refund")]
#[case("order_sellout")]
#[case("webhook_replay")]
fn test_fixtures(#[case] fixture: &str) {
    run_test_fixture(fixture);
}
