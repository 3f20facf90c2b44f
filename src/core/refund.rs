//! Refund policy
//!
//! The refund percentage depends on how far in the future the service
//! starts, counted in whole days (ceiling):
//!
//! - 7 days or more: 100%
//! - 3 to 6 days: 50%
//! - under 3 days (including an already-started service): 0%
//!
//! Both functions are pure; the engine injects its clock so eligibility is
//! a function of the stored start date and the "now" it is evaluated at.
//! Eligibility shrinks as the start date approaches, so two evaluations at
//! different times may legitimately differ.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};

const SECONDS_PER_DAY: i64 = 86_400;

/// Refund percentage for a cancellation at `now` of a service starting at
/// `start`
pub fn refund_percentage(now: DateTime<Utc>, start: DateTime<Utc>) -> u32 {
    let seconds = (start - now).num_seconds();
    let days = if seconds <= 0 {
        0
    } else {
        (seconds + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY
    };
    if days >= 7 {
        100
    } else if days >= 3 {
        50
    } else {
        0
    }
}

/// Refund amount in whole minor units, rounded half-up
pub fn refund_amount(amount: Decimal, percentage: u32) -> Decimal {
    (amount * Decimal::from(percentage) / Decimal::from(100))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rstest::rstest;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    #[rstest]
    #[case::ten_days_out(10, 100)]
    #[case::exactly_seven_days(7, 100)]
    #[case::five_days_out(5, 50)]
    #[case::exactly_three_days(3, 50)]
    #[case::one_day_out(1, 0)]
    #[case::starts_now(0, 0)]
    fn test_refund_tiers(#[case] days_until_start: i64, #[case] expected: u32) {
        let start = now() + Duration::days(days_until_start);
        assert_eq!(refund_percentage(now(), start), expected);
    }

    #[test]
    fn test_already_started_service_refunds_nothing() {
        let start = now() - Duration::days(2);
        assert_eq!(refund_percentage(now(), start), 0);
    }

    #[test]
    fn test_partial_days_round_up() {
        // 6 days and 1 hour out counts as 7 whole days
        let start = now() + Duration::days(6) + Duration::hours(1);
        assert_eq!(refund_percentage(now(), start), 100);
        // 2 days and 1 hour out counts as 3 whole days
        let start = now() + Duration::days(2) + Duration::hours(1);
        assert_eq!(refund_percentage(now(), start), 50);
    }

    #[test]
    fn test_percentage_monotonically_non_increasing() {
        let mut last = 100;
        for days in (0..=14).rev() {
            let pct = refund_percentage(now(), now() + Duration::days(days));
            assert!(pct <= last, "refund grew as start approached");
            last = pct;
        }
    }

    #[test]
    fn test_same_inputs_same_result() {
        let start = now() + Duration::days(5);
        assert_eq!(
            refund_percentage(now(), start),
            refund_percentage(now(), start)
        );
    }

    #[rstest]
    #[case::full(10000, 100, 10000)]
    #[case::half(10000, 50, 5000)]
    #[case::none(10000, 0, 0)]
    #[case::odd_half_rounds_up(10001, 50, 5001)]
    fn test_refund_amount(#[case] amount: i64, #[case] pct: u32, #[case] expected: i64) {
        assert_eq!(
            refund_amount(Decimal::from(amount), pct),
            Decimal::from(expected)
        );
    }
}
