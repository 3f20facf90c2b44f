//! Pricing rules for rentals, bookings, and orders
//!
//! All amounts and rates are in currency minor units. Rental pricing counts
//! whole days (ceiling) and crosses over to the weekly rate once the
//! duration reaches a week; order pricing is unit price times quantity with
//! the quantity bounded by the stock seen at evaluation time. The stock
//! bound is re-checked by the atomic decrement at commit time, closing the
//! race window between evaluation and commit.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::types::{EngineError, ListingId};

const SECONDS_PER_DAY: i64 = 86_400;

/// Whole-day duration of a service period, rounded up
///
/// Rejects empty and inverted ranges.
pub fn duration_days(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<i64, EngineError> {
    let seconds = (end - start).num_seconds();
    if seconds <= 0 {
        return Err(EngineError::InvalidDateRange {
            start: start.to_rfc3339(),
            end: end.to_rfc3339(),
        });
    }
    Ok((seconds + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY)
}

/// Price a booking or rental period
///
/// With a weekly rate and a duration of at least 7 days the price is
/// `floor(days/7) * weekly + (days mod 7) * daily`; otherwise it is
/// `days * daily`.
pub fn rental_price(
    daily_rate: Decimal,
    weekly_rate: Option<Decimal>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Decimal, EngineError> {
    let days = duration_days(start, end)?;
    match weekly_rate {
        Some(weekly) if days >= 7 => {
            let weeks = Decimal::from(days / 7);
            let remainder = Decimal::from(days % 7);
            Ok(weeks * weekly + remainder * daily_rate)
        }
        _ => Ok(Decimal::from(days) * daily_rate),
    }
}

/// Price an order of `quantity` units
///
/// Quantity must be strictly positive and within the stock observed at
/// evaluation time.
pub fn order_price(
    listing: ListingId,
    unit_price: Decimal,
    quantity: u32,
    available: u32,
) -> Result<Decimal, EngineError> {
    if quantity == 0 {
        return Err(EngineError::InvalidQuantity { quantity });
    }
    if quantity > available {
        return Err(EngineError::insufficient_stock(listing, quantity, available));
    }
    Ok(unit_price * Decimal::from(quantity))
}
