//! Transactable entities and their status lifecycle
//!
//! A transactable is any marketplace entity with a payment-linked status
//! lifecycle: a plot booking, a tool rental, or a produce order. All three
//! kinds share one `Status` enum (the shape of the lifecycle is identical);
//! the display labels and the transition tables vary per kind.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Transactable identifier
pub type TransactableId = u64;

/// Listing identifier (produce listing, plot, or tool)
pub type ListingId = u64;

/// Party (user) identifier
pub type PartyId = u64;

/// The kind of transactable entity
///
/// Bookings and rentals carry a service period and price by duration;
/// orders carry a quantity and price by unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactableKind {
    /// A plot booking (landowner vs. renter)
    Booking,
    /// A tool rental (tool owner vs. renter)
    Rental,
    /// A produce order (seller vs. buyer)
    Order,
}

impl TransactableKind {
    /// Lowercase label used in CSV input/output
    pub fn label(&self) -> &'static str {
        match self {
            TransactableKind::Booking => "booking",
            TransactableKind::Rental => "rental",
            TransactableKind::Order => "order",
        }
    }

    /// Deep-link path segment for notifications
    pub fn link_segment(&self) -> &'static str {
        match self {
            TransactableKind::Booking => "bookings",
            TransactableKind::Rental => "rentals",
            TransactableKind::Order => "orders",
        }
    }

    /// Parse a kind label (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "booking" => Some(TransactableKind::Booking),
            "rental" => Some(TransactableKind::Rental),
            "order" => Some(TransactableKind::Order),
            _ => None,
        }
    }
}

/// Lifecycle status shared by all transactable kinds
///
/// Linear lifecycle with a terminal cancel branch from every non-terminal
/// state. `Approved` renders as "confirmed" everywhere; `Active` renders as
/// "ready" for orders and "active" otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Created by the counterparty, awaiting approval (or payment, for orders)
    Pending,
    /// Approved by the owner (bookings/rentals) or confirmed by payment (orders)
    Approved,
    /// Service underway (bookings/rentals) or ready for pickup (orders)
    Active,
    /// Terminal: completed successfully
    Completed,
    /// Terminal: cancelled by either party
    Cancelled,
}

impl Status {
    /// Whether this status admits no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Completed | Status::Cancelled)
    }

    /// Kind-specific display label
    pub fn label(&self, kind: TransactableKind) -> &'static str {
        match (self, kind) {
            (Status::Pending, _) => "pending",
            (Status::Approved, _) => "confirmed",
            (Status::Active, TransactableKind::Order) => "ready",
            (Status::Active, _) => "active",
            (Status::Completed, _) => "completed",
            (Status::Cancelled, _) => "cancelled",
        }
    }

    /// Parse a status label (case-insensitive, accepts both label variants)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Status::Pending),
            "confirmed" | "approved" => Some(Status::Approved),
            "active" | "ready" => Some(Status::Active),
            "completed" => Some(Status::Completed),
            "cancelled" | "canceled" => Some(Status::Cancelled),
            _ => None,
        }
    }
}

/// The role a requesting party plays on a given transactable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorRole {
    /// Landowner, tool owner, or seller
    Owner,
    /// Renter or buyer (the initiating party)
    Counterparty,
}

/// A booking, rental, or order
///
/// Owned jointly by the two counterparties; mutated only through validated
/// transitions. Amounts are in currency minor units.
#[derive(Debug, Clone, PartialEq)]
pub struct Transactable {
    pub id: TransactableId,
    pub kind: TransactableKind,
    /// The listing/plot/tool this entity was created against
    pub listing: ListingId,
    /// Landowner, tool owner, or seller
    pub owner: PartyId,
    /// Renter or buyer
    pub counterparty: PartyId,
    pub status: Status,
    /// Gross price in minor units
    pub amount: Decimal,
    /// Units purchased (orders only)
    pub quantity: Option<u32>,
    /// Service period start (bookings/rentals only)
    pub start: Option<DateTime<Utc>>,
    /// Service period end (bookings/rentals only)
    pub end: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Whether this entity currently holds an inventory decrement against
    /// its listing. Cleared when the decrement is restored, so a restore
    /// can never double-credit.
    pub inventory_held: bool,
    /// Free-text note either party may update without a status change
    pub note: Option<String>,
}

impl Transactable {
    /// Role of the given party on this transactable, if any
    ///
    /// Returns `None` for third parties; callers reject those as forbidden.
    pub fn role_of(&self, party: PartyId) -> Option<ActorRole> {
        if party == self.owner {
            Some(ActorRole::Owner)
        } else if party == self.counterparty {
            Some(ActorRole::Counterparty)
        } else {
            None
        }
    }

    /// The party on the other side of `actor`
    ///
    /// Callers must have established `actor` is one of the counterparties.
    pub fn other_party(&self, actor: PartyId) -> PartyId {
        if actor == self.owner {
            self.counterparty
        } else {
            self.owner
        }
    }

    /// Apply a status change, stamping the matching timestamp
    pub fn stamp(&mut self, status: Status, now: DateTime<Utc>) {
        self.status = status;
        match status {
            Status::Approved => self.approved_at = Some(now),
            Status::Completed => self.completed_at = Some(now),
            Status::Cancelled => self.cancelled_at = Some(now),
            Status::Pending | Status::Active => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Status::Pending, false)]
    #[case(Status::Approved, false)]
    #[case(Status::Active, false)]
    #[case(Status::Completed, true)]
    #[case(Status::Cancelled, true)]
    fn test_terminal_statuses(#[case] status: Status, #[case] terminal: bool) {
        assert_eq!(status.is_terminal(), terminal);
    }

    #[rstest]
    #[case("pending", Some(Status::Pending))]
    #[case("confirmed", Some(Status::Approved))]
    #[case("approved", Some(Status::Approved))]
    #[case("ACTIVE", Some(Status::Active))]
    #[case("ready", Some(Status::Active))]
    #[case("cancelled", Some(Status::Cancelled))]
    #[case("canceled", Some(Status::Cancelled))]
    #[case("sold", None)]
    fn test_status_parse(#[case] input: &str, #[case] expected: Option<Status>) {
        assert_eq!(Status::parse(input), expected);
    }

    #[test]
    fn test_active_label_varies_by_kind() {
        assert_eq!(Status::Active.label(TransactableKind::Order), "ready");
        assert_eq!(Status::Active.label(TransactableKind::Booking), "active");
        assert_eq!(Status::Active.label(TransactableKind::Rental), "active");
    }
}
