//! Engine input commands
//!
//! Each command corresponds to one inbound request in the deployed system:
//! create an entity, request a status transition, update a note, initiate
//! payment, or deliver a provider webhook. The replay harness feeds these
//! from a CSV scenario file; the `listing` command seeds the listings the
//! scenario runs against.

use chrono::{DateTime, Utc};

use super::listing::Listing;
use super::transactable::{ListingId, PartyId, Status, TransactableId, TransactableKind};

/// A single engine request
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Seed a listing (replay harness only)
    SeedListing(Listing),

    /// Create a transactable in PENDING against a listing
    Create {
        id: TransactableId,
        kind: TransactableKind,
        /// The initiating renter/buyer
        actor: PartyId,
        listing: ListingId,
        /// Units to purchase (orders)
        quantity: Option<u32>,
        /// Service period (bookings/rentals)
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    },

    /// Request a status transition
    Transition {
        id: TransactableId,
        actor: PartyId,
        requested: Status,
    },

    /// Update the free-text note without a status change
    Note {
        id: TransactableId,
        actor: PartyId,
        text: String,
    },

    /// Initiate payment for a transactable
    InitiatePayment { id: TransactableId, actor: PartyId },

    /// Deliver a payment-provider webhook
    Webhook { payload: String, signature: String },
}
