//! Listing types: the plots, tools, and produce listings transactables
//! are created against
//!
//! The engine only needs a listing's owner, pricing fields, and inventory;
//! everything else about a listing (description, photos, location) belongs
//! to the surrounding application.

use rust_decimal::Decimal;

use super::transactable::{ListingId, PartyId, TransactableKind};

/// Inventory held by a listing
///
/// Produce listings carry countable stock; plots and tools are a single
/// slot that is either free or taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inventory {
    /// Countable stock (produce listings)
    Stock { available: u32 },
    /// Single reservable slot (plots and tools)
    Slot { available: bool },
}

/// Derived availability status of a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingStatus {
    Available,
    /// Stock exhausted (produce listings)
    Sold,
    /// Slot taken (plots and tools)
    Unavailable,
}

impl ListingStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ListingStatus::Available => "available",
            ListingStatus::Sold => "sold",
            ListingStatus::Unavailable => "unavailable",
        }
    }
}

/// A plot, tool, or produce listing as the engine sees it
#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    pub id: ListingId,
    /// Landowner, tool owner, or seller
    pub owner: PartyId,
    /// The transactable kind this listing serves
    pub kind: TransactableKind,
    pub inventory: Inventory,
    /// Price per unit in minor units (produce listings)
    pub unit_price: Option<Decimal>,
    /// Daily rate in minor units (plots and tools)
    pub daily_rate: Option<Decimal>,
    /// Discounted weekly rate in minor units (plots and tools)
    pub weekly_rate: Option<Decimal>,
}

impl Listing {
    /// Availability derived from inventory
    pub fn status(&self) -> ListingStatus {
        match self.inventory {
            Inventory::Stock { available: 0 } => ListingStatus::Sold,
            Inventory::Stock { .. } => ListingStatus::Available,
            Inventory::Slot { available: true } => ListingStatus::Available,
            Inventory::Slot { available: false } => ListingStatus::Unavailable,
        }
    }
}
