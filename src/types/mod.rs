//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `transactable`: Bookings, rentals, orders and their status lifecycle
//! - `listing`: Listings and their inventory
//! - `payment`: Payment records, fee splits, intents
//! - `notification`: Notification records
//! - `command`: Engine input commands
//! - `error`: Error types for the lifecycle engine

pub mod command;
pub mod error;
pub mod listing;
pub mod notification;
pub mod payment;
pub mod transactable;

pub use command::Command;
pub use error::EngineError;
pub use listing::{Inventory, Listing, ListingStatus};
pub use notification::{Notification, NotificationKind};
pub use payment::{ExternalRef, FeeSplit, PaymentIntent, PaymentRecord, PaymentStatus};
pub use transactable::{
    ActorRole, ListingId, PartyId, Status, Transactable, TransactableId, TransactableKind,
};
