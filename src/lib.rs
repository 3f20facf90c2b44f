//! GrowShare Transaction Lifecycle Engine
//! # Overview
//!
//! This library implements the transaction lifecycle of a community growing
//! marketplace: plot bookings, tool rentals, and produce orders moving
//! through a payment-linked status lifecycle.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (Transactable, Listing, PaymentRecord, etc.)
//! - [`core`] - Business logic components:
//!   - [`core::transitions`] - Status transition tables and validation
//!   - [`core::pricing`] - Duration and unit pricing rules
//!   - [`core::refund`] - Refund policy tiers
//!   - [`core::payment`] - Payment orchestration against the external provider
//!   - [`core::dispatcher`] - Best-effort side effects (notifications, inventory, rewards)
//!   - [`core::engine`] - Request-level coordination
//! - [`provider`] - The payment-provider capability and a simulated implementation
//! - [`clock`] - Injected time source
//! - [`io`] - CSV scenario parsing and state output
//! - [`replay`] - The file-to-file scenario pipeline behind the CLI
//! - [`cli`] - CLI argument parsing
//!
//! # Lifecycle
//!
//! A transactable is created PENDING by the buyer/renter against an
//! available listing. Owners approve bookings and rentals (taking the
//! listing's slot); orders are confirmed by payment instead. Payment runs
//! through an intent created at the provider and an asynchronous,
//! idempotent webhook confirmation that advances the status and splits the
//! gross amount into platform fee and owner earnings. Cancellation refunds
//! paid entities by time-until-start tiers and restores any inventory the
//! entity held. COMPLETED and CANCELLED are terminal.

// Module declarations
pub mod cli;
pub mod clock;
pub mod core;
pub mod io;
pub mod provider;
pub mod replay;
pub mod types;

pub use crate::core::{EngineConfig, LifecycleEngine};
pub use clock::{Clock, FixedClock, SystemClock};
pub use io::write_states_csv;
pub use provider::{PaymentProvider, SimulatedProvider};
pub use types::{
    Command, EngineError, Listing, ListingId, PartyId, PaymentRecord, PaymentStatus, Status,
    Transactable, TransactableId, TransactableKind,
};
