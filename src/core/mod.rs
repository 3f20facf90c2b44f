//! Core business logic module
//!
//! This module contains the lifecycle engine and its parts:
//! - `transitions` - Status transition tables and validation
//! - `pricing` - Rental and order pricing rules
//! - `refund` - Refund policy tiers
//! - `stores` - Concurrent entity stores
//! - `payment` - Payment orchestration against the external provider
//! - `dispatcher` - Best-effort side effects after committed transitions
//! - `engine` - The engine coordinating all of the above

pub mod dispatcher;
pub mod engine;
pub mod payment;
pub mod pricing;
pub mod refund;
pub mod stores;
pub mod transitions;

pub use dispatcher::{NoopRewards, RewardHook, SideEffectDispatcher};
pub use engine::{EngineConfig, LifecycleEngine};
pub use payment::{PaymentOrchestrator, ReconciliationEntry, RefundOutcome};
pub use stores::{ConfirmOutcome, ListingStore, NotificationSink, PaymentStore, TransactableStore};
