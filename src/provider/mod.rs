//! Payment provider capability
//!
//! The orchestrator talks to the external payment provider through this
//! narrow interface, so the whole payment path can be exercised against a
//! fake implementation without network access. A production deployment
//! substitutes an implementation backed by the provider's HTTP API and its
//! real signature scheme.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::types::{EngineError, PaymentIntent, TransactableId};

pub mod simulated;

pub use simulated::SimulatedProvider;

/// External payment provider operations
///
/// All monetary amounts are in currency minor units. Implementations own
/// their webhook signature scheme; the engine only asks whether a payload
/// verifies.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a payment intent for the given amount
    async fn create_intent(
        &self,
        transactable: TransactableId,
        amount: Decimal,
    ) -> Result<PaymentIntent, EngineError>;

    /// Refund `amount` against a previously confirmed intent
    ///
    /// Returns the provider's refund reference.
    async fn refund(&self, external_ref: &str, amount: Decimal) -> Result<String, EngineError>;

    /// Verify a webhook payload's signature
    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> bool;
}
