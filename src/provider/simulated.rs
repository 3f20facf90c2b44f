//! Simulated payment provider
//!
//! Deterministic in-process stand-in for the external provider: intent and
//! refund references derive from the transactable id, and the webhook
//! signature is the hex SHA-256 of `secret || '.' || payload`. The replay
//! binary wires this in so scenario files can carry precomputed signatures;
//! tests flip the failure toggles to exercise the provider-error paths.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

use crate::types::{EngineError, PaymentIntent, TransactableId};

use super::PaymentProvider;

/// In-process payment provider with deterministic references
#[derive(Debug)]
pub struct SimulatedProvider {
    secret: String,
    fail_intents: AtomicBool,
    fail_refunds: AtomicBool,
}

impl SimulatedProvider {
    /// Create a provider verifying webhooks against `secret`
    pub fn new(secret: impl Into<String>) -> Self {
        SimulatedProvider {
            secret: secret.into(),
            fail_intents: AtomicBool::new(false),
            fail_refunds: AtomicBool::new(false),
        }
    }

    /// Make subsequent `create_intent` calls fail
    pub fn set_fail_intents(&self, fail: bool) {
        self.fail_intents.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent `refund` calls fail
    pub fn set_fail_refunds(&self, fail: bool) {
        self.fail_refunds.store(fail, Ordering::SeqCst);
    }

    /// Sign a payload the way this provider expects webhooks signed
    ///
    /// Used by tests and scenario tooling to produce valid signatures.
    pub fn sign(&self, payload: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(b".");
        hasher.update(payload.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// The intent reference this provider assigns to a transactable
    pub fn intent_ref(transactable: TransactableId) -> String {
        format!("pi_{:06}", transactable)
    }
}

#[async_trait]
impl PaymentProvider for SimulatedProvider {
    async fn create_intent(
        &self,
        transactable: TransactableId,
        _amount: Decimal,
    ) -> Result<PaymentIntent, EngineError> {
        if self.fail_intents.load(Ordering::SeqCst) {
            return Err(EngineError::provider("intent creation refused"));
        }
        let external_ref = Self::intent_ref(transactable);
        Ok(PaymentIntent {
            client_secret: format!("{}_secret", external_ref),
            external_ref,
        })
    }

    async fn refund(&self, external_ref: &str, _amount: Decimal) -> Result<String, EngineError> {
        if self.fail_refunds.load(Ordering::SeqCst) {
            return Err(EngineError::provider("refund refused"));
        }
        Ok(format!(
            "re_{}",
            external_ref.trim_start_matches("pi_")
        ))
    }

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> bool {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(b".");
        hasher.update(payload);
        let expected = hex::encode(hasher.finalize());
        // Hex comparison; constant-time is the real provider SDK's concern
        expected == signature.to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_intent_refs_are_deterministic() {
        let provider = SimulatedProvider::new("whsec_test");
        let a = provider.create_intent(42, Decimal::from(1000)).await.unwrap();
        let b = provider.create_intent(42, Decimal::from(9999)).await.unwrap();
        assert_eq!(a.external_ref, "pi_000042");
        assert_eq!(a.external_ref, b.external_ref);
        assert_eq!(a.client_secret, "pi_000042_secret");
    }

    #[tokio::test]
    async fn test_refund_ref_derives_from_intent_ref() {
        let provider = SimulatedProvider::new("whsec_test");
        let refund = provider.refund("pi_000042", Decimal::from(500)).await.unwrap();
        assert_eq!(refund, "re_000042");
    }

    #[tokio::test]
    async fn test_failure_toggles() {
        let provider = SimulatedProvider::new("whsec_test");
        provider.set_fail_intents(true);
        let result = provider.create_intent(1, Decimal::from(100)).await;
        assert!(matches!(result, Err(EngineError::Provider { .. })));

        provider.set_fail_intents(false);
        assert!(provider.create_intent(1, Decimal::from(100)).await.is_ok());
    }

    #[test]
    fn test_signature_round_trip() {
        let provider = SimulatedProvider::new("whsec_test");
        let payload = r#"{"type":"payment_intent.succeeded"}"#;
        let signature = provider.sign(payload);

        assert!(provider.verify_webhook_signature(payload.as_bytes(), &signature));
        assert!(!provider.verify_webhook_signature(b"tampered", &signature));
        assert!(!provider.verify_webhook_signature(payload.as_bytes(), "deadbeef"));
    }

    #[test]
    fn test_signature_depends_on_secret() {
        let a = SimulatedProvider::new("whsec_a");
        let b = SimulatedProvider::new("whsec_b");
        let payload = r#"{"type":"payment_intent.succeeded"}"#;
        assert!(!b.verify_webhook_signature(payload.as_bytes(), &a.sign(payload)));
    }
}
