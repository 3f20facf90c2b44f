//! Payment orchestration
//!
//! Coordinates external payment-provider calls with local record keeping:
//! intent creation, asynchronous confirmation, and refunds. The ordering
//! discipline throughout is claim-locally, call-externally, then commit:
//! the local slot is claimed before the provider is called (so concurrent
//! attempts cannot double-submit money movements), and nothing local is
//! marked successful unless the external call succeeded. The one remaining
//! gap — the external call succeeded but the local commit failed — is
//! appended to the reconciliation log instead of being lost.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rust_decimal::Decimal;
use tracing::{error, info, warn};

use crate::clock::Clock;
use crate::provider::PaymentProvider;
use crate::types::{
    EngineError, FeeSplit, PaymentIntent, PaymentStatus, Transactable, TransactableId,
};

use super::refund;
use super::stores::{ConfirmOutcome, PaymentStore};
use super::transitions;

/// Outcome of a completed refund
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefundOutcome {
    /// Amount returned, in minor units
    pub amount: Decimal,
    /// Tier percentage applied
    pub percentage: u32,
}

/// A money movement whose external and local halves diverged
///
/// Only produced when the provider accepted an operation but the local
/// commit afterwards failed; flagged for manual or retry reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciliationEntry {
    pub transactable: TransactableId,
    pub external_ref: String,
    pub refund_ref: Option<String>,
    pub amount: Decimal,
    pub reason: String,
}

/// Coordinates provider calls and payment records
pub struct PaymentOrchestrator {
    provider: Arc<dyn PaymentProvider>,
    payments: Arc<PaymentStore>,
    clock: Arc<dyn Clock>,
    fee_percent: Decimal,
    provider_timeout: Duration,
    reconciliation: Mutex<Vec<ReconciliationEntry>>,
}

impl PaymentOrchestrator {
    pub fn new(
        provider: Arc<dyn PaymentProvider>,
        payments: Arc<PaymentStore>,
        clock: Arc<dyn Clock>,
        fee_percent: Decimal,
        provider_timeout: Duration,
    ) -> Self {
        PaymentOrchestrator {
            provider,
            payments,
            clock,
            fee_percent,
            provider_timeout,
            reconciliation: Mutex::new(Vec::new()),
        }
    }

    /// Bound a provider call by the configured timeout
    ///
    /// Provider calls must never hang a request; a timeout surfaces as a
    /// retryable 502-class error.
    async fn bounded<T>(
        &self,
        call: impl std::future::Future<Output = Result<T, EngineError>>,
    ) -> Result<T, EngineError> {
        match tokio::time::timeout(self.provider_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::ProviderTimeout {
                timeout_ms: self.provider_timeout.as_millis() as u64,
            }),
        }
    }

    /// Initiate payment for a transactable
    ///
    /// Claims the payment slot first: of two concurrent initiations exactly
    /// one reaches the provider, the other observes "already pending". On
    /// provider failure the claim is released and nothing local remains.
    pub async fn initiate(
        &self,
        transactable: &Transactable,
    ) -> Result<PaymentIntent, EngineError> {
        // "Already paid" outranks the status precondition: a paid entity has
        // advanced past the payable status, which would otherwise mask the
        // real reason.
        if let Some(record) = self.payments.get(transactable.id) {
            match record.status {
                PaymentStatus::Succeeded => {
                    return Err(EngineError::AlreadyPaid {
                        id: transactable.id,
                    })
                }
                PaymentStatus::Refunded => {
                    return Err(EngineError::AlreadyRefunded {
                        id: transactable.id,
                    })
                }
                _ => {}
            }
        }

        let required = transitions::payment_status(transactable.kind);
        if transactable.status != required {
            return Err(EngineError::payment_not_allowed(
                transactable.id,
                transactable.status.label(transactable.kind),
            ));
        }

        let now = self.clock.now();
        self.payments.claim(transactable.id, transactable.amount, now)?;

        let intent = match self
            .bounded(self.provider.create_intent(transactable.id, transactable.amount))
            .await
        {
            Ok(intent) => intent,
            Err(e) => {
                self.payments.release_claim(transactable.id);
                return Err(e);
            }
        };

        let split = FeeSplit::compute(transactable.amount, self.fee_percent);
        self.payments
            .fulfil(transactable.id, &intent, split, self.clock.now())?;

        info!(
            transactable = transactable.id,
            external_ref = %intent.external_ref,
            gross = %split.gross,
            platform_fee = %split.platform_fee,
            owner_earnings = %split.owner_earnings,
            "payment intent created"
        );

        Ok(intent)
    }

    /// Confirm a payment by external reference (webhook path)
    ///
    /// Idempotent; see [`ConfirmOutcome`] for the caller's follow-up duties.
    pub fn confirm(&self, external_ref: &str) -> ConfirmOutcome {
        let outcome = self.payments.confirm(external_ref, self.clock.now());
        match &outcome {
            ConfirmOutcome::Confirmed { transactable } => {
                info!(transactable, external_ref, "payment confirmed");
            }
            ConfirmOutcome::AlreadyConfirmed { transactable } => {
                info!(transactable, external_ref, "duplicate confirmation ignored");
            }
            ConfirmOutcome::Unknown => {
                warn!(external_ref, "confirmation for unknown reference ignored");
            }
            ConfirmOutcome::Ignored {
                transactable,
                status,
            } => {
                warn!(
                    transactable,
                    external_ref,
                    status = status.label(),
                    "confirmation for non-pending record ignored"
                );
            }
        }
        outcome
    }

    /// Refund the payment held by a transactable
    ///
    /// Requires a succeeded record. The percentage comes from the refund
    /// tiers against the entity's start date ("now" from the injected
    /// clock); entities without a start date refund in full. A zero-percent
    /// cancellation skips the provider and closes the record with a
    /// zero-value refund.
    pub async fn refund(
        &self,
        transactable: &Transactable,
    ) -> Result<RefundOutcome, EngineError> {
        let (gross, external_ref) = self.payments.claim_refund(transactable.id)?;

        let now = self.clock.now();
        let percentage = match transactable.start {
            Some(start) => refund::refund_percentage(now, start),
            None => 100,
        };
        let amount = refund::refund_amount(gross, percentage);

        let refund_ref = if amount.is_zero() {
            None
        } else {
            match self.bounded(self.provider.refund(&external_ref, amount)).await {
                Ok(refund_ref) => Some(refund_ref),
                Err(e) => {
                    self.payments.abort_refund(transactable.id);
                    return Err(e);
                }
            }
        };

        if let Err(e) = self.payments.finish_refund(
            transactable.id,
            refund_ref.as_deref().unwrap_or(""),
            percentage,
            amount,
            self.clock.now(),
        ) {
            // The provider already moved the money; flag the divergence
            // instead of losing it.
            error!(
                transactable = transactable.id,
                external_ref = %external_ref,
                amount = %amount,
                error = %e,
                "refund succeeded externally but local commit failed"
            );
            self.flag_reconciliation(ReconciliationEntry {
                transactable: transactable.id,
                external_ref,
                refund_ref,
                amount,
                reason: e.to_string(),
            });
            return Err(e);
        }

        info!(
            transactable = transactable.id,
            external_ref = %external_ref,
            amount = %amount,
            percentage,
            "payment refunded"
        );

        Ok(RefundOutcome { amount, percentage })
    }

    /// Append a divergence for manual or retry reconciliation
    pub fn flag_reconciliation(&self, entry: ReconciliationEntry) {
        self.reconciliation
            .lock()
            .expect("reconciliation log poisoned")
            .push(entry);
    }

    /// Snapshot of the reconciliation log
    pub fn reconciliation(&self) -> Vec<ReconciliationEntry> {
        self.reconciliation
            .lock()
            .expect("reconciliation log poisoned")
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::provider::SimulatedProvider;
    use crate::types::{PaymentStatus, Status, TransactableKind};
    use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    fn booking(id: u64, status: Status, days_until_start: i64) -> Transactable {
        Transactable {
            id,
            kind: TransactableKind::Booking,
            listing: 1,
            owner: 10,
            counterparty: 20,
            status,
            amount: Decimal::from(10000),
            quantity: None,
            start: Some(now() + ChronoDuration::days(days_until_start)),
            end: Some(now() + ChronoDuration::days(days_until_start + 3)),
            approved_at: None,
            paid_at: None,
            completed_at: None,
            cancelled_at: None,
            inventory_held: false,
            note: None,
        }
    }

    fn orchestrator(provider: Arc<SimulatedProvider>) -> PaymentOrchestrator {
        PaymentOrchestrator::new(
            provider,
            Arc::new(PaymentStore::new()),
            Arc::new(FixedClock::new(now())),
            Decimal::from(10),
            Duration::from_millis(500),
        )
    }

    #[tokio::test]
    async fn test_initiate_requires_payable_status() {
        let orchestrator = orchestrator(Arc::new(SimulatedProvider::new("s")));
        let result = orchestrator.initiate(&booking(1, Status::Pending, 10)).await;
        assert!(matches!(
            result,
            Err(EngineError::PaymentNotAllowed { id: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_initiate_records_fee_split() {
        let orchestrator = orchestrator(Arc::new(SimulatedProvider::new("s")));
        let intent = orchestrator
            .initiate(&booking(1, Status::Approved, 10))
            .await
            .unwrap();
        assert_eq!(intent.external_ref, "pi_000001");

        let record = orchestrator.payments.get(1).unwrap();
        assert_eq!(record.status, PaymentStatus::Pending);
        assert_eq!(record.split.gross, Decimal::from(10000));
        assert_eq!(record.split.platform_fee, Decimal::from(1000));
        assert_eq!(record.split.owner_earnings, Decimal::from(9000));
    }

    #[tokio::test]
    async fn test_initiate_twice_observes_pending() {
        let orchestrator = orchestrator(Arc::new(SimulatedProvider::new("s")));
        let entity = booking(1, Status::Approved, 10);
        orchestrator.initiate(&entity).await.unwrap();

        let result = orchestrator.initiate(&entity).await;
        assert!(matches!(
            result,
            Err(EngineError::PaymentAlreadyPending { id: 1 })
        ));
    }

    #[tokio::test]
    async fn test_provider_failure_leaves_no_record() {
        let provider = Arc::new(SimulatedProvider::new("s"));
        provider.set_fail_intents(true);
        let orchestrator = orchestrator(Arc::clone(&provider));

        let result = orchestrator.initiate(&booking(1, Status::Approved, 10)).await;
        assert!(matches!(result, Err(EngineError::Provider { .. })));
        assert!(orchestrator.payments.get(1).is_none());

        // The operation is retryable once the provider recovers
        provider.set_fail_intents(false);
        orchestrator
            .initiate(&booking(1, Status::Approved, 10))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_refund_applies_tier_percentage() {
        let orchestrator = orchestrator(Arc::new(SimulatedProvider::new("s")));
        let entity = booking(1, Status::Approved, 5);
        orchestrator.initiate(&entity).await.unwrap();
        orchestrator.confirm("pi_000001");

        let outcome = orchestrator.refund(&entity).await.unwrap();
        assert_eq!(outcome.percentage, 50);
        assert_eq!(outcome.amount, Decimal::from(5000));

        let record = orchestrator.payments.get(1).unwrap();
        assert_eq!(record.status, PaymentStatus::Refunded);
        assert_eq!(record.refund_percentage(), Some(50));
        assert_eq!(
            record.metadata.get("refund_reference").and_then(|v| v.as_str()),
            Some("re_000001")
        );
    }

    #[tokio::test]
    async fn test_refund_twice_fails_already_refunded() {
        let orchestrator = orchestrator(Arc::new(SimulatedProvider::new("s")));
        let entity = booking(1, Status::Approved, 10);
        orchestrator.initiate(&entity).await.unwrap();
        orchestrator.confirm("pi_000001");

        orchestrator.refund(&entity).await.unwrap();
        let before = orchestrator.payments.get(1).unwrap();

        let result = orchestrator.refund(&entity).await;
        assert!(matches!(
            result,
            Err(EngineError::AlreadyRefunded { id: 1 })
        ));
        assert_eq!(orchestrator.payments.get(1).unwrap(), before);
    }

    #[tokio::test]
    async fn test_refund_without_payment_fails() {
        let orchestrator = orchestrator(Arc::new(SimulatedProvider::new("s")));
        let result = orchestrator.refund(&booking(1, Status::Active, 10)).await;
        assert!(matches!(result, Err(EngineError::NotPaid { id: 1 })));
    }

    #[tokio::test]
    async fn test_zero_percent_refund_skips_provider() {
        let provider = Arc::new(SimulatedProvider::new("s"));
        let orchestrator = orchestrator(Arc::clone(&provider));
        let entity = booking(1, Status::Approved, 1);
        orchestrator.initiate(&entity).await.unwrap();
        orchestrator.confirm("pi_000001");

        // A failing provider proves the zero-amount path never calls it
        provider.set_fail_refunds(true);
        let outcome = orchestrator.refund(&entity).await.unwrap();
        assert_eq!(outcome.percentage, 0);
        assert_eq!(outcome.amount, Decimal::ZERO);
        assert_eq!(
            orchestrator.payments.get(1).unwrap().status,
            PaymentStatus::Refunded
        );
    }

    #[tokio::test]
    async fn test_refund_provider_failure_keeps_record_succeeded() {
        let provider = Arc::new(SimulatedProvider::new("s"));
        let orchestrator = orchestrator(Arc::clone(&provider));
        let entity = booking(1, Status::Approved, 10);
        orchestrator.initiate(&entity).await.unwrap();
        orchestrator.confirm("pi_000001");

        provider.set_fail_refunds(true);
        let result = orchestrator.refund(&entity).await;
        assert!(matches!(result, Err(EngineError::Provider { .. })));
        assert_eq!(
            orchestrator.payments.get(1).unwrap().status,
            PaymentStatus::Succeeded
        );

        // Retry succeeds once the provider recovers
        provider.set_fail_refunds(false);
        assert!(orchestrator.refund(&entity).await.is_ok());
    }

    #[tokio::test]
    async fn test_provider_timeout_is_bounded() {
        struct HangingProvider;

        #[async_trait::async_trait]
        impl PaymentProvider for HangingProvider {
            async fn create_intent(
                &self,
                _transactable: TransactableId,
                _amount: Decimal,
            ) -> Result<PaymentIntent, EngineError> {
                std::future::pending().await
            }

            async fn refund(
                &self,
                _external_ref: &str,
                _amount: Decimal,
            ) -> Result<String, EngineError> {
                std::future::pending().await
            }

            fn verify_webhook_signature(&self, _payload: &[u8], _signature: &str) -> bool {
                true
            }
        }

        let orchestrator = PaymentOrchestrator::new(
            Arc::new(HangingProvider),
            Arc::new(PaymentStore::new()),
            Arc::new(FixedClock::new(now())),
            Decimal::from(10),
            Duration::from_millis(20),
        );

        let result = orchestrator.initiate(&booking(1, Status::Approved, 10)).await;
        assert!(matches!(
            result,
            Err(EngineError::ProviderTimeout { timeout_ms: 20 })
        ));
        assert!(orchestrator.payments.get(1).is_none());
    }
}
