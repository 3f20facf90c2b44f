//! Lifecycle engine
//!
//! The engine coordinates the pure rule kernels (transition tables,
//! pricing, refund tiers) with the stores, the payment orchestrator, and
//! the side-effect dispatcher. Each public method corresponds to one
//! inbound request; all of them take `&self` and are safe to call
//! concurrently, with per-entity serialization provided by the stores'
//! entry locks.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::clock::Clock;
use crate::provider::PaymentProvider;
use crate::types::{
    Command, EngineError, Listing, ListingId, ListingStatus, Notification, PartyId, PaymentIntent,
    PaymentRecord, PaymentStatus, Status, Transactable, TransactableId, TransactableKind,
};

use super::dispatcher::{NoopRewards, RewardHook, SideEffectDispatcher};
use super::payment::{PaymentOrchestrator, ReconciliationEntry};
use super::pricing;
use super::stores::{ConfirmOutcome, ListingStore, NotificationSink, PaymentStore, TransactableStore};
use super::transitions;

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Platform fee as a percentage of the gross amount
    pub fee_percent: Decimal,
    /// Bound on every external provider call
    pub provider_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            fee_percent: Decimal::from(10),
            provider_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WebhookEvent {
    #[serde(rename = "type")]
    kind: String,
    data: WebhookData,
}

#[derive(Debug, Deserialize)]
struct WebhookData {
    object: WebhookObject,
}

#[derive(Debug, Deserialize)]
struct WebhookObject {
    id: String,
}

/// The transaction lifecycle engine
pub struct LifecycleEngine {
    transactables: TransactableStore,
    listings: Arc<ListingStore>,
    payments: Arc<PaymentStore>,
    notifications: Arc<NotificationSink>,
    orchestrator: PaymentOrchestrator,
    dispatcher: SideEffectDispatcher,
    provider: Arc<dyn PaymentProvider>,
    clock: Arc<dyn Clock>,
}

impl LifecycleEngine {
    /// Create an engine with the default (no-op) reward hook
    pub fn new(
        provider: Arc<dyn PaymentProvider>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        Self::with_rewards(provider, clock, config, Arc::new(NoopRewards))
    }

    /// Create an engine with a custom reward hook
    pub fn with_rewards(
        provider: Arc<dyn PaymentProvider>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
        rewards: Arc<dyn RewardHook>,
    ) -> Self {
        let listings = Arc::new(ListingStore::new());
        let payments = Arc::new(PaymentStore::new());
        let notifications = Arc::new(NotificationSink::new());
        let orchestrator = PaymentOrchestrator::new(
            Arc::clone(&provider),
            Arc::clone(&payments),
            Arc::clone(&clock),
            config.fee_percent,
            config.provider_timeout,
        );
        let dispatcher = SideEffectDispatcher::new(
            Arc::clone(&listings),
            Arc::clone(&notifications),
            rewards,
        );
        LifecycleEngine {
            transactables: TransactableStore::new(),
            listings,
            payments,
            notifications,
            orchestrator,
            dispatcher,
            provider,
            clock,
        }
    }

    /// Apply one command
    ///
    /// Routes to the matching operation; callers that need the operation's
    /// return value (the created entity, the payment intent) call the
    /// operation directly.
    pub async fn apply(&self, command: Command) -> Result<(), EngineError> {
        match command {
            Command::SeedListing(listing) => {
                self.seed_listing(listing);
                Ok(())
            }
            Command::Create {
                id,
                kind,
                actor,
                listing,
                quantity,
                start,
                end,
            } => self
                .create(id, kind, actor, listing, quantity, start, end)
                .map(|_| ()),
            Command::Transition {
                id,
                actor,
                requested,
            } => self.transition(id, actor, requested).await.map(|_| ()),
            Command::Note { id, actor, text } => self.update_note(id, actor, text).map(|_| ()),
            Command::InitiatePayment { id, actor } => {
                self.initiate_payment(id, actor).await.map(|_| ())
            }
            Command::Webhook { payload, signature } => self.handle_webhook(&payload, &signature),
        }
    }

    /// Register a listing for transactables to be created against
    pub fn seed_listing(&self, listing: Listing) {
        info!(listing = listing.id, kind = listing.kind.label(), "listing seeded");
        self.listings.upsert(listing);
    }

    /// Create a transactable in PENDING against an available listing
    ///
    /// Orders price by unit and atomically decrement the listing's stock;
    /// bookings and rentals price by duration and leave the slot untouched
    /// until approval.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        &self,
        id: TransactableId,
        kind: TransactableKind,
        actor: PartyId,
        listing_id: ListingId,
        quantity: Option<u32>,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Transactable, EngineError> {
        if self.transactables.get(id).is_some() {
            return Err(EngineError::DuplicateTransactable { id });
        }
        let listing = self
            .listings
            .get(listing_id)
            .ok_or(EngineError::ListingNotFound { listing: listing_id })?;
        if listing.kind != kind {
            return Err(EngineError::invalid_input(format!(
                "listing {} serves {}s, not {}s",
                listing_id,
                listing.kind.label(),
                kind.label()
            )));
        }
        if listing.status() != ListingStatus::Available {
            return Err(EngineError::listing_not_available(
                listing_id,
                listing.status().label(),
            ));
        }

        let (amount, quantity, start, end, inventory_held) = match kind {
            TransactableKind::Order => {
                let quantity = quantity.ok_or_else(|| {
                    EngineError::invalid_input("order requires a quantity")
                })?;
                let unit_price = listing.unit_price.ok_or_else(|| {
                    EngineError::invalid_input(format!("listing {} has no unit price", listing_id))
                })?;
                let available = match listing.inventory {
                    crate::types::Inventory::Stock { available } => available,
                    crate::types::Inventory::Slot { .. } => {
                        return Err(EngineError::invalid_input(format!(
                            "listing {} has no countable stock",
                            listing_id
                        )))
                    }
                };
                let amount = pricing::order_price(listing_id, unit_price, quantity, available)?;
                // Atomic decrement re-checks the bound at commit time.
                self.listings.reserve_stock(listing_id, quantity)?;
                (amount, Some(quantity), None, None, true)
            }
            TransactableKind::Booking | TransactableKind::Rental => {
                let start = start.ok_or_else(|| {
                    EngineError::invalid_input(format!(
                        "{} requires start and end dates",
                        kind.label()
                    ))
                })?;
                let end = end.ok_or_else(|| {
                    EngineError::invalid_input(format!(
                        "{} requires start and end dates",
                        kind.label()
                    ))
                })?;
                let daily_rate = listing.daily_rate.ok_or_else(|| {
                    EngineError::invalid_input(format!("listing {} has no daily rate", listing_id))
                })?;
                let amount = pricing::rental_price(daily_rate, listing.weekly_rate, start, end)?;
                (amount, None, Some(start), Some(end), false)
            }
        };

        let transactable = Transactable {
            id,
            kind,
            listing: listing_id,
            owner: listing.owner,
            counterparty: actor,
            status: Status::Pending,
            amount,
            quantity,
            start,
            end,
            approved_at: None,
            paid_at: None,
            completed_at: None,
            cancelled_at: None,
            inventory_held,
            note: None,
        };

        if let Err(e) = self.transactables.insert_new(transactable.clone()) {
            // Undo the stock decrement taken above; the id race loser must
            // not eat inventory.
            if inventory_held {
                let _ = self.listings.restore(listing_id, quantity);
            }
            return Err(e);
        }

        info!(
            transactable = id,
            kind = kind.label(),
            listing = listing_id,
            counterparty = actor,
            amount = %amount,
            "transactable created"
        );
        self.dispatcher.after_created(&transactable);
        Ok(transactable)
    }

    /// Request a status transition on behalf of an actor
    ///
    /// Authorization and table validation run against a snapshot, then the
    /// commit re-validates under the entry lock: of two concurrent requests
    /// only the one matching the state at commit time succeeds. Cancelling
    /// a paid entity refunds first, so a provider failure leaves the status
    /// untouched.
    pub async fn transition(
        &self,
        id: TransactableId,
        actor: PartyId,
        requested: Status,
    ) -> Result<Transactable, EngineError> {
        let snapshot = self
            .transactables
            .get(id)
            .ok_or(EngineError::TransactableNotFound { id })?;
        let role = snapshot
            .role_of(actor)
            .ok_or_else(|| EngineError::forbidden(id, actor))?;
        transitions::validate(snapshot.kind, id, snapshot.status, role, requested)?;

        let refund = if requested == Status::Cancelled && self.is_paid(id) {
            Some(self.orchestrator.refund(&snapshot).await?)
        } else {
            None
        };

        let now = self.clock.now();
        let committed = self.transactables.update(id, |t| {
            if t.status != snapshot.status {
                // A concurrent transition won; reject the stale request.
                return Err(EngineError::invalid_transition(
                    id,
                    t.status.label(t.kind),
                    requested.label(t.kind),
                ));
            }
            if requested == Status::Approved && t.kind != TransactableKind::Order {
                // Approval takes the plot/tool slot; if someone else holds
                // it the approval fails and the status stays put.
                self.listings.take_slot(t.listing)?;
                t.inventory_held = true;
            }
            let mut restore = false;
            if requested == Status::Cancelled && t.inventory_held {
                t.inventory_held = false;
                restore = true;
            }
            t.stamp(requested, now);
            Ok((t.clone(), restore))
        });

        match committed {
            Ok((transactable, restore)) => {
                info!(
                    transactable = id,
                    actor,
                    from = snapshot.status.label(snapshot.kind),
                    to = requested.label(snapshot.kind),
                    "transition applied"
                );
                self.dispatcher.after_transition(&transactable, actor, restore);
                Ok(transactable)
            }
            Err(e) => {
                if let Some(refund) = refund {
                    // The refund already went out but the cancellation lost
                    // a status race; flag the divergence.
                    error!(
                        transactable = id,
                        amount = %refund.amount,
                        error = %e,
                        "refund committed but cancellation rejected"
                    );
                    let record = self.payments.get(id);
                    self.orchestrator.flag_reconciliation(ReconciliationEntry {
                        transactable: id,
                        external_ref: record
                            .as_ref()
                            .and_then(|r| r.external_ref.clone())
                            .unwrap_or_default(),
                        refund_ref: record.as_ref().and_then(|r| {
                            r.metadata
                                .get("refund_reference")
                                .and_then(|v| v.as_str())
                                .map(String::from)
                        }),
                        amount: refund.amount,
                        reason: format!("refund committed but cancellation rejected: {}", e),
                    });
                }
                Err(e)
            }
        }
    }

    /// Update the free-text note without a status change
    ///
    /// Permitted for either counterparty in any status; the transition
    /// validator is bypassed and no timestamp moves.
    pub fn update_note(
        &self,
        id: TransactableId,
        actor: PartyId,
        text: String,
    ) -> Result<Transactable, EngineError> {
        let snapshot = self
            .transactables
            .get(id)
            .ok_or(EngineError::TransactableNotFound { id })?;
        snapshot
            .role_of(actor)
            .ok_or_else(|| EngineError::forbidden(id, actor))?;
        self.transactables.update(id, |t| {
            t.note = Some(text.clone());
            Ok(t.clone())
        })
    }

    /// Initiate payment for a transactable
    ///
    /// Only the paying counterparty may initiate.
    pub async fn initiate_payment(
        &self,
        id: TransactableId,
        actor: PartyId,
    ) -> Result<PaymentIntent, EngineError> {
        let snapshot = self
            .transactables
            .get(id)
            .ok_or(EngineError::TransactableNotFound { id })?;
        match snapshot.role_of(actor) {
            Some(crate::types::ActorRole::Counterparty) => {}
            _ => return Err(EngineError::forbidden(id, actor)),
        }
        self.orchestrator.initiate(&snapshot).await
    }

    /// Handle a payment-provider webhook
    ///
    /// The signature is verified before anything else; unsigned or
    /// tampered payloads are rejected with no processing. Deliveries are
    /// idempotent: replaying a confirmation advances nothing twice and
    /// sends no second notification. Unknown references and unhandled
    /// event types are logged and ignored.
    pub fn handle_webhook(&self, payload: &str, signature: &str) -> Result<(), EngineError> {
        if !self
            .provider
            .verify_webhook_signature(payload.as_bytes(), signature)
        {
            return Err(EngineError::InvalidSignature);
        }
        let event: WebhookEvent =
            serde_json::from_str(payload).map_err(|e| EngineError::InvalidWebhookPayload {
                message: e.to_string(),
            })?;

        match event.kind.as_str() {
            "payment_intent.succeeded" => {
                if let ConfirmOutcome::Confirmed { transactable } =
                    self.orchestrator.confirm(&event.data.object.id)
                {
                    self.advance_paid(transactable);
                }
                Ok(())
            }
            "payment_intent.payment_failed" => {
                self.close_payment(&event.data.object.id, PaymentStatus::Failed);
                Ok(())
            }
            "payment_intent.canceled" => {
                self.close_payment(&event.data.object.id, PaymentStatus::Cancelled);
                Ok(())
            }
            other => {
                info!(event = other, "ignoring webhook event type");
                Ok(())
            }
        }
    }

    fn close_payment(&self, external_ref: &str, status: PaymentStatus) {
        if self.payments.close(external_ref, status, self.clock.now()) {
            info!(external_ref, status = status.label(), "payment closed");
        } else {
            warn!(
                external_ref,
                status = status.label(),
                "close for unknown or non-pending payment ignored"
            );
        }
    }

    /// Advance a transactable whose payment was just confirmed
    fn advance_paid(&self, id: TransactableId) {
        let now = self.clock.now();
        let advanced = self.transactables.update(id, |t| {
            let expected = transitions::payment_status(t.kind);
            let target = transitions::paid_status(t.kind);
            if t.status != expected {
                return Err(EngineError::invalid_transition(
                    id,
                    t.status.label(t.kind),
                    target.label(t.kind),
                ));
            }
            t.paid_at = Some(now);
            t.stamp(target, now);
            Ok(t.clone())
        });
        match advanced {
            Ok(transactable) => {
                info!(
                    transactable = id,
                    to = transactable.status.label(transactable.kind),
                    "status advanced on payment confirmation"
                );
                self.dispatcher.after_payment_confirmed(&transactable);
            }
            Err(e) => {
                warn!(
                    transactable = id,
                    error = %e,
                    "payment confirmed but status not advanced"
                );
            }
        }
    }

    fn is_paid(&self, id: TransactableId) -> bool {
        self.payments
            .get(id)
            .map(|record| record.status == PaymentStatus::Succeeded)
            .unwrap_or(false)
    }

    // Snapshot accessors for output and assertions

    pub fn transactable(&self, id: TransactableId) -> Option<Transactable> {
        self.transactables.get(id)
    }

    pub fn transactables(&self) -> Vec<Transactable> {
        self.transactables.all()
    }

    pub fn listing(&self, id: ListingId) -> Option<Listing> {
        self.listings.get(id)
    }

    pub fn payment(&self, id: TransactableId) -> Option<PaymentRecord> {
        self.payments.get(id)
    }

    pub fn payments(&self) -> Vec<PaymentRecord> {
        self.payments.all()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.all()
    }

    pub fn reconciliation(&self) -> Vec<ReconciliationEntry> {
        self.orchestrator.reconciliation()
    }
}
