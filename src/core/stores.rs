//! Concurrent entity stores
//!
//! The stores stand in for the relational datastore: sharded concurrent
//! maps whose entry locks provide the per-key atomicity the engine's
//! correctness properties rest on. Every mutation of an entity happens
//! under the entry lock of its key, which gives:
//!
//! - conditional stock decrements that cannot oversell under concurrency
//! - at most one payment record per transactable, claimed atomically
//! - status transitions that re-validate against the state found at
//!   commit time, so a stale request loses the race cleanly
//!
//! No process-wide caches sit in front of these maps; the store is the
//! single source of truth.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rust_decimal::Decimal;

use crate::types::{
    EngineError, ExternalRef, FeeSplit, Inventory, Listing, ListingId, Notification,
    PaymentIntent, PaymentRecord, PaymentStatus, Transactable, TransactableId,
};

/// Store of bookings, rentals, and orders
#[derive(Debug, Default)]
pub struct TransactableStore {
    inner: DashMap<TransactableId, Transactable>,
}

impl TransactableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a freshly created transactable
    ///
    /// Fails if the id is already taken; the existing entity is untouched.
    pub fn insert_new(&self, transactable: Transactable) -> Result<(), EngineError> {
        match self.inner.entry(transactable.id) {
            Entry::Occupied(_) => Err(EngineError::DuplicateTransactable {
                id: transactable.id,
            }),
            Entry::Vacant(vacant) => {
                vacant.insert(transactable);
                Ok(())
            }
        }
    }

    /// Snapshot of one transactable
    pub fn get(&self, id: TransactableId) -> Option<Transactable> {
        self.inner.get(&id).map(|entry| entry.value().clone())
    }

    /// Mutate a transactable under its entry lock
    ///
    /// The closure runs while the entry is locked, so concurrent updates to
    /// the same entity serialize here; the closure sees the state as of
    /// commit time. Returns whatever the closure returns.
    pub fn update<T, F>(&self, id: TransactableId, f: F) -> Result<T, EngineError>
    where
        F: FnOnce(&mut Transactable) -> Result<T, EngineError>,
    {
        let mut entry = self
            .inner
            .get_mut(&id)
            .ok_or(EngineError::TransactableNotFound { id })?;
        f(entry.value_mut())
    }

    /// Snapshot of all transactables, in arbitrary order
    pub fn all(&self) -> Vec<Transactable> {
        self.inner.iter().map(|entry| entry.value().clone()).collect()
    }
}

/// Store of listings and their inventory
#[derive(Debug, Default)]
pub struct ListingStore {
    inner: DashMap<ListingId, Listing>,
}

impl ListingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, listing: Listing) {
        self.inner.insert(listing.id, listing);
    }

    pub fn get(&self, id: ListingId) -> Option<Listing> {
        self.inner.get(&id).map(|entry| entry.value().clone())
    }

    /// Atomically decrement countable stock
    ///
    /// Check and subtract happen under the entry lock: of two concurrent
    /// reservations whose combined quantity exceeds the stock, exactly one
    /// succeeds and the other observes the shortfall. Stock never goes
    /// negative.
    pub fn reserve_stock(&self, id: ListingId, quantity: u32) -> Result<(), EngineError> {
        let mut entry = self
            .inner
            .get_mut(&id)
            .ok_or(EngineError::ListingNotFound { listing: id })?;
        match &mut entry.value_mut().inventory {
            Inventory::Stock { available } => {
                if *available < quantity {
                    return Err(EngineError::insufficient_stock(id, quantity, *available));
                }
                *available -= quantity;
                Ok(())
            }
            Inventory::Slot { .. } => Err(EngineError::invalid_input(format!(
                "listing {} is slot-based, not stock-based",
                id
            ))),
        }
    }

    /// Atomically take a slot-based listing
    ///
    /// Of two concurrent approvals against the same plot or tool, exactly
    /// one takes the slot.
    pub fn take_slot(&self, id: ListingId) -> Result<(), EngineError> {
        let mut entry = self
            .inner
            .get_mut(&id)
            .ok_or(EngineError::ListingNotFound { listing: id })?;
        let listing = entry.value_mut();
        match &mut listing.inventory {
            Inventory::Slot { available } => {
                if !*available {
                    return Err(EngineError::listing_not_available(
                        id,
                        listing.status().label(),
                    ));
                }
                *available = false;
                Ok(())
            }
            Inventory::Stock { .. } => Err(EngineError::invalid_input(format!(
                "listing {} is stock-based, not slot-based",
                id
            ))),
        }
    }

    /// Restore inventory released by a cancellation
    ///
    /// `quantity` is `Some` for stock-based listings and `None` for
    /// slot-based ones. Callers guard against double-credit via the
    /// transactable's `inventory_held` flag; this method just applies the
    /// credit.
    pub fn restore(&self, id: ListingId, quantity: Option<u32>) -> Result<(), EngineError> {
        let mut entry = self
            .inner
            .get_mut(&id)
            .ok_or(EngineError::ListingNotFound { listing: id })?;
        match (&mut entry.value_mut().inventory, quantity) {
            (Inventory::Stock { available }, Some(quantity)) => {
                *available += quantity;
                Ok(())
            }
            (Inventory::Slot { available }, None) => {
                *available = true;
                Ok(())
            }
            _ => Err(EngineError::invalid_input(format!(
                "inventory restore shape mismatch for listing {}",
                id
            ))),
        }
    }

    pub fn all(&self) -> Vec<Listing> {
        self.inner.iter().map(|entry| entry.value().clone()).collect()
    }
}

/// Outcome of confirming a payment by external reference
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmOutcome {
    /// No record carries this reference; webhooks may be replayed or refer
    /// to objects this system never created, so this is logged, not failed
    Unknown,
    /// First confirmation: the caller must advance the entity and notify
    Confirmed { transactable: TransactableId },
    /// Redelivery of an already-processed confirmation; a no-op
    AlreadyConfirmed { transactable: TransactableId },
    /// Reference known but the record is not in a confirmable state
    Ignored {
        transactable: TransactableId,
        status: PaymentStatus,
    },
}

/// Store of payment records, keyed by transactable id
///
/// The keying IS the uniqueness constraint: one record per transactable.
/// A secondary index maps the provider's external reference back to the
/// transactable for webhook lookups.
#[derive(Debug, Default)]
pub struct PaymentStore {
    records: DashMap<TransactableId, PaymentRecord>,
    by_ref: DashMap<ExternalRef, TransactableId>,
}

impl PaymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the payment slot for a transactable, before the provider call
    ///
    /// Exactly one of two concurrent initiations wins the claim; the loser
    /// observes "already pending". A Failed or Cancelled record is
    /// superseded in place (its old external reference is unindexed); a
    /// Succeeded or Refunded record rejects the claim outright.
    pub fn claim(
        &self,
        transactable: TransactableId,
        gross: Decimal,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        match self.records.entry(transactable) {
            Entry::Vacant(vacant) => {
                vacant.insert(PaymentRecord::claimed(transactable, gross, now));
                Ok(())
            }
            Entry::Occupied(mut occupied) => match occupied.get().status {
                PaymentStatus::Pending => {
                    Err(EngineError::PaymentAlreadyPending { id: transactable })
                }
                PaymentStatus::Succeeded => Err(EngineError::AlreadyPaid { id: transactable }),
                PaymentStatus::Refunded => Err(EngineError::AlreadyRefunded { id: transactable }),
                PaymentStatus::Failed | PaymentStatus::Cancelled => {
                    if let Some(old_ref) = occupied.get().external_ref.clone() {
                        self.by_ref.remove(&old_ref);
                    }
                    occupied.insert(PaymentRecord::claimed(transactable, gross, now));
                    Ok(())
                }
            },
        }
    }

    /// Release a claim whose provider call failed
    ///
    /// Only removes the record while it is still an unfulfilled claim, so a
    /// concurrent confirmation cannot be clobbered.
    pub fn release_claim(&self, transactable: TransactableId) {
        self.records.remove_if(&transactable, |_, record| {
            record.status == PaymentStatus::Pending && record.external_ref.is_none()
        });
    }

    /// Attach the provider's intent to a claimed record
    pub fn fulfil(
        &self,
        transactable: TransactableId,
        intent: &PaymentIntent,
        split: FeeSplit,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let mut entry = self
            .records
            .get_mut(&transactable)
            .ok_or(EngineError::NotPaid { id: transactable })?;
        let record = entry.value_mut();
        record.external_ref = Some(intent.external_ref.clone());
        record.client_secret = Some(intent.client_secret.clone());
        record.split = split;
        record.updated_at = now;
        drop(entry);
        self.by_ref.insert(intent.external_ref.clone(), transactable);
        Ok(())
    }

    /// Confirm a payment by its external reference (webhook path)
    ///
    /// Idempotent: only the first delivery flips Pending to Succeeded, and
    /// only that delivery reports `Confirmed`.
    pub fn confirm(&self, external_ref: &str, now: DateTime<Utc>) -> ConfirmOutcome {
        let Some(transactable) = self.by_ref.get(external_ref).map(|entry| *entry.value()) else {
            return ConfirmOutcome::Unknown;
        };
        let Some(mut entry) = self.records.get_mut(&transactable) else {
            return ConfirmOutcome::Unknown;
        };
        let record = entry.value_mut();
        match record.status {
            PaymentStatus::Pending => {
                record.status = PaymentStatus::Succeeded;
                record.updated_at = now;
                ConfirmOutcome::Confirmed { transactable }
            }
            PaymentStatus::Succeeded | PaymentStatus::Refunded => {
                ConfirmOutcome::AlreadyConfirmed { transactable }
            }
            status => ConfirmOutcome::Ignored {
                transactable,
                status,
            },
        }
    }

    /// Close a pending record as Failed or Cancelled (webhook path)
    ///
    /// Returns whether a record actually transitioned.
    pub fn close(&self, external_ref: &str, status: PaymentStatus, now: DateTime<Utc>) -> bool {
        debug_assert!(matches!(
            status,
            PaymentStatus::Failed | PaymentStatus::Cancelled
        ));
        let Some(transactable) = self.by_ref.get(external_ref).map(|entry| *entry.value()) else {
            return false;
        };
        let Some(mut entry) = self.records.get_mut(&transactable) else {
            return false;
        };
        let record = entry.value_mut();
        if record.status == PaymentStatus::Pending {
            record.status = status;
            record.updated_at = now;
            true
        } else {
            false
        }
    }

    /// Claim a succeeded record for refund submission
    ///
    /// Returns the gross amount and external reference to refund against.
    /// The in-flight flag keeps a concurrent second submission out until
    /// the refund finishes or aborts.
    pub fn claim_refund(
        &self,
        transactable: TransactableId,
    ) -> Result<(Decimal, ExternalRef), EngineError> {
        let mut entry = self
            .records
            .get_mut(&transactable)
            .ok_or(EngineError::NotPaid { id: transactable })?;
        let record = entry.value_mut();
        match record.status {
            PaymentStatus::Succeeded => {
                if record.refund_in_flight {
                    return Err(EngineError::RefundInFlight { id: transactable });
                }
                let external_ref = record
                    .external_ref
                    .clone()
                    .ok_or(EngineError::NotPaid { id: transactable })?;
                record.refund_in_flight = true;
                Ok((record.split.gross, external_ref))
            }
            PaymentStatus::Refunded => Err(EngineError::AlreadyRefunded { id: transactable }),
            _ => Err(EngineError::NotPaid { id: transactable }),
        }
    }

    /// Abort a refund claim whose provider call failed
    pub fn abort_refund(&self, transactable: TransactableId) {
        if let Some(mut entry) = self.records.get_mut(&transactable) {
            entry.value_mut().refund_in_flight = false;
        }
    }

    /// Mark a claimed record refunded, storing the refund details
    pub fn finish_refund(
        &self,
        transactable: TransactableId,
        refund_ref: &str,
        percentage: u32,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let mut entry = self
            .records
            .get_mut(&transactable)
            .ok_or(EngineError::NotPaid { id: transactable })?;
        let record = entry.value_mut();
        record.status = PaymentStatus::Refunded;
        record.refund_in_flight = false;
        record.metadata = serde_json::json!({
            "refund_reference": refund_ref,
            "refund_percentage": percentage,
            "refund_amount": amount.to_string(),
        });
        record.updated_at = now;
        Ok(())
    }

    pub fn get(&self, transactable: TransactableId) -> Option<PaymentRecord> {
        self.records
            .get(&transactable)
            .map(|entry| entry.value().clone())
    }

    pub fn all(&self) -> Vec<PaymentRecord> {
        self.records
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }
}

/// Fire-and-forget notification sink
///
/// In the deployed system this is a table write; here it accumulates
/// records so replays and tests can assert on the fan-out.
#[derive(Debug, Default)]
pub struct NotificationSink {
    inner: Mutex<Vec<Notification>>,
}

impl NotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, notification: Notification) {
        self.inner
            .lock()
            .expect("notification sink poisoned")
            .push(notification);
    }

    pub fn all(&self) -> Vec<Notification> {
        self.inner
            .lock()
            .expect("notification sink poisoned")
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TransactableKind;
    use std::sync::Arc;

    fn stock_listing(id: ListingId, available: u32) -> Listing {
        Listing {
            id,
            owner: 10,
            kind: TransactableKind::Order,
            inventory: Inventory::Stock { available },
            unit_price: Some(Decimal::from(500)),
            daily_rate: None,
            weekly_rate: None,
        }
    }

    fn slot_listing(id: ListingId) -> Listing {
        Listing {
            id,
            owner: 10,
            kind: TransactableKind::Rental,
            inventory: Inventory::Slot { available: true },
            unit_price: None,
            daily_rate: Some(Decimal::from(1500)),
            weekly_rate: None,
        }
    }

    #[test]
    fn test_reserve_stock_decrements() {
        let store = ListingStore::new();
        store.upsert(stock_listing(1, 5));

        store.reserve_stock(1, 3).unwrap();
        assert_eq!(
            store.get(1).unwrap().inventory,
            Inventory::Stock { available: 2 }
        );
    }

    #[test]
    fn test_reserve_stock_never_oversells() {
        let store = ListingStore::new();
        store.upsert(stock_listing(1, 2));

        let result = store.reserve_stock(1, 3);
        assert!(matches!(
            result,
            Err(EngineError::InsufficientStock { .. })
        ));
        assert_eq!(
            store.get(1).unwrap().inventory,
            Inventory::Stock { available: 2 }
        );
    }

    #[test]
    fn test_concurrent_reservations_only_one_wins() {
        let store = Arc::new(ListingStore::new());
        store.upsert(stock_listing(1, 1));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.reserve_stock(1, 1))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let successes = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);
        assert_eq!(
            store.get(1).unwrap().inventory,
            Inventory::Stock { available: 0 }
        );
    }

    #[test]
    fn test_take_slot_exactly_once() {
        let store = ListingStore::new();
        store.upsert(slot_listing(2));

        store.take_slot(2).unwrap();
        let result = store.take_slot(2);
        assert!(matches!(
            result,
            Err(EngineError::ListingNotAvailable { .. })
        ));
    }

    #[test]
    fn test_restore_slot_and_stock() {
        let store = ListingStore::new();
        store.upsert(stock_listing(1, 0));
        store.upsert(slot_listing(2));
        store.take_slot(2).unwrap();

        store.restore(1, Some(4)).unwrap();
        store.restore(2, None).unwrap();

        assert_eq!(
            store.get(1).unwrap().inventory,
            Inventory::Stock { available: 4 }
        );
        assert_eq!(
            store.get(2).unwrap().inventory,
            Inventory::Slot { available: true }
        );
    }

    fn now() -> DateTime<Utc> {
        use chrono::TimeZone;
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    fn intent(external_ref: &str) -> PaymentIntent {
        PaymentIntent {
            client_secret: format!("{}_secret", external_ref),
            external_ref: external_ref.to_string(),
        }
    }

    #[test]
    fn test_claim_is_exclusive_while_pending() {
        let store = PaymentStore::new();
        store.claim(1, Decimal::from(1000), now()).unwrap();

        let result = store.claim(1, Decimal::from(1000), now());
        assert!(matches!(
            result,
            Err(EngineError::PaymentAlreadyPending { id: 1 })
        ));
    }

    #[test]
    fn test_concurrent_claims_exactly_one_wins() {
        let store = Arc::new(PaymentStore::new());

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.claim(1, Decimal::from(1000), now()))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    }

    #[test]
    fn test_confirm_is_idempotent() {
        let store = PaymentStore::new();
        store.claim(1, Decimal::from(1000), now()).unwrap();
        let split = FeeSplit::compute(Decimal::from(1000), Decimal::from(10));
        store.fulfil(1, &intent("pi_000001"), split, now()).unwrap();

        assert_eq!(
            store.confirm("pi_000001", now()),
            ConfirmOutcome::Confirmed { transactable: 1 }
        );
        assert_eq!(
            store.confirm("pi_000001", now()),
            ConfirmOutcome::AlreadyConfirmed { transactable: 1 }
        );
    }

    #[test]
    fn test_confirm_unknown_reference() {
        let store = PaymentStore::new();
        assert_eq!(store.confirm("pi_nope", now()), ConfirmOutcome::Unknown);
    }

    #[test]
    fn test_failed_record_superseded_by_new_claim() {
        let store = PaymentStore::new();
        store.claim(1, Decimal::from(1000), now()).unwrap();
        let split = FeeSplit::compute(Decimal::from(1000), Decimal::from(10));
        store.fulfil(1, &intent("pi_000001"), split, now()).unwrap();
        assert!(store.close("pi_000001", PaymentStatus::Failed, now()));

        // Fresh claim supersedes the failed record and unindexes the old ref
        store.claim(1, Decimal::from(1000), now()).unwrap();
        assert_eq!(store.confirm("pi_000001", now()), ConfirmOutcome::Unknown);
        assert_eq!(store.get(1).unwrap().status, PaymentStatus::Pending);
    }

    #[test]
    fn test_release_claim_only_removes_unfulfilled_claims() {
        let store = PaymentStore::new();
        store.claim(1, Decimal::from(1000), now()).unwrap();
        let split = FeeSplit::compute(Decimal::from(1000), Decimal::from(10));
        store.fulfil(1, &intent("pi_000001"), split, now()).unwrap();

        store.release_claim(1);
        assert!(store.get(1).is_some());
    }

    #[test]
    fn test_refund_claim_lifecycle() {
        let store = PaymentStore::new();
        store.claim(1, Decimal::from(1000), now()).unwrap();
        let split = FeeSplit::compute(Decimal::from(1000), Decimal::from(10));
        store.fulfil(1, &intent("pi_000001"), split, now()).unwrap();
        store.confirm("pi_000001", now());

        let (amount, external_ref) = store.claim_refund(1).unwrap();
        assert_eq!(amount, Decimal::from(1000));
        assert_eq!(external_ref, "pi_000001");

        // A second claim while in flight is rejected
        assert!(matches!(
            store.claim_refund(1),
            Err(EngineError::RefundInFlight { id: 1 })
        ));

        store
            .finish_refund(1, "re_000001", 50, Decimal::from(500), now())
            .unwrap();
        let record = store.get(1).unwrap();
        assert_eq!(record.status, PaymentStatus::Refunded);
        assert_eq!(record.refund_percentage(), Some(50));

        // Refunding twice fails and leaves the record unchanged
        assert!(matches!(
            store.claim_refund(1),
            Err(EngineError::AlreadyRefunded { id: 1 })
        ));
        assert_eq!(store.get(1).unwrap(), record);
    }

    #[test]
    fn test_refund_requires_succeeded_record() {
        let store = PaymentStore::new();
        assert!(matches!(
            store.claim_refund(1),
            Err(EngineError::NotPaid { id: 1 })
        ));

        store.claim(1, Decimal::from(1000), now()).unwrap();
        assert!(matches!(
            store.claim_refund(1),
            Err(EngineError::NotPaid { id: 1 })
        ));
    }
}
