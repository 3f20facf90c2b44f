//! Status transition tables and validation
//!
//! The transition rules are data, not control flow: one static table per
//! transactable kind, keyed by current status and actor role. The validator
//! is a lookup plus a membership check, so it can be tested exhaustively on
//! its own.
//!
//! Webhook-driven advancement (payment confirmation) is a system transition
//! outside these tables; see [`payment_status`] and [`paid_status`].

use crate::types::{ActorRole, EngineError, Status, TransactableId, TransactableKind};

/// Statuses the given actor may move the entity to from `status`
///
/// Terminal statuses return the empty set for every actor. Bookings and
/// rentals share one table; orders differ in that approval comes from
/// payment rather than from the seller.
pub fn allowed_transitions(
    kind: TransactableKind,
    status: Status,
    role: ActorRole,
) -> &'static [Status] {
    use ActorRole::{Counterparty, Owner};
    use Status::{Active, Approved, Cancelled, Completed, Pending};
    use TransactableKind::Order;

    match (kind, status, role) {
        // Terminal states admit nothing, for any kind and any actor.
        (_, Completed | Cancelled, _) => &[],

        // Orders: the seller cannot approve; payment confirms the order.
        (Order, Pending, _) => &[Cancelled],
        (Order, Approved, Owner) => &[Active, Cancelled],
        (Order, Approved, Counterparty) => &[Cancelled],

        // Bookings and rentals: the owner drives approval and activation.
        (_, Pending, Owner) => &[Approved, Cancelled],
        (_, Pending, Counterparty) => &[Cancelled],
        (_, Approved, Owner) => &[Active, Cancelled],
        (_, Approved, Counterparty) => &[Cancelled],

        // Either party may close out or cancel a running engagement.
        (_, Active, _) => &[Completed, Cancelled],
    }
}

/// Check that `requested` is reachable from `current` for this actor
///
/// Fails with an error naming both the current and the requested status.
/// A request with no status change is not routed through here; note-only
/// updates bypass the validator entirely.
pub fn validate(
    kind: TransactableKind,
    id: TransactableId,
    current: Status,
    role: ActorRole,
    requested: Status,
) -> Result<(), EngineError> {
    if allowed_transitions(kind, current, role).contains(&requested) {
        Ok(())
    } else {
        Err(EngineError::invalid_transition(
            id,
            current.label(kind),
            requested.label(kind),
        ))
    }
}

/// The status a transactable must hold for payment initiation
pub fn payment_status(kind: TransactableKind) -> Status {
    match kind {
        TransactableKind::Booking | TransactableKind::Rental => Status::Approved,
        TransactableKind::Order => Status::Pending,
    }
}

/// The status a transactable advances to when its payment is confirmed
pub fn paid_status(kind: TransactableKind) -> Status {
    match kind {
        TransactableKind::Booking | TransactableKind::Rental => Status::Active,
        TransactableKind::Order => Status::Approved,
    }
}
