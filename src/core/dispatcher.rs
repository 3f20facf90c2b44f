//! Side-effect dispatch after committed transitions
//!
//! Everything here runs after the core status change has committed and is
//! independently best-effort: a failed inventory restore or notification
//! is logged and never rolls the transition back. Notifications always go
//! to the party who did not initiate the action.

use std::sync::Arc;

use tracing::error;

use crate::types::{
    Notification, NotificationKind, PartyId, Status, Transactable,
};

use super::stores::{ListingStore, NotificationSink};

/// Hook invoked when a transactable completes
///
/// Downstream reward logic (points, badges) hangs off this seam; the
/// engine only guarantees the hook fires once per completion.
pub trait RewardHook: Send + Sync {
    fn on_completed(&self, transactable: &Transactable);
}

/// Default hook: no reward processing
#[derive(Debug, Default)]
pub struct NoopRewards;

impl RewardHook for NoopRewards {
    fn on_completed(&self, _transactable: &Transactable) {}
}

/// Runs notifications, inventory restoration, and the reward hook
pub struct SideEffectDispatcher {
    listings: Arc<ListingStore>,
    notifications: Arc<NotificationSink>,
    rewards: Arc<dyn RewardHook>,
}

impl SideEffectDispatcher {
    pub fn new(
        listings: Arc<ListingStore>,
        notifications: Arc<NotificationSink>,
        rewards: Arc<dyn RewardHook>,
    ) -> Self {
        SideEffectDispatcher {
            listings,
            notifications,
            rewards,
        }
    }

    fn notify(&self, recipient: PartyId, kind: NotificationKind, transactable: &Transactable) {
        let entity = transactable.kind.label();
        let (title, body) = match kind {
            NotificationKind::Requested => (
                format!("New {} request", entity),
                format!(
                    "A new {} was requested against your listing {}",
                    entity, transactable.listing
                ),
            ),
            NotificationKind::Approved => (
                format!("{} confirmed", capitalize(entity)),
                format!("Your {} {} was confirmed", entity, transactable.id),
            ),
            NotificationKind::Active => (
                format!("{} underway", capitalize(entity)),
                format!(
                    "{} {} is now {}",
                    capitalize(entity),
                    transactable.id,
                    Status::Active.label(transactable.kind)
                ),
            ),
            NotificationKind::PaymentReceived => (
                "Payment received".to_string(),
                format!(
                    "Payment of {} received for {} {}",
                    transactable.amount, entity, transactable.id
                ),
            ),
            NotificationKind::Cancelled => (
                format!("{} cancelled", capitalize(entity)),
                format!("{} {} was cancelled", capitalize(entity), transactable.id),
            ),
        };
        self.notifications.push(Notification {
            recipient,
            kind,
            title,
            body,
            link: format!(
                "/{}/{}",
                transactable.kind.link_segment(),
                transactable.id
            ),
        });
    }

    /// Effects of a freshly created transactable: tell the owner
    pub fn after_created(&self, transactable: &Transactable) {
        self.notify(transactable.owner, NotificationKind::Requested, transactable);
    }

    /// Effects of a committed actor-driven transition
    ///
    /// `restore_inventory` is true when the commit released an inventory
    /// hold (the flag was cleared atomically with the status change, so
    /// this credit happens at most once per hold).
    pub fn after_transition(
        &self,
        transactable: &Transactable,
        actor: PartyId,
        restore_inventory: bool,
    ) {
        if restore_inventory {
            let quantity = match transactable.kind {
                crate::types::TransactableKind::Order => transactable.quantity,
                _ => None,
            };
            if let Err(e) = self.listings.restore(transactable.listing, quantity) {
                error!(
                    transactable = transactable.id,
                    listing = transactable.listing,
                    error = %e,
                    "inventory restore failed"
                );
            }
        }

        let other = transactable.other_party(actor);
        match transactable.status {
            Status::Approved => self.notify(other, NotificationKind::Approved, transactable),
            Status::Active => self.notify(other, NotificationKind::Active, transactable),
            Status::Cancelled => self.notify(other, NotificationKind::Cancelled, transactable),
            Status::Completed => self.rewards.on_completed(transactable),
            Status::Pending => {}
        }
    }

    /// Effects of a webhook payment confirmation: tell the receiving party
    pub fn after_payment_confirmed(&self, transactable: &Transactable) {
        self.notify(
            transactable.owner,
            NotificationKind::PaymentReceived,
            transactable,
        );
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
