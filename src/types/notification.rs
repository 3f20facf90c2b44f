//! Notification records dispatched on lifecycle events
//!
//! Notifications are fire-and-forget: the dispatcher creates them after a
//! committed transition and a failure to deliver never propagates back to
//! the transition itself.

use super::transactable::PartyId;

/// The lifecycle event a notification reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// A new booking/rental/order was created against the recipient's listing
    Requested,
    /// The recipient's request was approved by the owner
    Approved,
    /// The entity went active/ready by an actor's request
    Active,
    /// The recipient's listing was paid for
    PaymentReceived,
    /// The other party cancelled
    Cancelled,
}

/// A notification to one party
///
/// Always addressed to the party who did NOT initiate the triggering action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub recipient: PartyId,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    /// Deep link into the application, e.g. `/bookings/42`
    pub link: String,
}
