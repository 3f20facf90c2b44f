//! Payment-related types
//!
//! A `PaymentRecord` tracks the one external payment a transactable may
//! carry: the intent reference handed back by the provider, the platform
//! fee split, and the record's own status lifecycle
//! (`Pending -> {Succeeded, Failed, Cancelled}`, `Succeeded -> Refunded`).

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::transactable::TransactableId;

/// Opaque reference to the payment object at the external provider
pub type ExternalRef = String;

/// Status of a payment record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Intent created, awaiting asynchronous confirmation
    Pending,
    /// Confirmed by the provider webhook
    Succeeded,
    /// Rejected by the provider; may be superseded by a fresh initiation
    Failed,
    /// Abandoned at the provider; may be superseded by a fresh initiation
    Cancelled,
    /// Terminal: money returned (fully or per the refund tiers)
    Refunded,
}

impl PaymentStatus {
    pub fn label(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

/// Split of a gross amount into platform fee and owner earnings
///
/// The fee is a fixed percentage of the gross, rounded half-up to whole
/// minor units; the earnings are the exact remainder so the split always
/// sums back to the gross.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeSplit {
    /// Gross amount in minor units
    pub gross: Decimal,
    /// Platform's cut in minor units
    pub platform_fee: Decimal,
    /// Owner/seller earnings in minor units
    pub owner_earnings: Decimal,
}

impl FeeSplit {
    /// Compute the split for a gross amount at the given fee percentage
    pub fn compute(gross: Decimal, fee_percent: Decimal) -> Self {
        let platform_fee = (gross * fee_percent / Decimal::from(100))
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        FeeSplit {
            gross,
            platform_fee,
            owner_earnings: gross - platform_fee,
        }
    }
}

/// The payment intent handed back to the paying party
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntent {
    /// Secret the client uses to complete the payment out of band
    pub client_secret: String,
    /// Provider-side reference, later echoed by webhooks
    pub external_ref: ExternalRef,
}

/// Local record of the one payment attached to a transactable
///
/// At most one record exists per transactable (the store keys records by
/// transactable id). A record claimed for initiation starts without an
/// external reference; the reference is filled in once the provider call
/// succeeds.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRecord {
    pub transactable: TransactableId,
    pub external_ref: Option<ExternalRef>,
    pub client_secret: Option<String>,
    pub status: PaymentStatus,
    pub split: FeeSplit,
    /// Refund reference, percentage, and amount once refunded
    pub metadata: serde_json::Value,
    /// Guards the external refund call against concurrent double-submission
    pub refund_in_flight: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentRecord {
    /// Fresh claim for a transactable, before the provider call
    pub fn claimed(transactable: TransactableId, gross: Decimal, now: DateTime<Utc>) -> Self {
        PaymentRecord {
            transactable,
            external_ref: None,
            client_secret: None,
            status: PaymentStatus::Pending,
            split: FeeSplit {
                gross,
                platform_fee: Decimal::ZERO,
                owner_earnings: Decimal::ZERO,
            },
            metadata: serde_json::Value::Null,
            refund_in_flight: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Refund percentage recorded in metadata, if this record was refunded
    pub fn refund_percentage(&self) -> Option<u64> {
        self.metadata.get("refund_percentage").and_then(|v| v.as_u64())
    }
}
