//! Error types for the lifecycle engine
//!
//! Every failure a request can produce is a variant here, carrying enough
//! context to name the entity and the states involved. The taxonomy maps
//! onto the HTTP codes the deployed system answers with via
//! [`EngineError::status_code`]:
//!
//! - **Validation errors** (bad input shape, invalid date range, bad
//!   quantity): 400, never retried
//! - **Authorization errors** (third party, wrong-role transition): 403
//! - **State errors** (transition not allowed, already paid, already
//!   refunded): 400, naming current vs. requested state
//! - **Unknown entities**: 404
//! - **External-dependency errors** (provider failure or timeout): 502,
//!   safe to retry since nothing local was committed

use thiserror::Error;

use super::transactable::{ListingId, PartyId, TransactableId};

/// Main error type for the lifecycle engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Scenario file not found at the specified path
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    /// I/O error while reading the scenario or writing output
    #[error("I/O error: {message}")]
    IoError { message: String },

    /// CSV parsing error in the scenario file
    ///
    /// Recoverable: the malformed row is skipped and the replay continues.
    #[error("CSV parse error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    ParseError {
        line: Option<u64>,
        message: String,
    },

    /// Input shape error (missing field, wrong field for the kind, ...)
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// End date does not fall after start date
    #[error("Invalid date range: {start} .. {end}")]
    InvalidDateRange { start: String, end: String },

    /// Quantity must be strictly positive
    #[error("Invalid quantity {quantity}: must be greater than zero")]
    InvalidQuantity { quantity: u32 },

    /// Listing id does not exist
    #[error("Listing {listing} not found")]
    ListingNotFound { listing: ListingId },

    /// Listing exists but is not available for new transactables
    #[error("Listing {listing} is not available ({status})")]
    ListingNotAvailable {
        listing: ListingId,
        /// Derived listing status label ("sold", "unavailable")
        status: String,
    },

    /// Not enough stock to satisfy the requested quantity
    #[error("Insufficient quantity on listing {listing}: requested {requested}, available {available}")]
    InsufficientStock {
        listing: ListingId,
        requested: u32,
        available: u32,
    },

    /// Transactable id does not exist
    #[error("Transactable {id} not found")]
    TransactableNotFound { id: TransactableId },

    /// Transactable id already exists
    #[error("Transactable {id} already exists")]
    DuplicateTransactable { id: TransactableId },

    /// The requesting party is neither counterparty of the entity
    #[error("Party {actor} is not a counterparty of transactable {id}")]
    Forbidden { id: TransactableId, actor: PartyId },

    /// The requested transition is not allowed from the current status
    ///
    /// Also produced when a concurrent transition won the race: validation
    /// re-runs against the state found at commit time, so a stale request
    /// is rejected rather than silently applied.
    #[error("Invalid transition for transactable {id}: {current} -> {requested}")]
    InvalidTransition {
        id: TransactableId,
        /// Current status label
        current: String,
        /// Requested status label
        requested: String,
    },

    /// The transactable's status does not permit payment initiation
    #[error("Transactable {id} does not permit payment in status {status}")]
    PaymentNotAllowed { id: TransactableId, status: String },

    /// A payment intent is already in flight for this transactable
    #[error("Payment already pending for transactable {id}")]
    PaymentAlreadyPending { id: TransactableId },

    /// A succeeded payment already exists for this transactable
    #[error("Transactable {id} is already paid")]
    AlreadyPaid { id: TransactableId },

    /// The operation requires a succeeded payment and none exists
    #[error("Transactable {id} has no succeeded payment")]
    NotPaid { id: TransactableId },

    /// The payment was already refunded
    #[error("Payment for transactable {id} is already refunded")]
    AlreadyRefunded { id: TransactableId },

    /// A refund for this payment is already being submitted
    #[error("Refund already in flight for transactable {id}")]
    RefundInFlight { id: TransactableId },

    /// Webhook signature missing or invalid; rejected before any processing
    #[error("Invalid webhook signature")]
    InvalidSignature,

    /// Webhook payload is not the expected JSON shape
    #[error("Invalid webhook payload: {message}")]
    InvalidWebhookPayload { message: String },

    /// The payment provider reported a failure
    ///
    /// Safe to retry the whole operation: no local state was committed.
    #[error("Payment provider error: {message}")]
    Provider { message: String },

    /// The payment provider did not answer within the bounded timeout
    #[error("Payment provider timed out after {timeout_ms}ms")]
    ProviderTimeout { timeout_ms: u64 },
}

impl From<std::io::Error> for EngineError {
    fn from(error: std::io::Error) -> Self {
        EngineError::IoError {
            message: error.to_string(),
        }
    }
}

impl From<csv::Error> for EngineError {
    fn from(error: csv::Error) -> Self {
        EngineError::IoError {
            message: error.to_string(),
        }
    }
}

impl From<csv_async::Error> for EngineError {
    fn from(error: csv_async::Error) -> Self {
        EngineError::ParseError {
            line: None,
            message: error.to_string(),
        }
    }
}

impl EngineError {
    /// HTTP status code the deployed system answers with for this error
    pub fn status_code(&self) -> u16 {
        match self {
            EngineError::InvalidInput { .. }
            | EngineError::InvalidDateRange { .. }
            | EngineError::InvalidQuantity { .. }
            | EngineError::ListingNotAvailable { .. }
            | EngineError::InsufficientStock { .. }
            | EngineError::DuplicateTransactable { .. }
            | EngineError::InvalidTransition { .. }
            | EngineError::PaymentNotAllowed { .. }
            | EngineError::PaymentAlreadyPending { .. }
            | EngineError::AlreadyPaid { .. }
            | EngineError::NotPaid { .. }
            | EngineError::AlreadyRefunded { .. }
            | EngineError::RefundInFlight { .. }
            | EngineError::InvalidSignature
            | EngineError::InvalidWebhookPayload { .. }
            | EngineError::ParseError { .. } => 400,
            EngineError::Forbidden { .. } => 403,
            EngineError::ListingNotFound { .. } | EngineError::TransactableNotFound { .. } => 404,
            EngineError::Provider { .. } | EngineError::ProviderTimeout { .. } => 502,
            EngineError::FileNotFound { .. } | EngineError::IoError { .. } => 500,
        }
    }

    /// Whether the caller may safely retry the whole operation
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            EngineError::Provider { .. } | EngineError::ProviderTimeout { .. }
        )
    }
}

// Helper functions for creating common errors

impl EngineError {
    /// Create an InvalidInput error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        EngineError::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an InvalidTransition error from status labels
    pub fn invalid_transition(id: TransactableId, current: &str, requested: &str) -> Self {
        EngineError::InvalidTransition {
            id,
            current: current.to_string(),
            requested: requested.to_string(),
        }
    }

    /// Create a Forbidden error
    pub fn forbidden(id: TransactableId, actor: PartyId) -> Self {
        EngineError::Forbidden { id, actor }
    }

    /// Create an InsufficientStock error
    pub fn insufficient_stock(listing: ListingId, requested: u32, available: u32) -> Self {
        EngineError::InsufficientStock {
            listing,
            requested,
            available,
        }
    }

    /// Create a ListingNotAvailable error
    pub fn listing_not_available(listing: ListingId, status: &str) -> Self {
        EngineError::ListingNotAvailable {
            listing,
            status: status.to_string(),
        }
    }

    /// Create a PaymentNotAllowed error
    pub fn payment_not_allowed(id: TransactableId, status: &str) -> Self {
        EngineError::PaymentNotAllowed {
            id,
            status: status.to_string(),
        }
    }

    /// Create a Provider error
    pub fn provider(message: impl Into<String>) -> Self {
        EngineError::Provider {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::invalid_transition(
        EngineError::invalid_transition(7, "completed", "cancelled"),
        "Invalid transition for transactable 7: completed -> cancelled"
    )]
    #[case::forbidden(
        EngineError::forbidden(7, 99),
        "Party 99 is not a counterparty of transactable 7"
    )]
    #[case::insufficient_stock(
        EngineError::insufficient_stock(3, 2, 1),
        "Insufficient quantity on listing 3: requested 2, available 1"
    )]
    #[case::already_paid(
        EngineError::AlreadyPaid { id: 4 },
        "Transactable 4 is already paid"
    )]
    #[case::already_refunded(
        EngineError::AlreadyRefunded { id: 4 },
        "Payment for transactable 4 is already refunded"
    )]
    #[case::provider_timeout(
        EngineError::ProviderTimeout { timeout_ms: 5000 },
        "Payment provider timed out after 5000ms"
    )]
    #[case::parse_error_with_line(
        EngineError::ParseError { line: Some(3), message: "bad field".to_string() },
        "CSV parse error at line 3: bad field"
    )]
    fn test_error_display(#[case] error: EngineError, #[case] expected: &str) {
        assert_eq!(error.to_string(), expected);
    }

    #[rstest]
    #[case(EngineError::invalid_transition(1, "pending", "completed"), 400)]
    #[case(EngineError::forbidden(1, 2), 403)]
    #[case(EngineError::TransactableNotFound { id: 1 }, 404)]
    #[case(EngineError::ListingNotFound { listing: 1 }, 404)]
    #[case(EngineError::provider("boom"), 502)]
    #[case(EngineError::ProviderTimeout { timeout_ms: 1 }, 502)]
    #[case(EngineError::InvalidSignature, 400)]
    fn test_status_codes(#[case] error: EngineError, #[case] code: u16) {
        assert_eq!(error.status_code(), code);
    }

    #[test]
    fn test_only_provider_errors_are_retryable() {
        assert!(EngineError::provider("down").retryable());
        assert!(EngineError::ProviderTimeout { timeout_ms: 10 }.retryable());
        assert!(!EngineError::AlreadyPaid { id: 1 }.retryable());
        assert!(!EngineError::invalid_transition(1, "pending", "active").retryable());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "Permission denied");
        let error: EngineError = io_error.into();
        assert!(matches!(error, EngineError::IoError { .. }));
        assert_eq!(error.to_string(), "I/O error: Permission denied");
    }
}
