//! Purchase and entitlement error types.
//!
//! Errors surfaced by the purchase orchestrator and entitlement queries.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | PassNotFound | 404 |
//! | PassNotPublished | 404 |
//! | SoldOut | 409 |
//! | PaymentFailed | 402 |
//! | SubscriptionIncomplete | 402 |
//! | InvalidState | 409 |
//! | ValidationFailed | 400 |
//! | Infrastructure | 500 |

use crate::domain::foundation::{AccessPassId, DomainError, ErrorCode};

/// Errors from purchase orchestration and entitlement operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurchaseError {
    /// Access pass does not exist.
    PassNotFound(AccessPassId),

    /// Access pass exists but is not purchasable.
    PassNotPublished(AccessPassId),

    /// Limited pass has no stock remaining.
    SoldOut(AccessPassId),

    /// Gateway declined or errored; surfaced verbatim where safe.
    PaymentFailed { reason: String },

    /// Subscription created but awaiting payment authentication; the
    /// webhook reconciler finishes the flow if authentication succeeds.
    SubscriptionIncomplete,

    /// Invalid state for the requested operation.
    InvalidState { current: String, attempted: String },

    /// Validation failed.
    ValidationFailed { field: String, message: String },

    /// Infrastructure error (persistence must not silently continue).
    Infrastructure(String),
}

impl PurchaseError {
    pub fn pass_not_found(id: AccessPassId) -> Self {
        PurchaseError::PassNotFound(id)
    }

    pub fn pass_not_published(id: AccessPassId) -> Self {
        PurchaseError::PassNotPublished(id)
    }

    pub fn sold_out(id: AccessPassId) -> Self {
        PurchaseError::SoldOut(id)
    }

    pub fn payment_failed(reason: impl Into<String>) -> Self {
        PurchaseError::PaymentFailed {
            reason: reason.into(),
        }
    }

    pub fn subscription_incomplete() -> Self {
        PurchaseError::SubscriptionIncomplete
    }

    pub fn invalid_state(current: impl Into<String>, attempted: impl Into<String>) -> Self {
        PurchaseError::InvalidState {
            current: current.into(),
            attempted: attempted.into(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        PurchaseError::ValidationFailed {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        PurchaseError::Infrastructure(message.into())
    }

    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            PurchaseError::PassNotFound(_) => ErrorCode::AccessPassNotFound,
            PurchaseError::PassNotPublished(_) => ErrorCode::PassNotPublished,
            PurchaseError::SoldOut(_) => ErrorCode::PassSoldOut,
            PurchaseError::PaymentFailed { .. } => ErrorCode::PaymentFailed,
            PurchaseError::SubscriptionIncomplete => ErrorCode::PaymentRequired,
            PurchaseError::InvalidState { .. } => ErrorCode::InvalidStateTransition,
            PurchaseError::ValidationFailed { .. } => ErrorCode::ValidationFailed,
            PurchaseError::Infrastructure(_) => ErrorCode::DatabaseError,
        }
    }

    /// The message shown to callers.
    ///
    /// Gateway failure text is passed through; the subscription-incomplete
    /// message matches what checkout flows display.
    pub fn user_message(&self) -> String {
        match self {
            PurchaseError::PassNotFound(_) => "Access pass not found".to_string(),
            PurchaseError::PassNotPublished(_) => "Access pass is not available".to_string(),
            PurchaseError::SoldOut(_) => "Access pass is sold out".to_string(),
            PurchaseError::PaymentFailed { reason } => reason.clone(),
            PurchaseError::SubscriptionIncomplete => {
                "Subscription requires payment method".to_string()
            }
            PurchaseError::InvalidState { current, attempted } => {
                format!("Cannot {} while {}", attempted, current)
            }
            PurchaseError::ValidationFailed { field, message } => {
                format!("{}: {}", field, message)
            }
            PurchaseError::Infrastructure(_) => "Internal error".to_string(),
        }
    }
}

impl std::fmt::Display for PurchaseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.user_message())
    }
}

impl std::error::Error for PurchaseError {}

impl From<DomainError> for PurchaseError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ValidationFailed | ErrorCode::EmptyField | ErrorCode::InvalidFormat => {
                PurchaseError::validation(
                    err.details
                        .get("field")
                        .cloned()
                        .unwrap_or_else(|| "unknown".to_string()),
                    err.message,
                )
            }
            ErrorCode::InvalidStateTransition => PurchaseError::invalid_state("settled", "settle"),
            _ => PurchaseError::Infrastructure(err.message),
        }
    }
}
