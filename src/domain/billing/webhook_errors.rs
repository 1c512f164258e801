//! Webhook error types for gateway webhook handling.
//!
//! Defines all error conditions that can occur during webhook processing,
//! with HTTP status code mapping and retryability semantics.

use axum::http::StatusCode;
use thiserror::Error;

/// Errors that occur during webhook processing.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Webhook signature verification failed.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Webhook timestamp is outside the acceptable window (5 minutes).
    #[error("Timestamp out of range")]
    TimestampOutOfRange,

    /// Event timestamp is in the future beyond clock skew tolerance.
    #[error("Invalid timestamp")]
    InvalidTimestamp,

    /// Failed to parse webhook payload or signature header.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Required metadata field missing from webhook event.
    #[error("Missing metadata: {0}")]
    MissingMetadata(&'static str),

    /// Required field missing from webhook payload.
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// No purchase matches the event's external reference.
    #[error("Purchase not found")]
    PurchaseNotFound,

    /// No grant matches the event's external reference.
    #[error("Grant not found")]
    GrantNotFound,

    /// Attempted state transition is not valid.
    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),

    /// Event was intentionally ignored (not an error condition).
    #[error("Event ignored: {0}")]
    Ignored(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(String),
}

impl WebhookError {
    /// Returns true if the gateway should retry delivering this webhook.
    ///
    /// Retryable errors indicate temporary failures that may succeed
    /// on subsequent attempts (database issues, eventual consistency
    /// between the synchronous checkout write and this delivery).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WebhookError::Database(_)
                | WebhookError::PurchaseNotFound
                | WebhookError::GrantNotFound
        )
    }

    /// Maps the error to an appropriate HTTP status code.
    ///
    /// Status codes determine the gateway's retry behavior:
    /// - 2xx: Event acknowledged, no retry
    /// - 4xx: Client error, no retry
    /// - 5xx: Server error, will retry
    pub fn status_code(&self) -> StatusCode {
        match self {
            // Auth failures - don't retry
            WebhookError::InvalidSignature | WebhookError::TimestampOutOfRange => {
                StatusCode::UNAUTHORIZED
            }

            // Invalid timestamp (future) - don't retry
            WebhookError::InvalidTimestamp => StatusCode::BAD_REQUEST,

            // Bad request - don't retry
            WebhookError::ParseError(_)
            | WebhookError::MissingMetadata(_)
            | WebhookError::MissingField(_) => StatusCode::BAD_REQUEST,

            // Ignored events are acknowledged as success
            WebhookError::Ignored(_) => StatusCode::OK,

            // Server errors - will retry
            WebhookError::PurchaseNotFound
            | WebhookError::GrantNotFound
            | WebhookError::InvalidTransition(_)
            | WebhookError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_signature_displays_correctly() {
        let err = WebhookError::InvalidSignature;
        assert_eq!(format!("{}", err), "Invalid signature");
    }

    #[test]
    fn signature_failures_map_to_unauthorized() {
        assert_eq!(
            WebhookError::InvalidSignature.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            WebhookError::TimestampOutOfRange.status_code(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn parse_failures_map_to_bad_request() {
        assert_eq!(
            WebhookError::ParseError("bad json".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            WebhookError::MissingMetadata("access_pass_id").status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn ignored_events_acknowledge_with_ok() {
        assert_eq!(
            WebhookError::Ignored("no handler".to_string()).status_code(),
            StatusCode::OK
        );
    }

    #[test]
    fn transient_failures_are_retryable() {
        assert!(WebhookError::Database("down".to_string()).is_retryable());
        assert!(WebhookError::PurchaseNotFound.is_retryable());

        assert!(!WebhookError::InvalidSignature.is_retryable());
        assert!(!WebhookError::ParseError("x".to_string()).is_retryable());
    }

    #[test]
    fn transient_failures_map_to_server_error() {
        assert_eq!(
            WebhookError::Database("down".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            WebhookError::PurchaseNotFound.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
