//! Payment gateway port for external payment processing.
//!
//! Defines the contract for payment gateway integrations (e.g., Stripe).
//! One method per gateway primitive; implementations inject sane defaults
//! (currency, automatic payment-method discovery) and otherwise forward
//! parameters unchanged.
//!
//! # Design
//!
//! - **No business rules**: deciding what to do with a payment outcome is
//!   the orchestrator's job, never the adapter's
//! - **Swappable**: the only place gateway credentials are configured, so
//!   a test double can stand in everywhere
//! - **Idempotent**: operations accept idempotency keys and can be safely
//!   retried

use crate::domain::foundation::{AccessPassId, TeamId, UserId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Port for payment gateway integrations.
///
/// Handles customer management, one-time payment intents, subscription
/// lifecycle, and catalog primitives (products/prices).
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a customer in the payment system.
    ///
    /// Returns the gateway's customer ID for future reference.
    async fn create_customer(&self, request: CreateCustomerRequest)
        -> Result<Customer, PaymentError>;

    /// Create a payment intent for a one-time charge.
    async fn create_payment_intent(
        &self,
        request: CreatePaymentIntentRequest,
    ) -> Result<PaymentIntent, PaymentError>;

    /// Confirm a payment intent synchronously.
    async fn confirm_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<PaymentIntent, PaymentError>;

    /// Create a subscription for a customer against an existing price.
    async fn create_subscription(
        &self,
        request: CreateSubscriptionRequest,
    ) -> Result<GatewaySubscription, PaymentError>;

    /// Cancel a subscription.
    ///
    /// If `at_period_end` is true, the subscription remains active until
    /// the current period ends.
    async fn cancel_subscription(
        &self,
        subscription_id: &str,
        at_period_end: bool,
    ) -> Result<GatewaySubscription, PaymentError>;

    /// Create a setup intent for collecting a payment method off-session.
    async fn create_setup_intent(&self, customer_id: &str) -> Result<SetupIntent, PaymentError>;

    /// Attach a payment method to a customer.
    async fn attach_payment_method(
        &self,
        payment_method_id: &str,
        customer_id: &str,
    ) -> Result<(), PaymentError>;

    /// Create a product in the gateway catalog.
    async fn create_product(&self, name: &str) -> Result<GatewayProduct, PaymentError>;

    /// Create a recurring price for a product.
    async fn create_price(&self, request: CreatePriceRequest)
        -> Result<GatewayPrice, PaymentError>;
}

/// Metadata attached to every gateway object created for a purchase.
///
/// Lets webhook events be traced back to the pass, user, and team that
/// triggered them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseMetadata {
    pub access_pass_id: AccessPassId,
    pub user_id: UserId,
    pub team_id: TeamId,
}

impl PurchaseMetadata {
    /// Renders the metadata as gateway form parameters.
    pub fn to_params(&self) -> Vec<(String, String)> {
        vec![
            (
                "metadata[access_pass_id]".to_string(),
                self.access_pass_id.to_string(),
            ),
            ("metadata[user_id]".to_string(), self.user_id.to_string()),
            ("metadata[team_id]".to_string(), self.team_id.to_string()),
        ]
    }

    /// Parses metadata out of a gateway object's metadata map.
    pub fn from_map(map: &HashMap<String, String>) -> Option<Self> {
        let access_pass_id = map.get("access_pass_id")?.parse().ok()?;
        let user_id = UserId::new(map.get("user_id")?.clone()).ok()?;
        let team_id = map.get("team_id")?.parse().ok()?;
        Some(Self {
            access_pass_id,
            user_id,
            team_id,
        })
    }
}

/// Request to create a customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCustomerRequest {
    /// Internal user ID (stored as metadata).
    pub user_id: UserId,

    /// Customer email address.
    pub email: String,

    /// Customer name (optional).
    pub name: Option<String>,

    /// Idempotency key for safe retries.
    pub idempotency_key: Option<String>,
}

/// Customer in the payment system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    /// Gateway's customer ID.
    pub id: String,

    /// Customer email.
    pub email: String,

    /// Customer name.
    pub name: Option<String>,

    /// When the customer was created (gateway timestamp).
    pub created_at: i64,
}

/// Request to create a payment intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePaymentIntentRequest {
    /// Gateway's customer ID.
    pub customer_id: String,

    /// Amount to charge, in cents.
    pub amount_cents: i64,

    /// Payment method to charge, if already collected.
    pub payment_method: Option<String>,

    /// Purchase traceability metadata.
    pub metadata: PurchaseMetadata,

    /// Idempotency key for safe retries.
    pub idempotency_key: Option<String>,
}

/// Payment intent in the payment system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    /// Gateway's payment intent ID.
    pub id: String,

    /// Current intent status.
    pub status: PaymentIntentStatus,

    /// Amount in cents.
    pub amount_cents: i64,

    /// Client secret for front-end confirmation flows.
    pub client_secret: Option<String>,
}

/// Payment intent status from the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentIntentStatus {
    /// No usable payment method; the charge did not happen.
    RequiresPaymentMethod,

    /// Awaiting explicit confirmation.
    RequiresConfirmation,

    /// Additional authentication required (e.g. 3DS).
    RequiresAction,

    /// Charge in flight.
    Processing,

    /// Charge settled successfully.
    Succeeded,

    /// Intent cancelled.
    Canceled,

    /// Unknown status from gateway.
    Unknown,
}

impl PaymentIntentStatus {
    /// Parse the gateway's wire string.
    pub fn from_wire(s: &str) -> Self {
        match s {
            "requires_payment_method" => Self::RequiresPaymentMethod,
            "requires_confirmation" => Self::RequiresConfirmation,
            "requires_action" => Self::RequiresAction,
            "processing" => Self::Processing,
            "succeeded" => Self::Succeeded,
            "canceled" => Self::Canceled,
            _ => Self::Unknown,
        }
    }
}

/// Request to create a subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSubscriptionRequest {
    /// Gateway's customer ID.
    pub customer_id: String,

    /// The pass's stored recurring price id.
    pub price_id: String,

    /// Payment method to charge, if already collected.
    pub payment_method: Option<String>,

    /// Purchase traceability metadata.
    pub metadata: PurchaseMetadata,

    /// Idempotency key for safe retries.
    pub idempotency_key: Option<String>,
}

/// Subscription in the payment system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySubscription {
    /// Gateway's subscription ID.
    pub id: String,

    /// Gateway's customer ID.
    pub customer_id: String,

    /// Current subscription status.
    pub status: SubscriptionStatus,

    /// Current billing period start (Unix timestamp).
    pub current_period_start: i64,

    /// Current billing period end (Unix timestamp).
    pub current_period_end: i64,

    /// Whether subscription cancels at period end.
    pub cancel_at_period_end: bool,

    /// When cancellation was requested (if applicable).
    pub canceled_at: Option<i64>,
}

/// Subscription status from the payment gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Subscription is active and current.
    Active,

    /// Payment is past due, grace period active.
    PastDue,

    /// Subscription is canceled.
    Canceled,

    /// Initial payment incomplete (e.g. requires authentication).
    Incomplete,

    /// Initial payment failed after retries exhausted.
    IncompleteExpired,

    /// Subscription is in trial period.
    Trialing,

    /// Unknown status from gateway.
    Unknown,
}

impl SubscriptionStatus {
    /// Parse the gateway's wire string.
    pub fn from_wire(s: &str) -> Self {
        match s {
            "active" => Self::Active,
            "past_due" => Self::PastDue,
            "canceled" => Self::Canceled,
            "incomplete" => Self::Incomplete,
            "incomplete_expired" | "unpaid" => Self::IncompleteExpired,
            "trialing" => Self::Trialing,
            _ => Self::Unknown,
        }
    }
}

/// Setup intent for off-session payment method collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupIntent {
    /// Gateway's setup intent ID.
    pub id: String,

    /// Client secret for front-end collection flows.
    pub client_secret: Option<String>,
}

/// Product in the gateway catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayProduct {
    /// Gateway's product ID.
    pub id: String,

    /// Product name.
    pub name: String,
}

/// Request to create a recurring price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePriceRequest {
    /// Gateway's product ID.
    pub product_id: String,

    /// Amount in cents.
    pub amount_cents: i64,

    /// Billing interval: "month" or "year".
    pub interval: String,
}

/// Price in the gateway catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayPrice {
    /// Gateway's price ID.
    pub id: String,

    /// Gateway's product ID.
    pub product_id: String,

    /// Amount in cents.
    pub amount_cents: i64,
}

/// Errors from payment gateway operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentError {
    /// Error code for categorization.
    pub code: PaymentErrorCode,

    /// Human-readable message.
    pub message: String,

    /// Gateway's error code (if available).
    pub provider_code: Option<String>,

    /// Whether the operation can be retried.
    pub retryable: bool,
}

impl PaymentError {
    /// Create a new payment error.
    pub fn new(code: PaymentErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider_code: None,
            retryable: code.is_retryable(),
        }
    }

    /// Create with gateway error code.
    pub fn with_provider_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::NetworkError, message)
    }

    /// Create a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::Timeout, message)
    }

    /// Create a card declined error.
    pub fn card_declined(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::CardDeclined, message)
    }

    /// Create a not found error.
    pub fn not_found(resource: &str) -> Self {
        Self::new(
            PaymentErrorCode::NotFound,
            format!("{} not found", resource),
        )
    }

    /// Whether the outcome of the attempted charge is unknown.
    ///
    /// A timed-out or dropped confirmation may still have settled on the
    /// gateway side. The orchestrator must leave the purchase pending in
    /// that case so the webhook reconciler can resolve it, rather than
    /// telling the user "failed" while a charge actually succeeded.
    pub fn is_indeterminate(&self) -> bool {
        matches!(
            self.code,
            PaymentErrorCode::Timeout | PaymentErrorCode::NetworkError
        )
    }

    /// Whether the charge definitively did not happen.
    pub fn is_definitive_decline(&self) -> bool {
        matches!(
            self.code,
            PaymentErrorCode::CardDeclined
                | PaymentErrorCode::InsufficientFunds
                | PaymentErrorCode::CardExpired
                | PaymentErrorCode::InvalidCard
        )
    }
}

impl std::fmt::Display for PaymentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for PaymentError {}

/// Payment error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentErrorCode {
    /// Network connectivity issue.
    NetworkError,

    /// Gateway call exceeded the configured timeout.
    Timeout,

    /// API authentication failed.
    AuthenticationError,

    /// Card was declined.
    CardDeclined,

    /// Insufficient funds.
    InsufficientFunds,

    /// Card expired.
    CardExpired,

    /// Invalid card details.
    InvalidCard,

    /// Resource not found.
    NotFound,

    /// Rate limit exceeded.
    RateLimitExceeded,

    /// Gateway API error.
    ProviderError,

    /// Unknown error.
    Unknown,
}

impl PaymentErrorCode {
    /// Check if this error type is typically retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PaymentErrorCode::NetworkError
                | PaymentErrorCode::Timeout
                | PaymentErrorCode::RateLimitExceeded
        )
    }
}

impl std::fmt::Display for PaymentErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentErrorCode::NetworkError => "network_error",
            PaymentErrorCode::Timeout => "timeout",
            PaymentErrorCode::AuthenticationError => "authentication_error",
            PaymentErrorCode::CardDeclined => "card_declined",
            PaymentErrorCode::InsufficientFunds => "insufficient_funds",
            PaymentErrorCode::CardExpired => "card_expired",
            PaymentErrorCode::InvalidCard => "invalid_card",
            PaymentErrorCode::NotFound => "not_found",
            PaymentErrorCode::RateLimitExceeded => "rate_limit_exceeded",
            PaymentErrorCode::ProviderError => "provider_error",
            PaymentErrorCode::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}
