//! Stripe wire format types.
//!
//! Deserialization targets for Stripe API responses. Only fields relevant
//! to our processing are captured; Stripe's full schemas are much larger.

use serde::Deserialize;
use std::collections::HashMap;

/// Stripe customer object.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeCustomer {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub deleted: bool,
}

/// Stripe payment intent object.
#[derive(Debug, Clone, Deserialize)]
pub struct StripePaymentIntent {
    pub id: String,
    pub status: String,
    pub amount: i64,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Stripe subscription object.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscription {
    pub id: String,
    pub customer: String,
    pub status: String,
    #[serde(default)]
    pub current_period_start: i64,
    #[serde(default)]
    pub current_period_end: i64,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    #[serde(default)]
    pub canceled_at: Option<i64>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Stripe setup intent object.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeSetupIntent {
    pub id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
}

/// Stripe product object.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeProduct {
    pub id: String,
    pub name: String,
}

/// Stripe price object.
#[derive(Debug, Clone, Deserialize)]
pub struct StripePrice {
    pub id: String,
    pub product: String,
    #[serde(default)]
    pub unit_amount: Option<i64>,
}

/// Stripe error envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorResponse {
    pub error: StripeApiError,
}

/// Stripe error body.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeApiError {
    #[serde(rename = "type")]
    #[serde(default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub decline_code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
