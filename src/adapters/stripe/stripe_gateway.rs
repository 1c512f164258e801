//! Stripe payment gateway adapter.
//!
//! Implements the `PaymentGateway` port against the Stripe HTTP API.
//! Injects defaults (currency "usd", automatic payment-method discovery)
//! and otherwise forwards parameters unchanged - no business rules live
//! here.
//!
//! # Security
//!
//! - Secrets handled via `secrecy::SecretString`
//! - Credentials arrive through an explicit `StripeConfig` at
//!   construction, never read from the environment inside the adapter
//!
//! # Timeouts
//!
//! Every call is bounded by the configured timeout. A timed-out
//! confirmation surfaces as `PaymentErrorCode::Timeout`, which the
//! orchestrator treats as indeterminate (purchase stays pending).

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

use crate::ports::{
    CreateCustomerRequest, CreatePaymentIntentRequest, CreatePriceRequest,
    CreateSubscriptionRequest, Customer, GatewayPrice, GatewayProduct, GatewaySubscription,
    PaymentError, PaymentErrorCode, PaymentGateway, PaymentIntent, PaymentIntentStatus,
    SetupIntent, SubscriptionStatus,
};

use super::wire_types::{
    StripeCustomer, StripeErrorResponse, StripePaymentIntent, StripePrice, StripeProduct,
    StripeSetupIntent, StripeSubscription,
};

/// Default request timeout for gateway calls.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Stripe secret API key (sk_live_... or sk_test_...).
    api_key: SecretString,

    /// Webhook signing secret (whsec_...).
    webhook_secret: SecretString,

    /// Base URL for the Stripe API (default: https://api.stripe.com).
    api_base_url: String,

    /// Default currency injected into charges and prices.
    currency: String,

    /// Request timeout.
    timeout: Duration,
}

impl StripeConfig {
    /// Create a new Stripe configuration.
    pub fn new(api_key: impl Into<String>, webhook_secret: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            webhook_secret: SecretString::new(webhook_secret.into()),
            api_base_url: "https://api.stripe.com".to_string(),
            currency: "usd".to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The webhook signing secret, for the webhook verifier.
    pub fn webhook_secret(&self) -> &str {
        self.webhook_secret.expose_secret()
    }
}

/// Stripe implementation of the `PaymentGateway` port.
pub struct StripeGateway {
    config: StripeConfig,
    http_client: reqwest::Client,
}

impl StripeGateway {
    /// Create a new Stripe gateway with the given configuration.
    pub fn new(config: StripeConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_default();
        Self {
            config,
            http_client,
        }
    }

    /// POST a form-encoded request and deserialize the response.
    async fn post_form<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(String, String)],
        idempotency_key: Option<&str>,
    ) -> Result<T, PaymentError> {
        let url = format!("{}{}", self.config.api_base_url, path);

        let mut request = self
            .http_client
            .post(&url)
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .form(params);

        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }

        let response = request.send().await.map_err(map_transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, path, error = %body, "Stripe API call failed");
            return Err(map_api_error(&body));
        }

        response.json().await.map_err(|e| {
            PaymentError::new(
                PaymentErrorCode::ProviderError,
                format!("Failed to parse Stripe response: {}", e),
            )
        })
    }
}

/// Map reqwest transport failures onto payment error codes.
fn map_transport_error(e: reqwest::Error) -> PaymentError {
    if e.is_timeout() {
        PaymentError::timeout(format!("Stripe request timed out: {}", e))
    } else {
        PaymentError::network(e.to_string())
    }
}

/// Map a Stripe error body onto payment error codes.
fn map_api_error(body: &str) -> PaymentError {
    let parsed: Option<StripeErrorResponse> = serde_json::from_str(body).ok();
    let Some(parsed) = parsed else {
        return PaymentError::new(
            PaymentErrorCode::ProviderError,
            format!("Stripe API error: {}", body),
        );
    };

    let api_error = parsed.error;
    let message = api_error
        .message
        .unwrap_or_else(|| "Stripe API error".to_string());

    let code = match (api_error.error_type.as_deref(), api_error.code.as_deref()) {
        (Some("card_error"), Some("expired_card")) => PaymentErrorCode::CardExpired,
        (Some("card_error"), Some("incorrect_number" | "invalid_number")) => {
            PaymentErrorCode::InvalidCard
        }
        (Some("card_error"), _) => match api_error.decline_code.as_deref() {
            Some("insufficient_funds") => PaymentErrorCode::InsufficientFunds,
            _ => PaymentErrorCode::CardDeclined,
        },
        (Some("rate_limit_error"), _) => PaymentErrorCode::RateLimitExceeded,
        (Some("authentication_error"), _) => PaymentErrorCode::AuthenticationError,
        (Some("invalid_request_error"), Some("resource_missing")) => PaymentErrorCode::NotFound,
        _ => PaymentErrorCode::ProviderError,
    };

    let mut error = PaymentError::new(code, message);
    if let Some(provider_code) = api_error.code {
        error = error.with_provider_code(provider_code);
    }
    error
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<Customer, PaymentError> {
        let mut params = vec![
            ("email".to_string(), request.email.clone()),
            (
                "metadata[user_id]".to_string(),
                request.user_id.to_string(),
            ),
        ];
        if let Some(name) = &request.name {
            params.push(("name".to_string(), name.clone()));
        }

        let customer: StripeCustomer = self
            .post_form(
                "/v1/customers",
                &params,
                request.idempotency_key.as_deref(),
            )
            .await?;

        Ok(Customer {
            id: customer.id,
            email: customer.email.unwrap_or(request.email),
            name: customer.name.or(request.name),
            created_at: customer.created,
        })
    }

    async fn create_payment_intent(
        &self,
        request: CreatePaymentIntentRequest,
    ) -> Result<PaymentIntent, PaymentError> {
        let mut params = vec![
            ("amount".to_string(), request.amount_cents.to_string()),
            ("currency".to_string(), self.config.currency.clone()),
            ("customer".to_string(), request.customer_id.clone()),
            (
                "automatic_payment_methods[enabled]".to_string(),
                "true".to_string(),
            ),
        ];
        params.extend(request.metadata.to_params());
        if let Some(payment_method) = &request.payment_method {
            params.push(("payment_method".to_string(), payment_method.clone()));
        }

        let intent: StripePaymentIntent = self
            .post_form(
                "/v1/payment_intents",
                &params,
                request.idempotency_key.as_deref(),
            )
            .await?;

        Ok(PaymentIntent {
            id: intent.id,
            status: PaymentIntentStatus::from_wire(&intent.status),
            amount_cents: intent.amount,
            client_secret: intent.client_secret,
        })
    }

    async fn confirm_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<PaymentIntent, PaymentError> {
        let intent: StripePaymentIntent = self
            .post_form(
                &format!("/v1/payment_intents/{}/confirm", payment_intent_id),
                &[],
                None,
            )
            .await?;

        Ok(PaymentIntent {
            id: intent.id,
            status: PaymentIntentStatus::from_wire(&intent.status),
            amount_cents: intent.amount,
            client_secret: intent.client_secret,
        })
    }

    async fn create_subscription(
        &self,
        request: CreateSubscriptionRequest,
    ) -> Result<GatewaySubscription, PaymentError> {
        let mut params = vec![
            ("customer".to_string(), request.customer_id.clone()),
            ("items[0][price]".to_string(), request.price_id.clone()),
            (
                "payment_behavior".to_string(),
                "default_incomplete".to_string(),
            ),
        ];
        params.extend(request.metadata.to_params());
        if let Some(payment_method) = &request.payment_method {
            params.push(("default_payment_method".to_string(), payment_method.clone()));
        }

        let subscription: StripeSubscription = self
            .post_form(
                "/v1/subscriptions",
                &params,
                request.idempotency_key.as_deref(),
            )
            .await?;

        Ok(map_subscription(subscription))
    }

    async fn cancel_subscription(
        &self,
        subscription_id: &str,
        at_period_end: bool,
    ) -> Result<GatewaySubscription, PaymentError> {
        let subscription: StripeSubscription = if at_period_end {
            self.post_form(
                &format!("/v1/subscriptions/{}", subscription_id),
                &[("cancel_at_period_end".to_string(), "true".to_string())],
                None,
            )
            .await?
        } else {
            // DELETE /v1/subscriptions/:id cancels immediately.
            let url = format!(
                "{}/v1/subscriptions/{}",
                self.config.api_base_url, subscription_id
            );
            let response = self
                .http_client
                .delete(&url)
                .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
                .send()
                .await
                .map_err(map_transport_error)?;

            if !response.status().is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(map_api_error(&body));
            }

            response.json().await.map_err(|e| {
                PaymentError::new(
                    PaymentErrorCode::ProviderError,
                    format!("Failed to parse Stripe response: {}", e),
                )
            })?
        };

        Ok(map_subscription(subscription))
    }

    async fn create_setup_intent(&self, customer_id: &str) -> Result<SetupIntent, PaymentError> {
        let params = vec![
            ("customer".to_string(), customer_id.to_string()),
            (
                "automatic_payment_methods[enabled]".to_string(),
                "true".to_string(),
            ),
        ];

        let setup_intent: StripeSetupIntent =
            self.post_form("/v1/setup_intents", &params, None).await?;

        Ok(SetupIntent {
            id: setup_intent.id,
            client_secret: setup_intent.client_secret,
        })
    }

    async fn attach_payment_method(
        &self,
        payment_method_id: &str,
        customer_id: &str,
    ) -> Result<(), PaymentError> {
        let _: serde_json::Value = self
            .post_form(
                &format!("/v1/payment_methods/{}/attach", payment_method_id),
                &[("customer".to_string(), customer_id.to_string())],
                None,
            )
            .await?;
        Ok(())
    }

    async fn create_product(&self, name: &str) -> Result<GatewayProduct, PaymentError> {
        let product: StripeProduct = self
            .post_form(
                "/v1/products",
                &[("name".to_string(), name.to_string())],
                None,
            )
            .await?;

        Ok(GatewayProduct {
            id: product.id,
            name: product.name,
        })
    }

    async fn create_price(
        &self,
        request: CreatePriceRequest,
    ) -> Result<GatewayPrice, PaymentError> {
        let params = vec![
            ("product".to_string(), request.product_id.clone()),
            ("unit_amount".to_string(), request.amount_cents.to_string()),
            ("currency".to_string(), self.config.currency.clone()),
            (
                "recurring[interval]".to_string(),
                request.interval.clone(),
            ),
        ];

        let price: StripePrice = self.post_form("/v1/prices", &params, None).await?;

        Ok(GatewayPrice {
            id: price.id,
            product_id: price.product,
            amount_cents: price.unit_amount.unwrap_or(request.amount_cents),
        })
    }
}

fn map_subscription(subscription: StripeSubscription) -> GatewaySubscription {
    GatewaySubscription {
        id: subscription.id,
        customer_id: subscription.customer,
        status: SubscriptionStatus::from_wire(&subscription.status),
        current_period_start: subscription.current_period_start,
        current_period_end: subscription.current_period_end,
        cancel_at_period_end: subscription.cancel_at_period_end,
        canceled_at: subscription.canceled_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn card_error_maps_to_declined_with_message() {
        let body = serde_json::json!({
            "error": {
                "type": "card_error",
                "code": "card_declined",
                "message": "Your card was declined."
            }
        })
        .to_string();

        let error = map_api_error(&body);
        assert_eq!(error.code, PaymentErrorCode::CardDeclined);
        assert_eq!(error.message, "Your card was declined.");
        assert!(error.is_definitive_decline());
    }

    #[test]
    fn insufficient_funds_decline_code_is_mapped() {
        let body = serde_json::json!({
            "error": {
                "type": "card_error",
                "code": "card_declined",
                "decline_code": "insufficient_funds",
                "message": "Your card has insufficient funds."
            }
        })
        .to_string();

        let error = map_api_error(&body);
        assert_eq!(error.code, PaymentErrorCode::InsufficientFunds);
    }

    #[test]
    fn expired_card_is_mapped() {
        let body = serde_json::json!({
            "error": {
                "type": "card_error",
                "code": "expired_card",
                "message": "Your card has expired."
            }
        })
        .to_string();

        let error = map_api_error(&body);
        assert_eq!(error.code, PaymentErrorCode::CardExpired);
    }

    #[test]
    fn rate_limit_is_retryable() {
        let body = serde_json::json!({
            "error": {
                "type": "rate_limit_error",
                "message": "Too many requests."
            }
        })
        .to_string();

        let error = map_api_error(&body);
        assert_eq!(error.code, PaymentErrorCode::RateLimitExceeded);
        assert!(error.retryable);
    }

    #[test]
    fn unparseable_body_is_provider_error() {
        let error = map_api_error("<html>bad gateway</html>");
        assert_eq!(error.code, PaymentErrorCode::ProviderError);
    }

    #[test]
    fn config_defaults_to_usd_and_stripe_api() {
        let config = StripeConfig::new("sk_test_123", "whsec_123");
        assert_eq!(config.currency, "usd");
        assert_eq!(config.api_base_url, "https://api.stripe.com");
        assert_eq!(config.webhook_secret(), "whsec_123");
    }
}
