//! Payment configuration

use serde::Deserialize;

use super::error::ValidationError;

fn default_timeout_secs() -> u64 {
    30
}

/// Payment gateway configuration (Stripe)
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// Gateway secret API key
    pub stripe_api_key: String,

    /// Gateway webhook signing secret
    pub stripe_webhook_secret: String,

    /// Bound on every gateway call; a confirmation that exceeds it
    /// leaves its purchase pending for the reconciler
    #[serde(default = "default_timeout_secs")]
    pub gateway_timeout_secs: u64,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            stripe_api_key: String::new(),
            stripe_webhook_secret: String::new(),
            gateway_timeout_secs: default_timeout_secs(),
        }
    }
}

impl PaymentConfig {
    /// Check if using gateway test mode
    pub fn is_test_mode(&self) -> bool {
        self.stripe_api_key.starts_with("sk_test_")
    }

    /// Check if using gateway live mode
    pub fn is_live_mode(&self) -> bool {
        self.stripe_api_key.starts_with("sk_live_")
    }

    /// Validate payment configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.stripe_api_key.is_empty() {
            return Err(ValidationError::MissingRequired("STRIPE_API_KEY"));
        }
        if self.stripe_webhook_secret.is_empty() {
            return Err(ValidationError::MissingRequired("STRIPE_WEBHOOK_SECRET"));
        }

        // Verify key prefixes for safety
        if !self.stripe_api_key.starts_with("sk_") {
            return Err(ValidationError::InvalidGatewayKey);
        }
        if !self.stripe_webhook_secret.starts_with("whsec_") {
            return Err(ValidationError::InvalidGatewayWebhookSecret);
        }

        if self.gateway_timeout_secs == 0 || self.gateway_timeout_secs > 120 {
            return Err(ValidationError::InvalidTimeout);
        }

        Ok(())
    }
}
