//! Mock payment gateway for tests.
//!
//! Scriptable outcomes per primitive: what status a confirmed intent or a
//! created subscription lands in, and which calls fail with which errors.
//! Call counters let tests assert on gateway traffic (e.g. that a second
//! purchase reuses the stored customer instead of creating a new one).

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use crate::ports::{
    CreateCustomerRequest, CreatePaymentIntentRequest, CreatePriceRequest,
    CreateSubscriptionRequest, Customer, GatewayPrice, GatewayProduct, GatewaySubscription,
    PaymentError, PaymentGateway, PaymentIntent, PaymentIntentStatus, SetupIntent,
    SubscriptionStatus,
};

/// Configurable mock implementation of `PaymentGateway`.
pub struct MockPaymentGateway {
    confirm_status: Mutex<PaymentIntentStatus>,
    subscription_status: Mutex<SubscriptionStatus>,
    confirm_error: Mutex<Option<PaymentError>>,
    create_customer_error: Mutex<Option<PaymentError>>,
    period_end: Mutex<i64>,

    customers_created: AtomicU32,
    intents_created: AtomicU32,
    intents_confirmed: AtomicU32,
    subscriptions_created: AtomicU32,
}

impl MockPaymentGateway {
    /// A gateway where every operation succeeds.
    pub fn new() -> Self {
        Self {
            confirm_status: Mutex::new(PaymentIntentStatus::Succeeded),
            subscription_status: Mutex::new(SubscriptionStatus::Active),
            confirm_error: Mutex::new(None),
            create_customer_error: Mutex::new(None),
            period_end: Mutex::new(chrono::Utc::now().timestamp() + 30 * 24 * 3600),
            customers_created: AtomicU32::new(0),
            intents_created: AtomicU32::new(0),
            intents_confirmed: AtomicU32::new(0),
            subscriptions_created: AtomicU32::new(0),
        }
    }

    /// Confirmed intents land in the given status.
    pub fn confirming_to(self, status: PaymentIntentStatus) -> Self {
        *self.confirm_status.lock().unwrap() = status;
        self
    }

    /// Created subscriptions land in the given status.
    pub fn subscribing_to(self, status: SubscriptionStatus) -> Self {
        *self.subscription_status.lock().unwrap() = status;
        self
    }

    /// Confirmation calls fail with the given error.
    pub fn failing_confirm_with(self, error: PaymentError) -> Self {
        *self.confirm_error.lock().unwrap() = Some(error);
        self
    }

    /// Customer creation fails with the given error.
    pub fn failing_customer_with(self, error: PaymentError) -> Self {
        *self.create_customer_error.lock().unwrap() = Some(error);
        self
    }

    /// Subscriptions report the given current period end.
    pub fn with_period_end(self, period_end: i64) -> Self {
        *self.period_end.lock().unwrap() = period_end;
        self
    }

    pub fn customers_created(&self) -> u32 {
        self.customers_created.load(Ordering::SeqCst)
    }

    pub fn intents_confirmed(&self) -> u32 {
        self.intents_confirmed.load(Ordering::SeqCst)
    }

    pub fn subscriptions_created(&self) -> u32 {
        self.subscriptions_created.load(Ordering::SeqCst)
    }
}

impl Default for MockPaymentGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<Customer, PaymentError> {
        if let Some(error) = self.create_customer_error.lock().unwrap().clone() {
            return Err(error);
        }
        let n = self.customers_created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Customer {
            id: format!("cus_mock_{}", n),
            email: request.email,
            name: request.name,
            created_at: chrono::Utc::now().timestamp(),
        })
    }

    async fn create_payment_intent(
        &self,
        request: CreatePaymentIntentRequest,
    ) -> Result<PaymentIntent, PaymentError> {
        let n = self.intents_created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(PaymentIntent {
            id: format!("pi_mock_{}", n),
            status: PaymentIntentStatus::RequiresConfirmation,
            amount_cents: request.amount_cents,
            client_secret: Some(format!("pi_mock_{}_secret", n)),
        })
    }

    async fn confirm_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<PaymentIntent, PaymentError> {
        if let Some(error) = self.confirm_error.lock().unwrap().clone() {
            return Err(error);
        }
        self.intents_confirmed.fetch_add(1, Ordering::SeqCst);
        Ok(PaymentIntent {
            id: payment_intent_id.to_string(),
            status: *self.confirm_status.lock().unwrap(),
            amount_cents: 0,
            client_secret: None,
        })
    }

    async fn create_subscription(
        &self,
        request: CreateSubscriptionRequest,
    ) -> Result<GatewaySubscription, PaymentError> {
        let n = self.subscriptions_created.fetch_add(1, Ordering::SeqCst) + 1;
        let period_end = *self.period_end.lock().unwrap();
        Ok(GatewaySubscription {
            id: format!("sub_mock_{}", n),
            customer_id: request.customer_id,
            status: *self.subscription_status.lock().unwrap(),
            current_period_start: chrono::Utc::now().timestamp(),
            current_period_end: period_end,
            cancel_at_period_end: false,
            canceled_at: None,
        })
    }

    async fn cancel_subscription(
        &self,
        subscription_id: &str,
        at_period_end: bool,
    ) -> Result<GatewaySubscription, PaymentError> {
        Ok(GatewaySubscription {
            id: subscription_id.to_string(),
            customer_id: "cus_mock_1".to_string(),
            status: if at_period_end {
                SubscriptionStatus::Active
            } else {
                SubscriptionStatus::Canceled
            },
            current_period_start: chrono::Utc::now().timestamp(),
            current_period_end: *self.period_end.lock().unwrap(),
            cancel_at_period_end: at_period_end,
            canceled_at: Some(chrono::Utc::now().timestamp()),
        })
    }

    async fn create_setup_intent(&self, _customer_id: &str) -> Result<SetupIntent, PaymentError> {
        Ok(SetupIntent {
            id: "seti_mock_1".to_string(),
            client_secret: Some("seti_mock_1_secret".to_string()),
        })
    }

    async fn attach_payment_method(
        &self,
        _payment_method_id: &str,
        _customer_id: &str,
    ) -> Result<(), PaymentError> {
        Ok(())
    }

    async fn create_product(&self, name: &str) -> Result<GatewayProduct, PaymentError> {
        Ok(GatewayProduct {
            id: "prod_mock_1".to_string(),
            name: name.to_string(),
        })
    }

    async fn create_price(
        &self,
        request: CreatePriceRequest,
    ) -> Result<GatewayPrice, PaymentError> {
        Ok(GatewayPrice {
            id: "price_mock_1".to_string(),
            product_id: request.product_id,
            amount_cents: request.amount_cents,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{AccessPassId, TeamId, UserId};
    use crate::ports::PurchaseMetadata;

    fn metadata() -> PurchaseMetadata {
        PurchaseMetadata {
            access_pass_id: AccessPassId::new(),
            user_id: UserId::new("u1").unwrap(),
            team_id: TeamId::new(),
        }
    }

    #[tokio::test]
    async fn default_gateway_succeeds_end_to_end() {
        let gateway = MockPaymentGateway::new();

        let customer = gateway
            .create_customer(CreateCustomerRequest {
                user_id: UserId::new("u1").unwrap(),
                email: "u1@example.com".to_string(),
                name: None,
                idempotency_key: None,
            })
            .await
            .unwrap();

        let intent = gateway
            .create_payment_intent(CreatePaymentIntentRequest {
                customer_id: customer.id,
                amount_cents: 1999,
                payment_method: None,
                metadata: metadata(),
                idempotency_key: None,
            })
            .await
            .unwrap();

        let confirmed = gateway.confirm_payment_intent(&intent.id).await.unwrap();
        assert_eq!(confirmed.status, PaymentIntentStatus::Succeeded);
    }

    #[tokio::test]
    async fn scripted_decline_is_returned() {
        let gateway = MockPaymentGateway::new()
            .confirming_to(PaymentIntentStatus::RequiresPaymentMethod);

        let confirmed = gateway.confirm_payment_intent("pi_x").await.unwrap();
        assert_eq!(confirmed.status, PaymentIntentStatus::RequiresPaymentMethod);
    }

    #[tokio::test]
    async fn counters_track_calls() {
        let gateway = MockPaymentGateway::new();
        gateway
            .create_subscription(CreateSubscriptionRequest {
                customer_id: "cus_1".to_string(),
                price_id: "price_1".to_string(),
                payment_method: None,
                metadata: metadata(),
                idempotency_key: None,
            })
            .await
            .unwrap();

        assert_eq!(gateway.subscriptions_created(), 1);
        assert_eq!(gateway.customers_created(), 0);
    }
}
