//! HandleGatewayWebhookHandler - Command handler for gateway lifecycle
//! events.
//!
//! The asynchronous half of the write path. Signature verification runs
//! before any business logic; verified events pass through the idempotent
//! processor (dedupe by gateway event id) into the reconciler, which
//! converges entitlement state with payment state:
//!
//! - payment_intent.succeeded → complete the purchase, create the grant
//!   the orchestrator left pending
//! - payment_intent.payment_failed → mark the purchase failed, no grant
//! - invoice.paid → activate a pending subscription purchase, or extend
//!   an existing grant by one billing period
//! - customer.subscription.deleted → cancel the grant, immediately or at
//!   period end per the event's flag
//! - charge.refunded → mark the grant refunded

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

use crate::domain::billing::{
    GatewayEvent, GatewayEventType, GatewayWebhookVerifier, IdempotentWebhookProcessor,
    WebhookDispatcher, WebhookError, WebhookEventHandler,
};
use crate::domain::entitlement::{AccessGrant, GrantStatus, Purchasable, Purchase};
use crate::domain::foundation::{AccessGrantId, Timestamp};
use crate::ports::{
    ensure_buyer_membership, AccessPassRepository, CompletionOutcome, EntitlementStore,
    MembershipDirectory, WebhookEventRepository, WebhookResult,
};

/// Command to handle a gateway webhook delivery.
#[derive(Debug, Clone)]
pub struct HandleGatewayWebhookCommand {
    /// Raw webhook payload.
    pub payload: Vec<u8>,
    /// Webhook signature header.
    pub signature: String,
}

// ════════════════════════════════════════════════════════════════════════════
// Wire objects - only the fields reconciliation needs
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
struct PaymentIntentObject {
    id: String,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct InvoiceObject {
    #[allow(dead_code)]
    id: String,
    #[serde(default)]
    subscription: Option<String>,
    #[serde(default)]
    period_end: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionObject {
    id: String,
    #[serde(default)]
    metadata: HashMap<String, String>,
    #[serde(default)]
    cancel_at_period_end: bool,
    #[serde(default)]
    current_period_end: i64,
}

#[derive(Debug, Deserialize)]
struct ChargeObject {
    #[allow(dead_code)]
    id: String,
    #[serde(default)]
    payment_intent: Option<String>,
}

/// Reconciles gateway lifecycle events with entitlement state.
pub struct EntitlementReconciler {
    store: Arc<dyn EntitlementStore>,
    passes: Arc<dyn AccessPassRepository>,
    membership: Arc<dyn MembershipDirectory>,
}

impl EntitlementReconciler {
    pub fn new(
        store: Arc<dyn EntitlementStore>,
        passes: Arc<dyn AccessPassRepository>,
        membership: Arc<dyn MembershipDirectory>,
    ) -> Self {
        Self {
            store,
            passes,
            membership,
        }
    }

    /// Find the purchase behind an external reference.
    ///
    /// A missing purchase is retryable only when the object carries our
    /// metadata - the orchestrator's write may not have landed yet. An
    /// object without metadata was not created by a purchase flow at all
    /// and is acknowledged as ignored.
    async fn purchase_for(
        &self,
        reference: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<Purchase, WebhookError> {
        match self
            .store
            .find_purchase_by_reference(reference)
            .await
            .map_err(|e| WebhookError::Database(e.to_string()))?
        {
            Some(purchase) => Ok(purchase),
            None if metadata.contains_key("access_pass_id") => {
                Err(WebhookError::PurchaseNotFound)
            }
            None => Err(WebhookError::Ignored(format!(
                "No purchase for reference {}",
                reference
            ))),
        }
    }

    /// Complete a pending purchase and create its grant.
    async fn complete_and_grant(
        &self,
        mut purchase: Purchase,
        reference: &str,
        expires_at: Option<Timestamp>,
    ) -> Result<(), WebhookError> {
        let pass = self
            .passes
            .find_by_id(&purchase.access_pass_id)
            .await
            .map_err(|e| WebhookError::Database(e.to_string()))?
            .ok_or_else(|| {
                WebhookError::Database(format!(
                    "Access pass {} missing for purchase {}",
                    purchase.access_pass_id, purchase.id
                ))
            })?;

        purchase
            .complete(reference)
            .map_err(|e| WebhookError::InvalidTransition(e.to_string()))?;

        let grant = AccessGrant::active(
            AccessGrantId::new(),
            purchase.user_id.clone(),
            purchase.team_id,
            Purchasable::Space(pass.space_id),
            pass.id,
            purchase.id,
            expires_at,
        );

        match self
            .store
            .complete_purchase_with_grant(&purchase, &grant)
            .await
            .map_err(|e| WebhookError::Database(e.to_string()))?
        {
            CompletionOutcome::Granted => {
                tracing::info!(
                    grant_id = %grant.id,
                    purchase_id = %purchase.id,
                    "Grant created by webhook reconciliation"
                );
                ensure_buyer_membership(
                    self.membership.as_ref(),
                    &purchase.user_id,
                    &purchase.team_id,
                )
                .await
                .map_err(|e| WebhookError::Database(e.to_string()))?;
                Ok(())
            }
            CompletionOutcome::AlreadyGranted => Err(WebhookError::Ignored(format!(
                "Reference {} already produced a grant",
                reference
            ))),
            CompletionOutcome::SoldOut => {
                // Payment settled but stock ran out; needs an
                // operator-driven refund.
                tracing::error!(
                    purchase_id = %purchase.id,
                    "Webhook completion hit exhausted stock"
                );
                Err(WebhookError::Ignored(
                    "Stock exhausted before completion".to_string(),
                ))
            }
        }
    }

    async fn handle_payment_succeeded(&self, event: &GatewayEvent) -> Result<(), WebhookError> {
        let intent: PaymentIntentObject = event
            .deserialize_object()
            .map_err(|e| WebhookError::ParseError(e.to_string()))?;

        let purchase = self.purchase_for(&intent.id, &intent.metadata).await?;

        if !purchase.is_pending() {
            return Err(WebhookError::Ignored(format!(
                "Purchase {} already settled",
                purchase.id
            )));
        }

        let reference = intent.id.clone();
        self.complete_and_grant(purchase, &reference, None).await
    }

    async fn handle_payment_failed(&self, event: &GatewayEvent) -> Result<(), WebhookError> {
        let intent: PaymentIntentObject = event
            .deserialize_object()
            .map_err(|e| WebhookError::ParseError(e.to_string()))?;

        let mut purchase = self.purchase_for(&intent.id, &intent.metadata).await?;

        if !purchase.is_pending() {
            return Err(WebhookError::Ignored(format!(
                "Purchase {} already settled",
                purchase.id
            )));
        }

        purchase
            .fail(Some(intent.id.clone()))
            .map_err(|e| WebhookError::InvalidTransition(e.to_string()))?;
        self.store
            .update_purchase(&purchase)
            .await
            .map_err(|e| WebhookError::Database(e.to_string()))?;

        tracing::warn!(
            purchase_id = %purchase.id,
            user_id = %purchase.user_id,
            "Payment failed, user will be prompted to retry"
        );
        Ok(())
    }

    async fn handle_invoice_paid(&self, event: &GatewayEvent) -> Result<(), WebhookError> {
        let invoice: InvoiceObject = event
            .deserialize_object()
            .map_err(|e| WebhookError::ParseError(e.to_string()))?;

        let subscription_id = invoice
            .subscription
            .ok_or(WebhookError::MissingField("subscription"))?;

        let purchase = match self
            .store
            .find_purchase_by_reference(&subscription_id)
            .await
            .map_err(|e| WebhookError::Database(e.to_string()))?
        {
            Some(purchase) => purchase,
            // One-off invoices unrelated to subscriptions we sold.
            None => return Err(WebhookError::PurchaseNotFound),
        };

        let pass = self
            .passes
            .find_by_id(&purchase.access_pass_id)
            .await
            .map_err(|e| WebhookError::Database(e.to_string()))?;
        let nominal_days = pass
            .as_ref()
            .and_then(|p| p.pricing_type.nominal_period_days())
            .unwrap_or(30);

        if purchase.is_pending() {
            // First invoice after authentication: the orchestrator left
            // the purchase pending, we finish the flow now.
            let expires_at = invoice
                .period_end
                .map(Timestamp::from_unix_secs)
                .unwrap_or_else(|| Timestamp::now().add_days(nominal_days));
            return self
                .complete_and_grant(purchase, &subscription_id, Some(expires_at))
                .await;
        }

        // Renewal: extend the grant by one billing period.
        let mut grant = self
            .store
            .find_grant_by_purchase(&purchase.id)
            .await
            .map_err(|e| WebhookError::Database(e.to_string()))?
            .ok_or(WebhookError::GrantNotFound)?;

        if grant.status != GrantStatus::Active {
            return Err(WebhookError::Ignored(format!(
                "Grant {} is {:?}, not renewable",
                grant.id, grant.status
            )));
        }

        let expires_at = invoice
            .period_end
            .map(Timestamp::from_unix_secs)
            .unwrap_or_else(|| {
                grant
                    .expires_at
                    .unwrap_or_else(Timestamp::now)
                    .add_days(nominal_days)
            });

        grant
            .renew(expires_at)
            .map_err(|e| WebhookError::InvalidTransition(e.to_string()))?;
        self.store
            .update_grant(&grant)
            .await
            .map_err(|e| WebhookError::Database(e.to_string()))?;

        tracing::info!(grant_id = %grant.id, "Grant renewed for new billing period");
        Ok(())
    }

    async fn handle_invoice_payment_failed(
        &self,
        event: &GatewayEvent,
    ) -> Result<(), WebhookError> {
        let invoice: InvoiceObject = event
            .deserialize_object()
            .map_err(|e| WebhookError::ParseError(e.to_string()))?;

        let subscription_id = invoice
            .subscription
            .ok_or(WebhookError::MissingField("subscription"))?;

        // No grant mutation: an unrenewed grant lapses at its period end
        // on its own, and the gateway keeps retrying the invoice.
        tracing::warn!(
            subscription_id = %subscription_id,
            "Renewal payment failed, grant lapses at period end unless retried"
        );
        Err(WebhookError::Ignored(
            "Renewal failure needs no state change".to_string(),
        ))
    }

    async fn handle_subscription_deleted(
        &self,
        event: &GatewayEvent,
    ) -> Result<(), WebhookError> {
        let subscription: SubscriptionObject = event
            .deserialize_object()
            .map_err(|e| WebhookError::ParseError(e.to_string()))?;

        let mut purchase = self
            .purchase_for(&subscription.id, &subscription.metadata)
            .await?;

        if purchase.is_pending() {
            // An incomplete subscription that never authenticated.
            purchase
                .fail(Some(subscription.id.clone()))
                .map_err(|e| WebhookError::InvalidTransition(e.to_string()))?;
            self.store
                .update_purchase(&purchase)
                .await
                .map_err(|e| WebhookError::Database(e.to_string()))?;
            return Ok(());
        }

        let mut grant = self
            .store
            .find_grant_by_purchase(&purchase.id)
            .await
            .map_err(|e| WebhookError::Database(e.to_string()))?
            .ok_or(WebhookError::GrantNotFound)?;

        if grant.status != GrantStatus::Active {
            return Err(WebhookError::Ignored(format!(
                "Grant {} already settled",
                grant.id
            )));
        }

        if subscription.cancel_at_period_end {
            let period_end = Timestamp::from_unix_secs(subscription.current_period_end);
            grant
                .cancel_at_period_end(period_end)
                .map_err(|e| WebhookError::InvalidTransition(e.to_string()))?;
        } else {
            grant
                .cancel_immediately()
                .map_err(|e| WebhookError::InvalidTransition(e.to_string()))?;
        }

        self.store
            .update_grant(&grant)
            .await
            .map_err(|e| WebhookError::Database(e.to_string()))?;

        tracing::info!(
            grant_id = %grant.id,
            at_period_end = subscription.cancel_at_period_end,
            "Grant cancelled from subscription deletion"
        );
        Ok(())
    }

    async fn handle_charge_refunded(&self, event: &GatewayEvent) -> Result<(), WebhookError> {
        let charge: ChargeObject = event
            .deserialize_object()
            .map_err(|e| WebhookError::ParseError(e.to_string()))?;

        let reference = charge
            .payment_intent
            .ok_or(WebhookError::MissingField("payment_intent"))?;

        let purchase = match self
            .store
            .find_purchase_by_reference(&reference)
            .await
            .map_err(|e| WebhookError::Database(e.to_string()))?
        {
            Some(purchase) => purchase,
            None => {
                return Err(WebhookError::Ignored(format!(
                    "Refunded charge {} not tied to a purchase",
                    reference
                )))
            }
        };

        let mut grant = self
            .store
            .find_grant_by_purchase(&purchase.id)
            .await
            .map_err(|e| WebhookError::Database(e.to_string()))?
            .ok_or_else(|| {
                WebhookError::Ignored("Refunded purchase has no grant".to_string())
            })?;

        if grant.status != GrantStatus::Active {
            return Err(WebhookError::Ignored(format!(
                "Grant {} already settled",
                grant.id
            )));
        }

        grant
            .refund()
            .map_err(|e| WebhookError::InvalidTransition(e.to_string()))?;
        self.store
            .update_grant(&grant)
            .await
            .map_err(|e| WebhookError::Database(e.to_string()))?;

        tracing::info!(grant_id = %grant.id, "Grant revoked by refund");
        Ok(())
    }
}

#[async_trait]
impl WebhookEventHandler for EntitlementReconciler {
    fn handles(&self) -> Vec<GatewayEventType> {
        vec![
            GatewayEventType::PaymentIntentSucceeded,
            GatewayEventType::PaymentIntentFailed,
            GatewayEventType::InvoicePaid,
            GatewayEventType::InvoicePaymentFailed,
            GatewayEventType::SubscriptionDeleted,
            GatewayEventType::ChargeRefunded,
        ]
    }

    async fn handle(&self, event: &GatewayEvent) -> Result<(), WebhookError> {
        match event.parsed_type() {
            GatewayEventType::PaymentIntentSucceeded => {
                self.handle_payment_succeeded(event).await
            }
            GatewayEventType::PaymentIntentFailed => self.handle_payment_failed(event).await,
            GatewayEventType::InvoicePaid => self.handle_invoice_paid(event).await,
            GatewayEventType::InvoicePaymentFailed => {
                self.handle_invoice_payment_failed(event).await
            }
            GatewayEventType::SubscriptionDeleted => {
                self.handle_subscription_deleted(event).await
            }
            GatewayEventType::ChargeRefunded => self.handle_charge_refunded(event).await,
            GatewayEventType::Unknown => Err(WebhookError::Ignored(format!(
                "Unhandled event type {}",
                event.event_type
            ))),
        }
    }
}

/// Routes every reconcilable event type to the reconciler.
pub struct ReconcilerDispatcher {
    reconciler: EntitlementReconciler,
}

impl ReconcilerDispatcher {
    pub fn new(reconciler: EntitlementReconciler) -> Self {
        Self { reconciler }
    }
}

#[async_trait]
impl WebhookDispatcher for ReconcilerDispatcher {
    fn get_handler(&self, event_type: &GatewayEventType) -> Option<&dyn WebhookEventHandler> {
        if *event_type == GatewayEventType::Unknown {
            None
        } else {
            Some(&self.reconciler)
        }
    }
}

/// Handler for the webhook endpoint: verify, dedupe, reconcile.
pub struct HandleGatewayWebhookHandler<R: WebhookEventRepository> {
    verifier: GatewayWebhookVerifier,
    processor: IdempotentWebhookProcessor<R, ReconcilerDispatcher>,
}

impl<R: WebhookEventRepository> HandleGatewayWebhookHandler<R> {
    pub fn new(
        webhook_secret: impl Into<String>,
        repository: R,
        reconciler: EntitlementReconciler,
    ) -> Self {
        Self {
            verifier: GatewayWebhookVerifier::new(webhook_secret),
            processor: IdempotentWebhookProcessor::new(
                repository,
                ReconcilerDispatcher::new(reconciler),
            ),
        }
    }

    /// Process one webhook delivery end to end.
    ///
    /// Signature verification precedes all business logic; an
    /// unverifiable payload is rejected with no side effects. Returns
    /// only after the event is durably recorded or confirmed duplicate,
    /// so a 2xx response to the gateway is honest.
    pub async fn handle(
        &self,
        cmd: HandleGatewayWebhookCommand,
    ) -> Result<WebhookResult, WebhookError> {
        let event = self.verifier.verify_and_parse(&cmd.payload, &cmd.signature)?;
        self.processor.process(event).await
    }
}
