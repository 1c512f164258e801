//! ExecutePurchaseHandler - Command handler turning a buy request into
//! gateway calls and entitlement writes.
//!
//! The single entry point of the write path. Branches on the pass's
//! pricing type:
//!
//! - **free**: no gateway call; completed purchase + perpetual grant in
//!   one atomic store operation
//! - **one_time**: lazy customer, payment intent, synchronous confirm;
//!   grant only on "succeeded"
//! - **monthly/yearly**: lazy customer, subscription; grant only on
//!   "active", with expiry at the gateway-reported period end
//!
//! Gateway failures are caught here and normalized - callers never see a
//! raw gateway error. An indeterminate failure (timeout, dropped
//! connection) leaves the purchase pending so the webhook reconciler can
//! settle it; a definitive outcome settles it immediately.

use std::sync::Arc;

use crate::domain::catalog::{AccessPass, PricingType};
use crate::domain::entitlement::{AccessGrant, Purchasable, Purchase, PurchaseError};
use crate::domain::foundation::{AccessGrantId, AccessPassId, PurchaseId, Timestamp, UserId};
use crate::ports::{
    ensure_buyer_membership, AccessPassRepository, CompletionOutcome, CreateCustomerRequest,
    CreatePaymentIntentRequest, CreateSubscriptionRequest, EntitlementStore, MembershipDirectory,
    PaymentError, PaymentGateway, PaymentIntentStatus, PurchaseMetadata, SubscriptionStatus,
    UserDirectory,
};

/// Command to purchase an access pass.
#[derive(Debug, Clone)]
pub struct ExecutePurchaseCommand {
    pub user_id: UserId,
    pub access_pass_id: AccessPassId,
    /// Gateway payment method id, if the caller already collected one.
    pub payment_method: Option<String>,
}

/// Result of a successful purchase.
#[derive(Debug, Clone)]
pub struct PurchaseOutcome {
    pub purchase: Purchase,
    pub access_grant: AccessGrant,
}

/// Handler for executing purchases.
pub struct ExecutePurchaseHandler {
    passes: Arc<dyn AccessPassRepository>,
    store: Arc<dyn EntitlementStore>,
    gateway: Arc<dyn PaymentGateway>,
    membership: Arc<dyn MembershipDirectory>,
    users: Arc<dyn UserDirectory>,
}

impl ExecutePurchaseHandler {
    pub fn new(
        passes: Arc<dyn AccessPassRepository>,
        store: Arc<dyn EntitlementStore>,
        gateway: Arc<dyn PaymentGateway>,
        membership: Arc<dyn MembershipDirectory>,
        users: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            passes,
            store,
            gateway,
            membership,
            users,
        }
    }

    pub async fn handle(
        &self,
        cmd: ExecutePurchaseCommand,
    ) -> Result<PurchaseOutcome, PurchaseError> {
        // 1. Load and validate the pass
        let pass = self
            .passes
            .find_by_id(&cmd.access_pass_id)
            .await
            .map_err(PurchaseError::from)?
            .ok_or_else(|| PurchaseError::pass_not_found(cmd.access_pass_id))?;

        if !pass.published {
            return Err(PurchaseError::pass_not_published(pass.id));
        }
        if !pass.available() {
            return Err(PurchaseError::sold_out(pass.id));
        }

        // 2. Branch on pricing type
        match pass.pricing_type {
            PricingType::Free => self.purchase_free(&cmd, &pass).await,
            PricingType::OneTime => self.purchase_one_time(&cmd, &pass).await,
            PricingType::Monthly | PricingType::Yearly => {
                self.purchase_subscription(&cmd, &pass).await
            }
        }
    }

    /// Free flow: no gateway call, completed purchase + perpetual grant.
    async fn purchase_free(
        &self,
        cmd: &ExecutePurchaseCommand,
        pass: &AccessPass,
    ) -> Result<PurchaseOutcome, PurchaseError> {
        let purchase = Purchase::completed_free(
            PurchaseId::new(),
            cmd.user_id.clone(),
            pass.team_id,
            pass.id,
        );
        let grant = self.build_grant(&purchase, pass, None);

        let (purchase, access_grant) = match self
            .store
            .complete_purchase_with_grant(&purchase, &grant)
            .await?
        {
            CompletionOutcome::Granted => {
                tracing::info!(
                    grant_id = %grant.id,
                    user_id = %cmd.user_id,
                    access_pass_id = %pass.id,
                    "Free access grant created"
                );
                (purchase, grant)
            }
            CompletionOutcome::AlreadyGranted => self.existing_outcome(cmd, pass).await?,
            CompletionOutcome::SoldOut => return Err(PurchaseError::sold_out(pass.id)),
        };

        ensure_buyer_membership(self.membership.as_ref(), &cmd.user_id, &pass.team_id).await?;

        Ok(PurchaseOutcome {
            purchase,
            access_grant,
        })
    }

    /// One-time flow: payment intent created and confirmed synchronously.
    async fn purchase_one_time(
        &self,
        cmd: &ExecutePurchaseCommand,
        pass: &AccessPass,
    ) -> Result<PurchaseOutcome, PurchaseError> {
        let customer_id = self.ensure_gateway_customer(&cmd.user_id).await?;

        let mut purchase = Purchase::pending(
            PurchaseId::new(),
            cmd.user_id.clone(),
            pass.team_id,
            pass.id,
            pass.price_cents,
        );
        self.store.create_purchase(&purchase).await?;

        let intent = match self
            .gateway
            .create_payment_intent(CreatePaymentIntentRequest {
                customer_id,
                amount_cents: pass.price_cents,
                payment_method: cmd.payment_method.clone(),
                metadata: self.metadata(cmd, pass),
                idempotency_key: Some(format!("purchase-{}", purchase.id)),
            })
            .await
        {
            Ok(intent) => intent,
            Err(e) => return self.settle_gateway_failure(purchase, None, e).await,
        };

        // Record the reference before confirming so an indeterminate
        // outcome can still be matched by the webhook reconciler.
        purchase.record_reference(intent.id.clone());
        self.store.update_purchase(&purchase).await?;

        let confirmed = match self.gateway.confirm_payment_intent(&intent.id).await {
            Ok(confirmed) => confirmed,
            Err(e) => {
                return self
                    .settle_gateway_failure(purchase, Some(intent.id), e)
                    .await
            }
        };

        if confirmed.status == PaymentIntentStatus::Succeeded {
            purchase.complete(intent.id.clone())?;
            let grant = self.build_grant(&purchase, pass, None);
            self.finish_completion(cmd, pass, purchase, grant).await
        } else {
            tracing::warn!(
                purchase_id = %purchase.id,
                status = ?confirmed.status,
                "Payment intent did not succeed"
            );
            purchase.fail(Some(intent.id))?;
            self.store.update_purchase(&purchase).await?;
            Err(PurchaseError::payment_failed("Payment failed"))
        }
    }

    /// Subscription flow: grant expiry follows the gateway billing period.
    async fn purchase_subscription(
        &self,
        cmd: &ExecutePurchaseCommand,
        pass: &AccessPass,
    ) -> Result<PurchaseOutcome, PurchaseError> {
        let customer_id = self.ensure_gateway_customer(&cmd.user_id).await?;
        let price_id = pass.recurring_price_id.clone().ok_or_else(|| {
            PurchaseError::validation("recurring_price_id", "Recurring pass has no gateway price")
        })?;

        let mut purchase = Purchase::pending(
            PurchaseId::new(),
            cmd.user_id.clone(),
            pass.team_id,
            pass.id,
            pass.price_cents,
        );
        self.store.create_purchase(&purchase).await?;

        let subscription = match self
            .gateway
            .create_subscription(CreateSubscriptionRequest {
                customer_id,
                price_id,
                payment_method: cmd.payment_method.clone(),
                metadata: self.metadata(cmd, pass),
                idempotency_key: Some(format!("purchase-{}", purchase.id)),
            })
            .await
        {
            Ok(subscription) => subscription,
            Err(e) => return self.settle_gateway_failure(purchase, None, e).await,
        };

        purchase.record_reference(subscription.id.clone());
        self.store.update_purchase(&purchase).await?;

        match subscription.status {
            SubscriptionStatus::Active => {
                purchase.complete(subscription.id.clone())?;
                let expires_at = Timestamp::from_unix_secs(subscription.current_period_end);
                let grant = self.build_grant(&purchase, pass, Some(expires_at));
                self.finish_completion(cmd, pass, purchase, grant).await
            }
            SubscriptionStatus::Incomplete => {
                // Awaiting payment authentication; the reconciler creates
                // the grant when the first invoice is paid.
                tracing::info!(
                    purchase_id = %purchase.id,
                    subscription_id = %subscription.id,
                    "Subscription incomplete, awaiting authentication"
                );
                Err(PurchaseError::subscription_incomplete())
            }
            other => {
                tracing::warn!(
                    purchase_id = %purchase.id,
                    status = ?other,
                    "Subscription did not activate"
                );
                purchase.fail(Some(subscription.id))?;
                self.store.update_purchase(&purchase).await?;
                Err(PurchaseError::payment_failed("Payment failed"))
            }
        }
    }

    /// Reuse the user's gateway customer, creating it lazily on first use.
    async fn ensure_gateway_customer(&self, user_id: &UserId) -> Result<String, PurchaseError> {
        if let Some(customer_id) = self.users.gateway_customer_id(user_id).await? {
            return Ok(customer_id);
        }

        let email = self
            .users
            .email_of(user_id)
            .await?
            .ok_or_else(|| PurchaseError::validation("email", "User has no email address"))?;

        let customer = self
            .gateway
            .create_customer(CreateCustomerRequest {
                user_id: user_id.clone(),
                email,
                name: None,
                idempotency_key: Some(format!("customer-{}", user_id)),
            })
            .await
            .map_err(|e| PurchaseError::payment_failed(e.message))?;

        self.users
            .set_gateway_customer_id(user_id, &customer.id)
            .await?;

        Ok(customer.id)
    }

    /// Normalize a gateway failure, settling the purchase if the outcome
    /// is known.
    ///
    /// Indeterminate failures (timeout, dropped connection) leave the
    /// purchase pending: the charge may have settled on the gateway side,
    /// and the reconciler must still be able to complete it. Telling the
    /// user "failed" while durable state says pending is the safe half of
    /// that mismatch.
    async fn settle_gateway_failure(
        &self,
        mut purchase: Purchase,
        reference: Option<String>,
        error: PaymentError,
    ) -> Result<PurchaseOutcome, PurchaseError> {
        if error.is_indeterminate() {
            tracing::warn!(
                purchase_id = %purchase.id,
                error = %error,
                "Gateway outcome indeterminate, leaving purchase pending"
            );
            return Err(PurchaseError::payment_failed(error.message));
        }

        purchase.fail(reference)?;
        self.store.update_purchase(&purchase).await?;
        Err(PurchaseError::payment_failed(error.message))
    }

    /// Run the atomic completion and buyer-membership assurance.
    async fn finish_completion(
        &self,
        cmd: &ExecutePurchaseCommand,
        pass: &AccessPass,
        purchase: Purchase,
        grant: AccessGrant,
    ) -> Result<PurchaseOutcome, PurchaseError> {
        let (purchase, access_grant) = match self
            .store
            .complete_purchase_with_grant(&purchase, &grant)
            .await?
        {
            CompletionOutcome::Granted => {
                tracing::info!(
                    grant_id = %grant.id,
                    purchase_id = %purchase.id,
                    user_id = %cmd.user_id,
                    "Access grant created"
                );
                (purchase, grant)
            }
            CompletionOutcome::AlreadyGranted => {
                // The webhook reconciler settled this reference first.
                self.existing_outcome(cmd, pass).await?
            }
            CompletionOutcome::SoldOut => {
                // The charge settled but the last unit went to a
                // concurrent buyer. Needs an operator-driven refund.
                tracing::error!(
                    purchase_id = %purchase.id,
                    access_pass_id = %pass.id,
                    "Charge settled for sold-out pass"
                );
                return Err(PurchaseError::sold_out(pass.id));
            }
        };

        ensure_buyer_membership(self.membership.as_ref(), &cmd.user_id, &pass.team_id).await?;

        Ok(PurchaseOutcome {
            purchase,
            access_grant,
        })
    }

    /// Look up the already-persisted purchase/grant pair after losing a
    /// completion race.
    async fn existing_outcome(
        &self,
        cmd: &ExecutePurchaseCommand,
        pass: &AccessPass,
    ) -> Result<(Purchase, AccessGrant), PurchaseError> {
        let grant = self
            .store
            .find_grants_for_user(&cmd.user_id)
            .await?
            .into_iter()
            .find(|g| g.access_pass_id == pass.id && g.is_active())
            .ok_or_else(|| {
                PurchaseError::infrastructure("Completion reported duplicate but no grant found")
            })?;

        let purchase = self
            .store
            .find_purchase(&grant.purchase_id)
            .await?
            .ok_or_else(|| {
                PurchaseError::infrastructure("Grant exists without its purchase")
            })?;

        Ok((purchase, grant))
    }

    fn metadata(&self, cmd: &ExecutePurchaseCommand, pass: &AccessPass) -> PurchaseMetadata {
        PurchaseMetadata {
            access_pass_id: pass.id,
            user_id: cmd.user_id.clone(),
            team_id: pass.team_id,
        }
    }

    fn build_grant(
        &self,
        purchase: &Purchase,
        pass: &AccessPass,
        expires_at: Option<Timestamp>,
    ) -> AccessGrant {
        AccessGrant::active(
            AccessGrantId::new(),
            purchase.user_id.clone(),
            pass.team_id,
            Purchasable::Space(pass.space_id),
            pass.id,
            purchase.id,
            expires_at,
        )
    }
}
