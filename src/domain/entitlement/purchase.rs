//! Purchase aggregate entity.
//!
//! One row per attempted transaction, successful or not. Paid purchases
//! are written `Pending` before the gateway is called so a failed or
//! timed-out call still leaves an audit trail.

use crate::domain::foundation::{
    AccessPassId, DomainError, ErrorCode, PurchaseId, StateMachine, TeamId, Timestamp, UserId,
};
use serde::{Deserialize, Serialize};

use super::PurchaseStatus;

/// Purchase aggregate - an audit record of one payment attempt.
///
/// # Invariants
///
/// - `amount_cents >= 0`
/// - `external_reference` (payment intent or subscription id) is unique
///   across purchases once set; the entitlement store enforces this
/// - Status settles at most once (Pending → Completed | Failed)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
    /// Unique identifier for this purchase.
    pub id: PurchaseId,

    /// User making the purchase.
    pub user_id: UserId,

    /// Team that owns the purchased pass.
    pub team_id: TeamId,

    /// The pass being purchased.
    pub access_pass_id: AccessPassId,

    /// Amount charged, in cents. Zero for free passes.
    pub amount_cents: i64,

    /// Gateway payment-intent or subscription id, once known.
    pub external_reference: Option<String>,

    /// Current settlement status.
    pub status: PurchaseStatus,

    /// When the purchase was created.
    pub created_at: Timestamp,

    /// When the purchase was last updated.
    pub updated_at: Timestamp,
}

impl Purchase {
    /// Create a pending purchase ahead of a gateway call.
    pub fn pending(
        id: PurchaseId,
        user_id: UserId,
        team_id: TeamId,
        access_pass_id: AccessPassId,
        amount_cents: i64,
    ) -> Self {
        let now = Timestamp::now();
        Self {
            id,
            user_id,
            team_id,
            access_pass_id,
            amount_cents,
            external_reference: None,
            status: PurchaseStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create an already-completed zero-amount purchase for a free pass.
    ///
    /// Free passes never touch the gateway, so there is no pending phase
    /// and no external reference.
    pub fn completed_free(
        id: PurchaseId,
        user_id: UserId,
        team_id: TeamId,
        access_pass_id: AccessPassId,
    ) -> Self {
        let now = Timestamp::now();
        Self {
            id,
            user_id,
            team_id,
            access_pass_id,
            amount_cents: 0,
            external_reference: None,
            status: PurchaseStatus::Completed,
            created_at: now,
            updated_at: now,
        }
    }

    /// Mark this purchase completed, recording the gateway reference.
    ///
    /// # Errors
    ///
    /// Returns error if the purchase has already settled.
    pub fn complete(&mut self, external_reference: impl Into<String>) -> Result<(), DomainError> {
        self.transition_to(PurchaseStatus::Completed)?;
        self.external_reference = Some(external_reference.into());
        self.updated_at = Timestamp::now();
        Ok(())
    }

    /// Mark this purchase failed, keeping any gateway reference for audit.
    ///
    /// # Errors
    ///
    /// Returns error if the purchase has already settled.
    pub fn fail(&mut self, external_reference: Option<String>) -> Result<(), DomainError> {
        self.transition_to(PurchaseStatus::Failed)?;
        if let Some(reference) = external_reference {
            self.external_reference = Some(reference);
        }
        self.updated_at = Timestamp::now();
        Ok(())
    }

    /// Record the gateway reference without settling.
    ///
    /// Used when a gateway call times out: the reference is kept so the
    /// webhook reconciler can match the eventual outcome, but the purchase
    /// stays pending.
    pub fn record_reference(&mut self, external_reference: impl Into<String>) {
        self.external_reference = Some(external_reference.into());
        self.updated_at = Timestamp::now();
    }

    /// Whether this purchase has settled successfully.
    pub fn is_completed(&self) -> bool {
        self.status == PurchaseStatus::Completed
    }

    /// Whether this purchase is still awaiting settlement.
    pub fn is_pending(&self) -> bool {
        self.status == PurchaseStatus::Pending
    }

    fn transition_to(&mut self, target: PurchaseStatus) -> Result<(), DomainError> {
        self.status = self.status.transition_to(target).map_err(|_| {
            DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!(
                    "Cannot transition purchase from {:?} to {:?}",
                    self.status, target
                ),
            )
        })?;
        Ok(())
    }
}
