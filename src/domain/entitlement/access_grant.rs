//! AccessGrant aggregate entity.
//!
//! The entitlement itself: a durable record that a user may access one
//! node of the content hierarchy, created only by a completed purchase
//! (or its webhook-reconciled equivalent).
//!
//! # Design Decisions
//!
//! - **Activity is computed**: `is_active()` combines status and expiry so
//!   an expired grant denies access even before the sweep marks it
//! - **Cancellation at period end** keeps the status Active and sets
//!   `expires_at` to the period boundary; immediate cancellation flips the
//!   status right away

use crate::domain::content::OwnershipChain;
use crate::domain::foundation::{
    AccessGrantId, AccessPassId, DomainError, ErrorCode, PurchaseId, StateMachine, TeamId,
    Timestamp, UserId,
};
use serde::{Deserialize, Serialize};

use super::{GrantStatus, Purchasable};

/// AccessGrant aggregate - a user's entitlement to part of the hierarchy.
///
/// # Invariants
///
/// - `purchasable` references a Team, Space, or Experience - never a Stream
/// - `is_active() ⇔ status == Active ∧ (expires_at == None ∨ expires_at > now)`
/// - Scope cascades downward only (see `Purchasable::covers`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrant {
    /// Unique identifier for this grant.
    pub id: AccessGrantId,

    /// User holding the entitlement.
    pub user_id: UserId,

    /// Team that owns the granted content.
    pub team_id: TeamId,

    /// The hierarchy node this grant covers.
    pub purchasable: Purchasable,

    /// The pass whose purchase produced this grant.
    pub access_pass_id: AccessPassId,

    /// The purchase that produced this grant. One grant per completed
    /// purchase; the store enforces uniqueness.
    pub purchase_id: PurchaseId,

    /// Lifecycle status.
    pub status: GrantStatus,

    /// When the grant stops conferring access. None = perpetual.
    pub expires_at: Option<Timestamp>,

    /// When the grant was created.
    pub created_at: Timestamp,

    /// When the grant was last updated.
    pub updated_at: Timestamp,
}

impl AccessGrant {
    /// Create a new active grant.
    ///
    /// Free and one-time purchases pass `expires_at = None`; subscription
    /// purchases pass the gateway-reported period end.
    pub fn active(
        id: AccessGrantId,
        user_id: UserId,
        team_id: TeamId,
        purchasable: Purchasable,
        access_pass_id: AccessPassId,
        purchase_id: PurchaseId,
        expires_at: Option<Timestamp>,
    ) -> Self {
        let now = Timestamp::now();
        Self {
            id,
            user_id,
            team_id,
            purchasable,
            access_pass_id,
            purchase_id,
            status: GrantStatus::Active,
            expires_at,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the grant currently confers access.
    pub fn is_active(&self) -> bool {
        if self.status != GrantStatus::Active {
            return false;
        }
        match self.expires_at {
            None => true,
            Some(expires_at) => !expires_at.is_past(),
        }
    }

    /// Whether this grant covers the resource whose resolved ancestry is
    /// `chain`. Inactive grants never cover anything.
    pub fn grants_access_to(&self, chain: &OwnershipChain) -> bool {
        self.is_active() && self.purchasable.covers(chain)
    }

    /// Extend the grant for a new billing period.
    ///
    /// Called by the webhook reconciler on invoice payment. Extending also
    /// clears a pending at-period-end cancellation, since the gateway only
    /// bills subscriptions that are still meant to continue.
    ///
    /// # Errors
    ///
    /// Returns error if the grant is not renewable (terminal status).
    pub fn renew(&mut self, new_expires_at: Timestamp) -> Result<(), DomainError> {
        if self.status != GrantStatus::Active {
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!("Cannot renew a {:?} grant", self.status),
            ));
        }
        self.expires_at = Some(new_expires_at);
        self.updated_at = Timestamp::now();
        Ok(())
    }

    /// Cancel the grant effective immediately.
    ///
    /// # Errors
    ///
    /// Returns error if the grant has already settled.
    pub fn cancel_immediately(&mut self) -> Result<(), DomainError> {
        self.transition_to(GrantStatus::Cancelled)?;
        self.updated_at = Timestamp::now();
        Ok(())
    }

    /// Cancel the grant at the end of the current billing period.
    ///
    /// The status stays Active; the grant simply stops at `period_end`
    /// instead of being renewed.
    ///
    /// # Errors
    ///
    /// Returns error if the grant is not active.
    pub fn cancel_at_period_end(&mut self, period_end: Timestamp) -> Result<(), DomainError> {
        if self.status != GrantStatus::Active {
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!("Cannot schedule cancellation of a {:?} grant", self.status),
            ));
        }
        self.expires_at = Some(period_end);
        self.updated_at = Timestamp::now();
        Ok(())
    }

    /// Mark the grant refunded.
    ///
    /// # Errors
    ///
    /// Returns error if the grant has already settled.
    pub fn refund(&mut self) -> Result<(), DomainError> {
        self.transition_to(GrantStatus::Refunded)?;
        self.updated_at = Timestamp::now();
        Ok(())
    }

    /// Mark the grant expired.
    ///
    /// Used by the sweep that persists computed expiry for query
    /// efficiency; `is_active()` already denies access before the sweep.
    ///
    /// # Errors
    ///
    /// Returns error if the grant has already settled.
    pub fn expire(&mut self) -> Result<(), DomainError> {
        self.transition_to(GrantStatus::Expired)?;
        self.updated_at = Timestamp::now();
        Ok(())
    }

    fn transition_to(&mut self, target: GrantStatus) -> Result<(), DomainError> {
        self.status = self.status.transition_to(target).map_err(|_| {
            DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!(
                    "Cannot transition grant from {:?} to {:?}",
                    self.status, target
                ),
            )
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::SpaceId;

    fn test_user_id() -> UserId {
        UserId::new("user-123").unwrap()
    }

    fn perpetual_grant() -> AccessGrant {
        AccessGrant::active(
            AccessGrantId::new(),
            test_user_id(),
            TeamId::new(),
            Purchasable::Space(SpaceId::new()),
            AccessPassId::new(),
            PurchaseId::new(),
            None,
        )
    }

    fn expiring_grant(expires_at: Timestamp) -> AccessGrant {
        AccessGrant::active(
            AccessGrantId::new(),
            test_user_id(),
            TeamId::new(),
            Purchasable::Space(SpaceId::new()),
            AccessPassId::new(),
            PurchaseId::new(),
            Some(expires_at),
        )
    }

    // is_active tests

    #[test]
    fn perpetual_active_grant_is_active() {
        assert!(perpetual_grant().is_active());
    }

    #[test]
    fn future_expiry_is_active() {
        let grant = expiring_grant(Timestamp::now().add_days(30));
        assert!(grant.is_active());
    }

    #[test]
    fn past_expiry_is_inactive_regardless_of_status() {
        let grant = expiring_grant(Timestamp::now().add_days(-1));
        assert_eq!(grant.status, GrantStatus::Active);
        assert!(!grant.is_active());
    }

    #[test]
    fn cancelled_grant_is_inactive() {
        let mut grant = perpetual_grant();
        grant.cancel_immediately().unwrap();
        assert!(!grant.is_active());
    }

    #[test]
    fn refunded_grant_is_inactive() {
        let mut grant = perpetual_grant();
        grant.refund().unwrap();
        assert!(!grant.is_active());
    }

    #[test]
    fn expired_grant_is_inactive() {
        let mut grant = perpetual_grant();
        grant.expire().unwrap();
        assert!(!grant.is_active());
    }

    // Lifecycle tests

    #[test]
    fn renew_extends_expiry() {
        let mut grant = expiring_grant(Timestamp::now().add_days(2));
        let new_end = Timestamp::now().add_days(32);
        grant.renew(new_end).unwrap();

        assert_eq!(grant.expires_at, Some(new_end));
        assert!(grant.is_active());
    }

    #[test]
    fn renew_fails_for_cancelled_grant() {
        let mut grant = perpetual_grant();
        grant.cancel_immediately().unwrap();

        assert!(grant.renew(Timestamp::now().add_days(30)).is_err());
    }

    #[test]
    fn cancel_at_period_end_keeps_grant_active_until_then() {
        let mut grant = expiring_grant(Timestamp::now().add_days(12));
        let period_end = Timestamp::now().add_days(12);
        grant.cancel_at_period_end(period_end).unwrap();

        assert_eq!(grant.status, GrantStatus::Active);
        assert!(grant.is_active());
        assert_eq!(grant.expires_at, Some(period_end));
    }

    #[test]
    fn cancel_immediately_cuts_access_now() {
        let mut grant = expiring_grant(Timestamp::now().add_days(12));
        grant.cancel_immediately().unwrap();

        assert_eq!(grant.status, GrantStatus::Cancelled);
        assert!(!grant.is_active());
    }

    #[test]
    fn refunded_grant_cannot_be_cancelled() {
        let mut grant = perpetual_grant();
        grant.refund().unwrap();

        assert!(grant.cancel_immediately().is_err());
    }

    // Scope tests

    #[test]
    fn inactive_grant_covers_nothing() {
        let team = TeamId::new();
        let space = SpaceId::new();
        let mut grant = AccessGrant::active(
            AccessGrantId::new(),
            test_user_id(),
            team,
            Purchasable::Space(space),
            AccessPassId::new(),
            PurchaseId::new(),
            None,
        );
        let chain = OwnershipChain::for_space(team, space);
        assert!(grant.grants_access_to(&chain));

        grant.cancel_immediately().unwrap();
        assert!(!grant.grants_access_to(&chain));
    }
}
