//! EntitlementStore port - durable Purchase and AccessGrant records.
//!
//! The store is the single source of truth for "has this purchase already
//! produced a grant". The synchronous orchestrator and the asynchronous
//! webhook reconciler can both try to complete the same purchase; the
//! atomic `complete_purchase_with_grant` operation resolves that race with
//! a uniqueness constraint on the external payment reference rather than
//! locks, which composes with at-least-once webhook delivery.

use async_trait::async_trait;

use crate::domain::entitlement::{AccessGrant, Purchase};
use crate::domain::foundation::{
    AccessGrantId, DomainError, PurchaseId, Timestamp, UserId,
};

/// Outcome of the atomic completion operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// Purchase completed and exactly one grant was created.
    Granted,

    /// Another writer already completed a purchase with this external
    /// reference; no second grant was created. Not an error.
    AlreadyGranted,

    /// The pass's stock ran out between the availability check and
    /// completion. No grant was created; the purchase was not completed.
    SoldOut,
}

/// Port for storing purchases and access grants.
///
/// Implementations must make `complete_purchase_with_grant` atomic:
/// the completed purchase row, the new grant row, and the pass's
/// active-grant counter (including the conditional stock decrement)
/// commit together or not at all.
#[async_trait]
pub trait EntitlementStore: Send + Sync {
    /// Persist a new purchase row.
    async fn create_purchase(&self, purchase: &Purchase) -> Result<(), DomainError>;

    /// Update an existing purchase row.
    async fn update_purchase(&self, purchase: &Purchase) -> Result<(), DomainError>;

    /// Find a purchase by id.
    async fn find_purchase(&self, id: &PurchaseId) -> Result<Option<Purchase>, DomainError>;

    /// Find a purchase by its gateway payment-intent or subscription id.
    async fn find_purchase_by_reference(
        &self,
        external_reference: &str,
    ) -> Result<Option<Purchase>, DomainError>;

    /// Atomically complete a purchase and create its grant.
    ///
    /// In one transaction:
    /// 1. Conditionally decrement remaining stock on the pass
    ///    (compare-and-swap); a loss yields `SoldOut`
    /// 2. Persist the purchase as completed with its external reference
    /// 3. Insert the grant; a uniqueness violation on the external
    ///    reference yields `AlreadyGranted`
    /// 4. Bump the pass's active-grant counter
    async fn complete_purchase_with_grant(
        &self,
        purchase: &Purchase,
        grant: &AccessGrant,
    ) -> Result<CompletionOutcome, DomainError>;

    /// All grants held by a user, any status.
    async fn find_grants_for_user(&self, user_id: &UserId)
        -> Result<Vec<AccessGrant>, DomainError>;

    /// Find a grant by id.
    async fn find_grant(&self, id: &AccessGrantId) -> Result<Option<AccessGrant>, DomainError>;

    /// Find the grant created by a given purchase, if any.
    async fn find_grant_by_purchase(
        &self,
        purchase_id: &PurchaseId,
    ) -> Result<Option<AccessGrant>, DomainError>;

    /// Update an existing grant row.
    ///
    /// Releases the pass's active-grant counter in the same transaction
    /// when the grant leaves the active state.
    async fn update_grant(&self, grant: &AccessGrant) -> Result<(), DomainError>;

    /// Sweep: persist `Expired` status on active grants whose `expires_at`
    /// passed before `now`. Returns the number of grants marked.
    ///
    /// Query-efficiency only - `is_active()` already denies access to
    /// expired grants before the sweep runs.
    async fn mark_expired_grants(&self, now: Timestamp) -> Result<u64, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entitlement_store_is_object_safe() {
        fn _accepts_dyn(_store: &dyn EntitlementStore) {}
    }

    #[test]
    fn completion_outcomes_are_distinguishable() {
        assert_ne!(CompletionOutcome::Granted, CompletionOutcome::AlreadyGranted);
        assert_ne!(CompletionOutcome::Granted, CompletionOutcome::SoldOut);
    }
}
