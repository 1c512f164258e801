//! In-memory EntitlementStore and AccessPassRepository.
//!
//! A single mutex over the whole store stands in for the database
//! transaction: `complete_purchase_with_grant` observes and mutates
//! purchases, grants, and pass counters under one lock, giving the same
//! atomicity the postgres adapter gets from its transaction and unique
//! index.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::domain::catalog::AccessPass;
use crate::domain::entitlement::{AccessGrant, GrantStatus, Purchase, PurchaseStatus};
use crate::domain::foundation::{
    AccessGrantId, AccessPassId, DomainError, ErrorCode, PurchaseId, SpaceId, Timestamp, UserId,
};
use crate::ports::{AccessPassRepository, CompletionOutcome, EntitlementStore};

#[derive(Default)]
struct StoreState {
    purchases: HashMap<PurchaseId, Purchase>,
    grants: HashMap<AccessGrantId, AccessGrant>,
    passes: HashMap<AccessPassId, AccessPass>,
    // External reference -> purchase id, the uniqueness constraint that
    // prevents two concurrent completions from double-granting.
    granted_references: HashMap<String, PurchaseId>,
}

/// In-memory access pass repository sharing state with the store.
pub struct InMemoryAccessPassRepository {
    state: std::sync::Arc<Mutex<StoreState>>,
}

/// In-memory entitlement store.
pub struct InMemoryEntitlementStore {
    state: std::sync::Arc<Mutex<StoreState>>,
}

impl InMemoryEntitlementStore {
    pub fn new() -> Self {
        Self {
            state: std::sync::Arc::new(Mutex::new(StoreState::default())),
        }
    }

    /// A pass repository sharing this store's state, so counter updates
    /// made at completion are visible to pass lookups.
    pub fn pass_repository(&self) -> InMemoryAccessPassRepository {
        InMemoryAccessPassRepository {
            state: self.state.clone(),
        }
    }

    /// Count of grants a user holds, any status. Test helper.
    pub fn grant_count_for_user(&self, user_id: &UserId) -> usize {
        self.state
            .lock()
            .unwrap()
            .grants
            .values()
            .filter(|g| &g.user_id == user_id)
            .count()
    }
}

impl Default for InMemoryEntitlementStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccessPassRepository for InMemoryAccessPassRepository {
    async fn save(&self, pass: &AccessPass) -> Result<(), DomainError> {
        let mut state = self.state.lock().unwrap();
        if state
            .passes
            .values()
            .any(|p| p.space_id == pass.space_id && p.slug == pass.slug && p.id != pass.id)
        {
            return Err(DomainError::new(
                ErrorCode::ValidationFailed,
                format!("Slug '{}' already used in this space", pass.slug),
            ));
        }
        state.passes.insert(pass.id, pass.clone());
        Ok(())
    }

    async fn update(&self, pass: &AccessPass) -> Result<(), DomainError> {
        let mut state = self.state.lock().unwrap();
        if !state.passes.contains_key(&pass.id) {
            return Err(DomainError::new(
                ErrorCode::AccessPassNotFound,
                "Access pass not found",
            ));
        }
        state.passes.insert(pass.id, pass.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &AccessPassId) -> Result<Option<AccessPass>, DomainError> {
        Ok(self.state.lock().unwrap().passes.get(id).cloned())
    }

    async fn find_by_slug(
        &self,
        space_id: &SpaceId,
        slug: &str,
    ) -> Result<Option<AccessPass>, DomainError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .passes
            .values()
            .find(|p| &p.space_id == space_id && p.slug == slug)
            .cloned())
    }
}

#[async_trait]
impl EntitlementStore for InMemoryEntitlementStore {
    async fn create_purchase(&self, purchase: &Purchase) -> Result<(), DomainError> {
        let mut state = self.state.lock().unwrap();
        state.purchases.insert(purchase.id, purchase.clone());
        Ok(())
    }

    async fn update_purchase(&self, purchase: &Purchase) -> Result<(), DomainError> {
        let mut state = self.state.lock().unwrap();
        if !state.purchases.contains_key(&purchase.id) {
            return Err(DomainError::new(
                ErrorCode::PurchaseNotFound,
                "Purchase not found",
            ));
        }
        state.purchases.insert(purchase.id, purchase.clone());
        Ok(())
    }

    async fn find_purchase(&self, id: &PurchaseId) -> Result<Option<Purchase>, DomainError> {
        Ok(self.state.lock().unwrap().purchases.get(id).cloned())
    }

    async fn find_purchase_by_reference(
        &self,
        external_reference: &str,
    ) -> Result<Option<Purchase>, DomainError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .purchases
            .values()
            .find(|p| p.external_reference.as_deref() == Some(external_reference))
            .cloned())
    }

    async fn complete_purchase_with_grant(
        &self,
        purchase: &Purchase,
        grant: &AccessGrant,
    ) -> Result<CompletionOutcome, DomainError> {
        let mut state = self.state.lock().unwrap();

        if purchase.status != PurchaseStatus::Completed {
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                "Purchase must be completed before granting",
            ));
        }

        // Uniqueness on the external reference: paid flows key on the
        // gateway reference, free flows on (user, pass) among active grants.
        match &purchase.external_reference {
            Some(reference) => {
                if state.granted_references.contains_key(reference) {
                    return Ok(CompletionOutcome::AlreadyGranted);
                }
            }
            None => {
                let duplicate = state.grants.values().any(|g| {
                    g.user_id == grant.user_id
                        && g.access_pass_id == grant.access_pass_id
                        && g.status == GrantStatus::Active
                });
                if duplicate {
                    return Ok(CompletionOutcome::AlreadyGranted);
                }
            }
        }

        // Conditional stock decrement (compare-and-swap under the lock).
        if let Some(pass) = state.passes.get_mut(&purchase.access_pass_id) {
            if let Some(limit) = pass.stock_limit {
                if pass.active_grants_count >= limit && !pass.waitlist_enabled {
                    return Ok(CompletionOutcome::SoldOut);
                }
            }
            pass.active_grants_count += 1;
        }

        state.purchases.insert(purchase.id, purchase.clone());
        state.grants.insert(grant.id, grant.clone());
        if let Some(reference) = &purchase.external_reference {
            state
                .granted_references
                .insert(reference.clone(), purchase.id);
        }

        Ok(CompletionOutcome::Granted)
    }

    async fn find_grants_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<AccessGrant>, DomainError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .grants
            .values()
            .filter(|g| &g.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn find_grant(&self, id: &AccessGrantId) -> Result<Option<AccessGrant>, DomainError> {
        Ok(self.state.lock().unwrap().grants.get(id).cloned())
    }

    async fn find_grant_by_purchase(
        &self,
        purchase_id: &PurchaseId,
    ) -> Result<Option<AccessGrant>, DomainError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .grants
            .values()
            .find(|g| &g.purchase_id == purchase_id)
            .cloned())
    }

    async fn update_grant(&self, grant: &AccessGrant) -> Result<(), DomainError> {
        let mut state = self.state.lock().unwrap();
        let previous = state.grants.insert(grant.id, grant.clone()).ok_or_else(|| {
            DomainError::new(ErrorCode::GrantNotFound, "Grant not found")
        })?;

        // Release the counter when a grant leaves the active state.
        let left_active =
            previous.status == GrantStatus::Active && grant.status != GrantStatus::Active;
        if left_active {
            if let Some(pass) = state.passes.get_mut(&grant.access_pass_id) {
                pass.active_grants_count = pass.active_grants_count.saturating_sub(1);
            }
        }
        Ok(())
    }

    async fn mark_expired_grants(&self, now: Timestamp) -> Result<u64, DomainError> {
        let mut state = self.state.lock().unwrap();
        let mut marked = 0u64;
        let expired_ids: Vec<AccessGrantId> = state
            .grants
            .values()
            .filter(|g| {
                g.status == GrantStatus::Active
                    && g.expires_at.map(|e| e.is_before(&now)).unwrap_or(false)
            })
            .map(|g| g.id)
            .collect();

        for id in expired_ids {
            let pass_id = state.grants[&id].access_pass_id;
            if let Some(grant) = state.grants.get_mut(&id) {
                if grant.expire().is_ok() {
                    marked += 1;
                }
            }
            if let Some(pass) = state.passes.get_mut(&pass_id) {
                pass.active_grants_count = pass.active_grants_count.saturating_sub(1);
            }
        }
        Ok(marked)
    }
}
