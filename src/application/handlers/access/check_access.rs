//! CheckAccessHandler - Query handler answering "can user U access
//! resource R".
//!
//! Assembles the inputs (role, ownership chain, grants) from ports and
//! delegates the decision to the pure `resolve_access` function. Consumed
//! by content-serving code before any chat/video session token is minted.

use std::sync::Arc;

use crate::domain::content::Resource;
use crate::domain::entitlement::resolve_access;
use crate::domain::foundation::{DomainError, ErrorCode, UserId};
use crate::ports::{ContentHierarchy, EntitlementStore, MembershipDirectory};

/// Access decision with the resolved context, for logging and auditing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessDecision {
    pub allowed: bool,
}

/// Handler for entitlement queries.
pub struct CheckAccessHandler {
    hierarchy: Arc<dyn ContentHierarchy>,
    store: Arc<dyn EntitlementStore>,
    membership: Arc<dyn MembershipDirectory>,
}

impl CheckAccessHandler {
    pub fn new(
        hierarchy: Arc<dyn ContentHierarchy>,
        store: Arc<dyn EntitlementStore>,
        membership: Arc<dyn MembershipDirectory>,
    ) -> Self {
        Self {
            hierarchy,
            store,
            membership,
        }
    }

    /// Whether the user may access the resource.
    ///
    /// Read-only: no writes, no gateway calls. Unknown resources resolve
    /// to a denial rather than an error so content-serving code fails
    /// closed.
    pub async fn handle(
        &self,
        user_id: &UserId,
        resource: &Resource,
    ) -> Result<AccessDecision, DomainError> {
        let chain = match self.hierarchy.resolve_chain(resource).await {
            Ok(chain) => chain,
            Err(e) if e.code == ErrorCode::ResourceNotFound => {
                tracing::warn!(?resource, "Access check against unknown resource");
                return Ok(AccessDecision { allowed: false });
            }
            Err(e) => return Err(e),
        };

        let role = self.membership.role_of(user_id, &chain.team).await?;

        // Privileged roles short-circuit before any grant lookup.
        if role.is_some_and(|r| r.is_privileged()) {
            return Ok(AccessDecision { allowed: true });
        }

        let grants = self.store.find_grants_for_user(user_id).await?;
        let allowed = resolve_access(role, &chain, &grants);

        Ok(AccessDecision { allowed })
    }
}
