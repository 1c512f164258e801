//! AccessPassRepository port - catalog persistence.

use async_trait::async_trait;

use crate::domain::catalog::AccessPass;
use crate::domain::foundation::{AccessPassId, DomainError, SpaceId};

/// Port for storing and retrieving access passes.
#[async_trait]
pub trait AccessPassRepository: Send + Sync {
    /// Persist a new pass.
    async fn save(&self, pass: &AccessPass) -> Result<(), DomainError>;

    /// Update an existing pass.
    async fn update(&self, pass: &AccessPass) -> Result<(), DomainError>;

    /// Find a pass by id.
    async fn find_by_id(&self, id: &AccessPassId) -> Result<Option<AccessPass>, DomainError>;

    /// Find a pass by its slug within a space.
    ///
    /// Slugs are unique per space, enforced by the store.
    async fn find_by_slug(
        &self,
        space_id: &SpaceId,
        slug: &str,
    ) -> Result<Option<AccessPass>, DomainError>;
}
