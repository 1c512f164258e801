//! UserDirectory port - the slice of user storage the core needs.
//!
//! The gateway customer id is persisted on the user the first time a paid
//! flow runs, so one user never ends up with two gateway customers.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, UserId};

/// Port for user profile lookups and gateway-customer persistence.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// The user's email address, needed to create a gateway customer.
    async fn email_of(&self, user_id: &UserId) -> Result<Option<String>, DomainError>;

    /// The user's stored gateway customer id, if one was ever created.
    async fn gateway_customer_id(&self, user_id: &UserId)
        -> Result<Option<String>, DomainError>;

    /// Persist the gateway customer id for reuse on subsequent purchases.
    async fn set_gateway_customer_id(
        &self,
        user_id: &UserId,
        customer_id: &str,
    ) -> Result<(), DomainError>;
}
