//! In-memory UserDirectory implementation.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::domain::foundation::{DomainError, UserId};
use crate::ports::UserDirectory;

/// In-memory user directory for tests and local development.
#[derive(Default)]
pub struct InMemoryUserDirectory {
    emails: Mutex<HashMap<UserId, String>>,
    customer_ids: Mutex<HashMap<UserId, String>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(self, user_id: UserId, email: impl Into<String>) -> Self {
        self.emails.lock().unwrap().insert(user_id, email.into());
        self
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn email_of(&self, user_id: &UserId) -> Result<Option<String>, DomainError> {
        Ok(self.emails.lock().unwrap().get(user_id).cloned())
    }

    async fn gateway_customer_id(
        &self,
        user_id: &UserId,
    ) -> Result<Option<String>, DomainError> {
        Ok(self.customer_ids.lock().unwrap().get(user_id).cloned())
    }

    async fn set_gateway_customer_id(
        &self,
        user_id: &UserId,
        customer_id: &str,
    ) -> Result<(), DomainError> {
        self.customer_ids
            .lock()
            .unwrap()
            .insert(user_id.clone(), customer_id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn customer_id_persists_once_set() {
        let directory =
            InMemoryUserDirectory::new().with_user(UserId::new("u1").unwrap(), "u1@example.com");
        let user = UserId::new("u1").unwrap();

        assert_eq!(directory.gateway_customer_id(&user).await.unwrap(), None);

        directory
            .set_gateway_customer_id(&user, "cus_123")
            .await
            .unwrap();

        assert_eq!(
            directory.gateway_customer_id(&user).await.unwrap(),
            Some("cus_123".to_string())
        );
    }
}
