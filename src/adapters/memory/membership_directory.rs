//! In-memory MembershipDirectory implementation.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::domain::content::TeamRole;
use crate::domain::foundation::{DomainError, TeamId, UserId};
use crate::ports::MembershipDirectory;

/// In-memory membership directory for tests and local development.
#[derive(Default)]
pub struct InMemoryMembershipDirectory {
    roles: Mutex<HashMap<(UserId, TeamId), TeamRole>>,
}

impl InMemoryMembershipDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of memberships held across all teams. Test helper.
    pub fn membership_count(&self) -> usize {
        self.roles.lock().unwrap().len()
    }
}

#[async_trait]
impl MembershipDirectory for InMemoryMembershipDirectory {
    async fn role_of(
        &self,
        user_id: &UserId,
        team_id: &TeamId,
    ) -> Result<Option<TeamRole>, DomainError> {
        Ok(self
            .roles
            .lock()
            .unwrap()
            .get(&(user_id.clone(), *team_id))
            .copied())
    }

    async fn add_member(
        &self,
        user_id: &UserId,
        team_id: &TeamId,
        role: TeamRole,
    ) -> Result<(), DomainError> {
        self.roles
            .lock()
            .unwrap()
            .insert((user_id.clone(), *team_id), role);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn role_round_trips() {
        let directory = InMemoryMembershipDirectory::new();
        let user = UserId::new("staff-1").unwrap();
        let team = TeamId::new();

        assert_eq!(directory.role_of(&user, &team).await.unwrap(), None);

        directory
            .add_member(&user, &team, TeamRole::Moderator)
            .await
            .unwrap();

        assert_eq!(
            directory.role_of(&user, &team).await.unwrap(),
            Some(TeamRole::Moderator)
        );
    }
}
