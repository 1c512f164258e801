//! MembershipDirectory port - the team/role collaborator.
//!
//! Team management itself is out of scope; this port is the narrow
//! surface the entitlement core needs from it: role lookup for the
//! structural access bypass, and buyer-role assurance on purchase.

use async_trait::async_trait;

use crate::domain::content::TeamRole;
use crate::domain::foundation::{DomainError, TeamId, UserId};

/// Port for the membership/role store.
#[async_trait]
pub trait MembershipDirectory: Send + Sync {
    /// The user's role on a team, if any.
    async fn role_of(
        &self,
        user_id: &UserId,
        team_id: &TeamId,
    ) -> Result<Option<TeamRole>, DomainError>;

    /// Add a member with the given role.
    ///
    /// Callers must not use this to downgrade: check `role_of` first and
    /// skip when any membership already exists.
    async fn add_member(
        &self,
        user_id: &UserId,
        team_id: &TeamId,
        role: TeamRole,
    ) -> Result<(), DomainError>;
}

/// Ensure the user holds at least a buyer membership on the team.
///
/// Skips entirely if any membership exists - existing roles are never
/// downgraded. Safe to call twice; the second call is a no-op.
pub async fn ensure_buyer_membership(
    directory: &dyn MembershipDirectory,
    user_id: &UserId,
    team_id: &TeamId,
) -> Result<(), DomainError> {
    if directory.role_of(user_id, team_id).await?.is_some() {
        return Ok(());
    }
    directory.add_member(user_id, team_id, TeamRole::Buyer).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct InMemoryDirectory {
        roles: Mutex<HashMap<(String, TeamId), TeamRole>>,
        add_calls: Mutex<u32>,
    }

    impl InMemoryDirectory {
        fn new() -> Self {
            Self {
                roles: Mutex::new(HashMap::new()),
                add_calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl MembershipDirectory for InMemoryDirectory {
        async fn role_of(
            &self,
            user_id: &UserId,
            team_id: &TeamId,
        ) -> Result<Option<TeamRole>, DomainError> {
            Ok(self
                .roles
                .lock()
                .unwrap()
                .get(&(user_id.to_string(), *team_id))
                .copied())
        }

        async fn add_member(
            &self,
            user_id: &UserId,
            team_id: &TeamId,
            role: TeamRole,
        ) -> Result<(), DomainError> {
            *self.add_calls.lock().unwrap() += 1;
            self.roles
                .lock()
                .unwrap()
                .insert((user_id.to_string(), *team_id), role);
            Ok(())
        }
    }

    #[tokio::test]
    async fn ensure_buyer_adds_role_for_new_member() {
        let directory = InMemoryDirectory::new();
        let user = UserId::new("buyer-1").unwrap();
        let team = TeamId::new();

        ensure_buyer_membership(&directory, &user, &team)
            .await
            .unwrap();

        assert_eq!(
            directory.role_of(&user, &team).await.unwrap(),
            Some(TeamRole::Buyer)
        );
    }

    #[tokio::test]
    async fn ensure_buyer_is_idempotent() {
        let directory = InMemoryDirectory::new();
        let user = UserId::new("buyer-1").unwrap();
        let team = TeamId::new();

        ensure_buyer_membership(&directory, &user, &team)
            .await
            .unwrap();
        ensure_buyer_membership(&directory, &user, &team)
            .await
            .unwrap();

        assert_eq!(*directory.add_calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn ensure_buyer_never_downgrades_staff() {
        let directory = InMemoryDirectory::new();
        let user = UserId::new("the-owner").unwrap();
        let team = TeamId::new();
        directory
            .add_member(&user, &team, TeamRole::Owner)
            .await
            .unwrap();

        ensure_buyer_membership(&directory, &user, &team)
            .await
            .unwrap();

        assert_eq!(
            directory.role_of(&user, &team).await.unwrap(),
            Some(TeamRole::Owner)
        );
    }
}
