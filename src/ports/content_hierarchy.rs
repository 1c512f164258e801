//! ContentHierarchy port - parent lookups for the ownership hierarchy.
//!
//! The hierarchy Team → Space → Experience → Stream is static data owned
//! by content management (out of scope). Access resolution only needs
//! parent links, walked leaf-upward; the provided `resolve_chain` method
//! composes them into an `OwnershipChain`.

use async_trait::async_trait;

use crate::domain::content::{OwnershipChain, Resource};
use crate::domain::foundation::{
    DomainError, ErrorCode, ExperienceId, SpaceId, StreamId, TeamId,
};

/// Port for looking up parent links in the content hierarchy.
#[async_trait]
pub trait ContentHierarchy: Send + Sync {
    /// The experience a stream belongs to.
    async fn experience_of_stream(
        &self,
        stream_id: &StreamId,
    ) -> Result<Option<ExperienceId>, DomainError>;

    /// The space an experience belongs to.
    async fn space_of_experience(
        &self,
        experience_id: &ExperienceId,
    ) -> Result<Option<SpaceId>, DomainError>;

    /// The team a space belongs to.
    async fn team_of_space(&self, space_id: &SpaceId) -> Result<Option<TeamId>, DomainError>;

    /// Whether a team exists.
    async fn team_exists(&self, team_id: &TeamId) -> Result<bool, DomainError>;

    /// Resolve a resource's full ancestry up to its team.
    ///
    /// The walk is one-directional and terminates at the team, so it
    /// cannot cycle. Returns `ResourceNotFound` if any link is missing.
    async fn resolve_chain(&self, resource: &Resource) -> Result<OwnershipChain, DomainError> {
        match resource {
            Resource::Team(team_id) => {
                if !self.team_exists(team_id).await? {
                    return Err(not_found("team"));
                }
                Ok(OwnershipChain::for_team(*team_id))
            }
            Resource::Space(space_id) => {
                let team_id = self
                    .team_of_space(space_id)
                    .await?
                    .ok_or_else(|| not_found("space"))?;
                Ok(OwnershipChain::for_space(team_id, *space_id))
            }
            Resource::Experience(experience_id) => {
                let space_id = self
                    .space_of_experience(experience_id)
                    .await?
                    .ok_or_else(|| not_found("experience"))?;
                let team_id = self
                    .team_of_space(&space_id)
                    .await?
                    .ok_or_else(|| not_found("space"))?;
                Ok(OwnershipChain::for_experience(
                    team_id,
                    space_id,
                    *experience_id,
                ))
            }
            Resource::Stream(stream_id) => {
                let experience_id = self
                    .experience_of_stream(stream_id)
                    .await?
                    .ok_or_else(|| not_found("stream"))?;
                let space_id = self
                    .space_of_experience(&experience_id)
                    .await?
                    .ok_or_else(|| not_found("experience"))?;
                let team_id = self
                    .team_of_space(&space_id)
                    .await?
                    .ok_or_else(|| not_found("space"))?;
                Ok(OwnershipChain::for_stream(
                    team_id,
                    space_id,
                    experience_id,
                    *stream_id,
                ))
            }
        }
    }
}

fn not_found(kind: &str) -> DomainError {
    DomainError::new(
        ErrorCode::ResourceNotFound,
        format!("Unknown {} in content hierarchy", kind),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FixedHierarchy {
        streams: HashMap<StreamId, ExperienceId>,
        experiences: HashMap<ExperienceId, SpaceId>,
        spaces: HashMap<SpaceId, TeamId>,
    }

    #[async_trait]
    impl ContentHierarchy for FixedHierarchy {
        async fn experience_of_stream(
            &self,
            stream_id: &StreamId,
        ) -> Result<Option<ExperienceId>, DomainError> {
            Ok(self.streams.get(stream_id).copied())
        }

        async fn space_of_experience(
            &self,
            experience_id: &ExperienceId,
        ) -> Result<Option<SpaceId>, DomainError> {
            Ok(self.experiences.get(experience_id).copied())
        }

        async fn team_of_space(
            &self,
            space_id: &SpaceId,
        ) -> Result<Option<TeamId>, DomainError> {
            Ok(self.spaces.get(space_id).copied())
        }

        async fn team_exists(&self, team_id: &TeamId) -> Result<bool, DomainError> {
            Ok(self.spaces.values().any(|t| t == team_id))
        }
    }

    fn fixture() -> (FixedHierarchy, TeamId, SpaceId, ExperienceId, StreamId) {
        let team = TeamId::new();
        let space = SpaceId::new();
        let experience = ExperienceId::new();
        let stream = StreamId::new();

        let hierarchy = FixedHierarchy {
            streams: HashMap::from([(stream, experience)]),
            experiences: HashMap::from([(experience, space)]),
            spaces: HashMap::from([(space, team)]),
        };
        (hierarchy, team, space, experience, stream)
    }

    #[tokio::test]
    async fn resolves_full_chain_for_stream() {
        let (hierarchy, team, space, experience, stream) = fixture();

        let chain = hierarchy
            .resolve_chain(&Resource::Stream(stream))
            .await
            .unwrap();

        assert_eq!(
            chain,
            OwnershipChain::for_stream(team, space, experience, stream)
        );
    }

    #[tokio::test]
    async fn resolves_chain_for_space() {
        let (hierarchy, team, space, _, _) = fixture();

        let chain = hierarchy
            .resolve_chain(&Resource::Space(space))
            .await
            .unwrap();

        assert_eq!(chain, OwnershipChain::for_space(team, space));
    }

    #[tokio::test]
    async fn unknown_stream_is_resource_not_found() {
        let (hierarchy, ..) = fixture();

        let result = hierarchy
            .resolve_chain(&Resource::Stream(StreamId::new()))
            .await;

        assert!(matches!(
            result,
            Err(DomainError {
                code: ErrorCode::ResourceNotFound,
                ..
            })
        ));
    }
}
