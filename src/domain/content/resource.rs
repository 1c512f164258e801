//! Resource references and resolved ownership chains.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{ExperienceId, SpaceId, StreamId, TeamId};

/// A reference to any node in the content hierarchy.
///
/// This is the thing an access check is asked about. Streams are the
/// leaves; teams are the roots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Resource {
    Team(TeamId),
    Space(SpaceId),
    Experience(ExperienceId),
    Stream(StreamId),
}

/// The resolved ancestry of a resource, from leaf up to its owning team.
///
/// Built by walking parent links in the `ContentHierarchy` port. The chain
/// is one-directional and terminates at the team, so resolution cannot
/// cycle. For a Team resource only `team` is set; for a Stream resource
/// every level is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnershipChain {
    pub team: TeamId,
    pub space: Option<SpaceId>,
    pub experience: Option<ExperienceId>,
    pub stream: Option<StreamId>,
}

impl OwnershipChain {
    /// Chain for a team itself.
    pub fn for_team(team: TeamId) -> Self {
        Self {
            team,
            space: None,
            experience: None,
            stream: None,
        }
    }

    /// Chain for a space under a team.
    pub fn for_space(team: TeamId, space: SpaceId) -> Self {
        Self {
            team,
            space: Some(space),
            experience: None,
            stream: None,
        }
    }

    /// Chain for an experience under a space.
    pub fn for_experience(team: TeamId, space: SpaceId, experience: ExperienceId) -> Self {
        Self {
            team,
            space: Some(space),
            experience: Some(experience),
            stream: None,
        }
    }

    /// Chain for a stream under an experience.
    pub fn for_stream(
        team: TeamId,
        space: SpaceId,
        experience: ExperienceId,
        stream: StreamId,
    ) -> Self {
        Self {
            team,
            space: Some(space),
            experience: Some(experience),
            stream: Some(stream),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn team_chain_has_no_descendants() {
        let chain = OwnershipChain::for_team(TeamId::new());
        assert!(chain.space.is_none());
        assert!(chain.experience.is_none());
        assert!(chain.stream.is_none());
    }

    #[test]
    fn stream_chain_has_every_level() {
        let chain = OwnershipChain::for_stream(
            TeamId::new(),
            SpaceId::new(),
            ExperienceId::new(),
            StreamId::new(),
        );
        assert!(chain.space.is_some());
        assert!(chain.experience.is_some());
        assert!(chain.stream.is_some());
    }

    #[test]
    fn resource_serializes_with_kind_tag() {
        let resource = Resource::Space(SpaceId::new());
        let json = serde_json::to_string(&resource).unwrap();
        assert!(json.contains("\"kind\":\"space\""));
    }
}
