//! The closed set of hierarchy nodes a grant may reference.

use serde::{Deserialize, Serialize};

use crate::domain::content::OwnershipChain;
use crate::domain::foundation::{ExperienceId, SpaceId, TeamId};

/// What an access grant points at: exactly one of Team, Space, or
/// Experience.
///
/// Streams are deliberately absent - access to a stream is always derived
/// from a grant on one of its ancestors. Modeling this as a closed tagged
/// union keeps the cascade-scoping rule a single testable function instead
/// of scattered type checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Purchasable {
    Team(TeamId),
    Space(SpaceId),
    Experience(ExperienceId),
}

impl Purchasable {
    /// Whether a grant on this node covers the resource whose resolved
    /// ancestry is `chain`.
    ///
    /// Scope cascades downward only: a Team grant covers everything under
    /// the team, a Space grant everything under the space, an Experience
    /// grant only that experience and its streams - never siblings.
    pub fn covers(&self, chain: &OwnershipChain) -> bool {
        match self {
            Purchasable::Team(team_id) => *team_id == chain.team,
            Purchasable::Space(space_id) => chain.space == Some(*space_id),
            Purchasable::Experience(experience_id) => chain.experience == Some(*experience_id),
        }
    }

    /// Stable string form of the node kind, used by persistence adapters.
    pub fn kind(&self) -> &'static str {
        match self {
            Purchasable::Team(_) => "team",
            Purchasable::Space(_) => "space",
            Purchasable::Experience(_) => "experience",
        }
    }

    /// The referenced node id as a UUID, used by persistence adapters.
    pub fn id_uuid(&self) -> uuid::Uuid {
        match self {
            Purchasable::Team(id) => *id.as_uuid(),
            Purchasable::Space(id) => *id.as_uuid(),
            Purchasable::Experience(id) => *id.as_uuid(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::StreamId;

    #[test]
    fn team_grant_covers_everything_under_the_team() {
        let team = TeamId::new();
        let space = SpaceId::new();
        let experience = ExperienceId::new();
        let stream = StreamId::new();
        let purchasable = Purchasable::Team(team);

        assert!(purchasable.covers(&OwnershipChain::for_team(team)));
        assert!(purchasable.covers(&OwnershipChain::for_space(team, space)));
        assert!(purchasable.covers(&OwnershipChain::for_experience(team, space, experience)));
        assert!(purchasable.covers(&OwnershipChain::for_stream(team, space, experience, stream)));
    }

    #[test]
    fn team_grant_does_not_cover_other_teams() {
        let purchasable = Purchasable::Team(TeamId::new());
        assert!(!purchasable.covers(&OwnershipChain::for_team(TeamId::new())));
    }

    #[test]
    fn space_grant_covers_descendants_but_not_the_team() {
        let team = TeamId::new();
        let space = SpaceId::new();
        let experience = ExperienceId::new();
        let purchasable = Purchasable::Space(space);

        assert!(purchasable.covers(&OwnershipChain::for_space(team, space)));
        assert!(purchasable.covers(&OwnershipChain::for_experience(team, space, experience)));
        assert!(!purchasable.covers(&OwnershipChain::for_team(team)));
    }

    #[test]
    fn space_grant_does_not_cover_sibling_space() {
        let team = TeamId::new();
        let purchasable = Purchasable::Space(SpaceId::new());
        assert!(!purchasable.covers(&OwnershipChain::for_space(team, SpaceId::new())));
    }

    #[test]
    fn experience_grant_covers_only_that_experience() {
        let team = TeamId::new();
        let space = SpaceId::new();
        let experience = ExperienceId::new();
        let sibling = ExperienceId::new();
        let purchasable = Purchasable::Experience(experience);

        assert!(purchasable.covers(&OwnershipChain::for_experience(team, space, experience)));
        assert!(purchasable.covers(&OwnershipChain::for_stream(
            team,
            space,
            experience,
            StreamId::new()
        )));

        // A sibling experience in the same space is out of scope.
        assert!(!purchasable.covers(&OwnershipChain::for_experience(team, space, sibling)));
        assert!(!purchasable.covers(&OwnershipChain::for_space(team, space)));
    }

    #[test]
    fn purchasable_serializes_with_kind_tag() {
        let json = serde_json::to_string(&Purchasable::Team(TeamId::new())).unwrap();
        assert!(json.contains("\"kind\":\"team\""));
    }
}
