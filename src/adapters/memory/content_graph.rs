//! In-memory ContentHierarchy implementation.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::domain::foundation::{DomainError, ExperienceId, SpaceId, StreamId, TeamId};
use crate::ports::ContentHierarchy;

/// In-memory content hierarchy for tests and local development.
///
/// Built up with `add_*` methods; parent links are immutable once added,
/// matching the static nature of the real hierarchy.
#[derive(Default)]
pub struct InMemoryContentGraph {
    teams: Mutex<Vec<TeamId>>,
    spaces: Mutex<HashMap<SpaceId, TeamId>>,
    experiences: Mutex<HashMap<ExperienceId, SpaceId>>,
    streams: Mutex<HashMap<StreamId, ExperienceId>>,
}

impl InMemoryContentGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_team(&self, team_id: TeamId) {
        self.teams.lock().unwrap().push(team_id);
    }

    pub fn add_space(&self, space_id: SpaceId, team_id: TeamId) {
        self.spaces.lock().unwrap().insert(space_id, team_id);
    }

    pub fn add_experience(&self, experience_id: ExperienceId, space_id: SpaceId) {
        self.experiences
            .lock()
            .unwrap()
            .insert(experience_id, space_id);
    }

    pub fn add_stream(&self, stream_id: StreamId, experience_id: ExperienceId) {
        self.streams.lock().unwrap().insert(stream_id, experience_id);
    }
}

#[async_trait]
impl ContentHierarchy for InMemoryContentGraph {
    async fn experience_of_stream(
        &self,
        stream_id: &StreamId,
    ) -> Result<Option<ExperienceId>, DomainError> {
        Ok(self.streams.lock().unwrap().get(stream_id).copied())
    }

    async fn space_of_experience(
        &self,
        experience_id: &ExperienceId,
    ) -> Result<Option<SpaceId>, DomainError> {
        Ok(self.experiences.lock().unwrap().get(experience_id).copied())
    }

    async fn team_of_space(&self, space_id: &SpaceId) -> Result<Option<TeamId>, DomainError> {
        Ok(self.spaces.lock().unwrap().get(space_id).copied())
    }

    async fn team_exists(&self, team_id: &TeamId) -> Result<bool, DomainError> {
        Ok(self.teams.lock().unwrap().contains(team_id))
    }
}
