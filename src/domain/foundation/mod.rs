//! Foundation types shared across the domain.
//!
//! Value objects, identifiers, error types, and the state machine trait
//! used by every other domain module.

mod errors;
mod ids;
mod state_machine;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{
    AccessGrantId, AccessPassId, ExperienceId, PurchaseId, SpaceId, StreamId, TeamId, UserId,
};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
