//! In-memory adapter implementations.
//!
//! Used by tests and local development. The entitlement store mirrors the
//! transactional guarantees the postgres adapter gets from constraints:
//! one mutex guards the whole store, so completion is atomic by
//! construction.

mod content_graph;
mod entitlement_store;
mod membership_directory;
mod user_directory;
mod webhook_event_repository;

pub use content_graph::InMemoryContentGraph;
pub use entitlement_store::{InMemoryAccessPassRepository, InMemoryEntitlementStore};
pub use membership_directory::InMemoryMembershipDirectory;
pub use user_directory::InMemoryUserDirectory;
pub use webhook_event_repository::InMemoryWebhookEventRepository;
