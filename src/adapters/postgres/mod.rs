//! PostgreSQL adapter implementations.
//!
//! Persistence for the records this core exclusively owns: purchases,
//! access grants, the pass catalog, and processed webhook events. The
//! collaborator ports (membership, content hierarchy, user directory)
//! belong to other services and have no adapter here.

mod entitlement_store;
mod webhook_event_repository;

pub use entitlement_store::{PostgresAccessPassRepository, PostgresEntitlementStore};
pub use webhook_event_repository::PostgresWebhookEventRepository;
