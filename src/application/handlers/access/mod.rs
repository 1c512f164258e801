//! Entitlement query handlers.

mod check_access;

pub use check_access::{AccessDecision, CheckAccessHandler};
