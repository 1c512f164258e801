//! Entitlement domain module.
//!
//! The durable records of who may access what: purchases (one row per
//! payment attempt) and access grants (the entitlements themselves),
//! plus the pure resolution rules that answer access checks.
//!
//! # Module Structure
//!
//! - `purchase` - Purchase aggregate (audit trail of payment attempts)
//! - `access_grant` - AccessGrant aggregate and its lifecycle
//! - `purchasable` - Closed tagged union over grantable hierarchy nodes
//! - `resolver` - Pure access resolution over the ownership chain

mod access_grant;
mod errors;
mod grant_status;
mod purchasable;
mod purchase;
mod purchase_status;
mod resolver;

pub use access_grant::AccessGrant;
pub use errors::PurchaseError;
pub use grant_status::GrantStatus;
pub use purchasable::Purchasable;
pub use purchase::Purchase;
pub use purchase_status::PurchaseStatus;
pub use resolver::resolve_access;
