//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Payment Ports
//!
//! - `PaymentGateway` - External payment processor primitives
//!
//! ## Persistence Ports
//!
//! - `EntitlementStore` - Purchase and AccessGrant records (the single
//!   source of truth for "has this purchase produced a grant")
//! - `AccessPassRepository` - Catalog persistence
//! - `WebhookEventRepository` - Gateway webhook idempotency tracking
//!
//! ## Collaborator Ports
//!
//! - `MembershipDirectory` - Team role lookup and buyer-role assurance
//! - `ContentHierarchy` - Parent links in the ownership hierarchy
//! - `UserDirectory` - Email and gateway-customer persistence

mod access_pass_repository;
mod content_hierarchy;
mod entitlement_store;
mod membership_directory;
mod payment_gateway;
mod user_directory;
mod webhook_event_repository;

pub use access_pass_repository::AccessPassRepository;
pub use content_hierarchy::ContentHierarchy;
pub use entitlement_store::{CompletionOutcome, EntitlementStore};
pub use membership_directory::{ensure_buyer_membership, MembershipDirectory};
pub use payment_gateway::{
    CreateCustomerRequest, CreatePaymentIntentRequest, CreatePriceRequest,
    CreateSubscriptionRequest, Customer, GatewayPrice, GatewayProduct, GatewaySubscription,
    PaymentError, PaymentErrorCode, PaymentGateway, PaymentIntent, PaymentIntentStatus,
    PurchaseMetadata, SetupIntent, SubscriptionStatus,
};
pub use user_directory::UserDirectory;
pub use webhook_event_repository::{
    SaveResult, WebhookEventRecord, WebhookEventRepository, WebhookResult,
};
