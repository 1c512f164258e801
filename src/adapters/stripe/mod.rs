//! Stripe payment gateway adapter.
//!
//! Implements the `PaymentGateway` port against the Stripe HTTP API, plus
//! a configurable mock for tests.

mod mock_gateway;
mod stripe_gateway;
mod wire_types;

pub use mock_gateway::MockPaymentGateway;
pub use stripe_gateway::{StripeConfig, StripeGateway};
