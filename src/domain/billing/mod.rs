//! Billing domain module.
//!
//! Everything needed to consume the payment gateway's asynchronous
//! lifecycle events safely: payload types, signature verification, and
//! the idempotent processing pipeline.
//!
//! # Module Structure
//!
//! - `gateway_event` - Parsed gateway webhook payloads
//! - `webhook_verifier` - HMAC-SHA256 signature verification
//! - `webhook_processor` - Exactly-once event processing
//! - `webhook_errors` - Error taxonomy with HTTP status mapping

mod gateway_event;
mod webhook_errors;
mod webhook_processor;
mod webhook_verifier;

pub use gateway_event::{GatewayEvent, GatewayEventData, GatewayEventType};
pub use webhook_errors::WebhookError;
pub use webhook_processor::{IdempotentWebhookProcessor, WebhookDispatcher, WebhookEventHandler};
pub use webhook_verifier::{GatewayWebhookVerifier, SignatureHeader};

#[cfg(test)]
pub use gateway_event::GatewayEventBuilder;
#[cfg(test)]
pub use webhook_verifier::compute_test_signature;
