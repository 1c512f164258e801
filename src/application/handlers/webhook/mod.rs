//! Webhook reconciliation handlers.

mod handle_gateway_webhook;

pub use handle_gateway_webhook::{
    EntitlementReconciler, HandleGatewayWebhookCommand, HandleGatewayWebhookHandler,
    ReconcilerDispatcher,
};
