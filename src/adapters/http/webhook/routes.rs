//! Axum router configuration for the webhook endpoint.
//!
//! Separate from any user-facing routes because webhooks carry no user
//! authentication - they are verified by signature instead.

use axum::{routing::post, Router};
use tower_http::trace::TraceLayer;

use crate::ports::WebhookEventRepository;

use super::handlers::{handle_gateway_webhook, WebhookAppState};

/// Create the gateway webhook router.
///
/// # Routes
/// - `POST /gateway` - Handle signed gateway webhooks
pub fn webhook_routes<R: WebhookEventRepository + 'static>() -> Router<WebhookAppState<R>> {
    Router::new()
        .route("/gateway", post(handle_gateway_webhook::<R>))
        .layer(TraceLayer::new_for_http())
}
