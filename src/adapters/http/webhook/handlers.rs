//! Axum handlers for the gateway webhook endpoint.
//!
//! Returns 2xx only after the event is durably processed or confirmed
//! duplicate, so the gateway's at-least-once delivery can settle.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

use crate::application::handlers::webhook::{
    HandleGatewayWebhookCommand, HandleGatewayWebhookHandler,
};
use crate::ports::{WebhookEventRepository, WebhookResult};

/// Header carrying the gateway's HMAC signature.
const SIGNATURE_HEADER: &str = "stripe-signature";

/// Shared state for the webhook routes.
pub struct WebhookAppState<R: WebhookEventRepository> {
    pub handler: Arc<HandleGatewayWebhookHandler<R>>,
}

impl<R: WebhookEventRepository> Clone for WebhookAppState<R> {
    fn clone(&self) -> Self {
        Self {
            handler: self.handler.clone(),
        }
    }
}

/// POST /gateway - verify, dedupe, and reconcile one webhook delivery.
pub async fn handle_gateway_webhook<R: WebhookEventRepository + 'static>(
    State(state): State<WebhookAppState<R>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(signature) = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
    else {
        return (StatusCode::BAD_REQUEST, "Missing signature header").into_response();
    };

    let cmd = HandleGatewayWebhookCommand {
        payload: body.to_vec(),
        signature: signature.to_string(),
    };

    match state.handler.handle(cmd).await {
        Ok(WebhookResult::Processed) => (StatusCode::OK, "processed").into_response(),
        Ok(WebhookResult::AlreadyProcessed) => (StatusCode::OK, "duplicate").into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Webhook processing failed");
            (e.status_code(), e.to_string()).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::http::webhook::webhook_routes;
    use crate::adapters::memory::{
        InMemoryEntitlementStore, InMemoryMembershipDirectory, InMemoryWebhookEventRepository,
    };
    use crate::application::handlers::webhook::EntitlementReconciler;
    use crate::domain::billing::compute_test_signature;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    const TEST_SECRET: &str = "whsec_http_test";

    fn router() -> axum::Router {
        let store = Arc::new(InMemoryEntitlementStore::new());
        let passes = Arc::new(store.pass_repository());
        let membership = Arc::new(InMemoryMembershipDirectory::new());
        let reconciler = EntitlementReconciler::new(store, passes, membership);

        let handler = Arc::new(HandleGatewayWebhookHandler::new(
            TEST_SECRET,
            InMemoryWebhookEventRepository::new(),
            reconciler,
        ));

        webhook_routes().with_state(WebhookAppState { handler })
    }

    fn event_body(event_id: &str) -> String {
        serde_json::json!({
            "id": event_id,
            "type": "invoice.payment_failed",
            "created": chrono::Utc::now().timestamp(),
            "data": { "object": { "id": "in_1", "subscription": "sub_x" } },
            "livemode": false,
            "api_version": "2023-10-16"
        })
        .to_string()
    }

    fn signed_request(body: &str) -> Request<Body> {
        let timestamp = chrono::Utc::now().timestamp();
        let signature = compute_test_signature(TEST_SECRET, timestamp, body);
        Request::builder()
            .method("POST")
            .uri("/gateway")
            .header(SIGNATURE_HEADER, format!("t={},v1={}", timestamp, signature))
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn valid_event_is_acknowledged() {
        let app = router();
        let body = event_body("evt_http_1");

        let response = app.oneshot(signed_request(&body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn replayed_event_is_acknowledged_as_duplicate() {
        let app = router();
        let body = event_body("evt_http_2");

        let first = app
            .clone()
            .oneshot(signed_request(&body))
            .await
            .unwrap();
        let second = app.oneshot(signed_request(&body)).await.unwrap();

        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(second.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn bad_signature_is_unauthorized() {
        let app = router();
        let body = event_body("evt_http_3");
        let timestamp = chrono::Utc::now().timestamp();

        let request = Request::builder()
            .method("POST")
            .uri("/gateway")
            .header(
                SIGNATURE_HEADER,
                format!("t={},v1={}", timestamp, "a".repeat(64)),
            )
            .body(Body::from(body))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn missing_signature_header_is_bad_request() {
        let app = router();

        let request = Request::builder()
            .method("POST")
            .uri("/gateway")
            .body(Body::from(event_body("evt_http_4")))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
