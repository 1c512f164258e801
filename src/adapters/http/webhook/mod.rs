//! Gateway webhook HTTP endpoint.

mod handlers;
mod routes;

pub use handlers::WebhookAppState;
pub use routes::webhook_routes;
