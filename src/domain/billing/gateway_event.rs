//! Payment gateway webhook event types.
//!
//! Defines the structures for parsing gateway webhook payloads.
//! Only fields relevant to our processing are captured.

use serde::{Deserialize, Serialize};

/// Gateway webhook event (simplified).
///
/// Contains the essential fields needed for webhook processing.
/// Additional fields from the gateway's full event schema are ignored.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayEvent {
    /// Unique identifier for the event (evt_xxx format).
    pub id: String,

    /// Type of event (e.g., "payment_intent.succeeded").
    #[serde(rename = "type")]
    pub event_type: String,

    /// Time at which the event was created (Unix timestamp).
    pub created: i64,

    /// Object containing event-specific data.
    pub data: GatewayEventData,

    /// Whether this is a live mode event (vs test mode).
    pub livemode: bool,

    /// API version used to render this event.
    pub api_version: String,
}

/// Container for event-specific data.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayEventData {
    /// The object that triggered the event (polymorphic based on event type).
    pub object: serde_json::Value,

    /// Previous values for updated attributes (only for update events).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_attributes: Option<serde_json::Value>,
}

impl GatewayEvent {
    /// Returns true if this is a live mode event.
    pub fn is_live(&self) -> bool {
        self.livemode
    }

    /// Attempts to deserialize the data object as the specified type.
    pub fn deserialize_object<T: serde::de::DeserializeOwned>(
        &self,
    ) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.data.object.clone())
    }

    /// Parse the event type into a known enum variant.
    pub fn parsed_type(&self) -> GatewayEventType {
        GatewayEventType::from_str(&self.event_type)
    }
}

/// Known gateway event types that we handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayEventType {
    /// One-time payment settled successfully.
    PaymentIntentSucceeded,
    /// One-time payment definitively failed.
    PaymentIntentFailed,
    /// Subscription invoice paid (first payment or renewal).
    InvoicePaid,
    /// Subscription invoice payment failed.
    InvoicePaymentFailed,
    /// Subscription cancelled or ended.
    SubscriptionDeleted,
    /// Charge refunded.
    ChargeRefunded,
    /// Unknown or unhandled event type.
    Unknown,
}

impl GatewayEventType {
    /// Parse event type from string.
    pub fn from_str(s: &str) -> Self {
        match s {
            "payment_intent.succeeded" => Self::PaymentIntentSucceeded,
            "payment_intent.payment_failed" => Self::PaymentIntentFailed,
            "invoice.paid" => Self::InvoicePaid,
            "invoice.payment_failed" => Self::InvoicePaymentFailed,
            "customer.subscription.deleted" => Self::SubscriptionDeleted,
            "charge.refunded" => Self::ChargeRefunded,
            _ => Self::Unknown,
        }
    }

    /// Convert to the gateway event type string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PaymentIntentSucceeded => "payment_intent.succeeded",
            Self::PaymentIntentFailed => "payment_intent.payment_failed",
            Self::InvoicePaid => "invoice.paid",
            Self::InvoicePaymentFailed => "invoice.payment_failed",
            Self::SubscriptionDeleted => "customer.subscription.deleted",
            Self::ChargeRefunded => "charge.refunded",
            Self::Unknown => "unknown",
        }
    }
}

/// Builder for creating test GatewayEvent instances.
#[cfg(test)]
pub struct GatewayEventBuilder {
    id: String,
    event_type: String,
    created: i64,
    object: serde_json::Value,
    livemode: bool,
    api_version: String,
}

#[cfg(test)]
impl Default for GatewayEventBuilder {
    fn default() -> Self {
        Self {
            id: "evt_test_123".to_string(),
            event_type: "payment_intent.succeeded".to_string(),
            created: chrono::Utc::now().timestamp(),
            object: serde_json::json!({}),
            livemode: false,
            api_version: "2023-10-16".to_string(),
        }
    }
}

#[cfg(test)]
impl GatewayEventBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = event_type.into();
        self
    }

    pub fn object(mut self, object: serde_json::Value) -> Self {
        self.object = object;
        self
    }

    pub fn build(self) -> GatewayEvent {
        GatewayEvent {
            id: self.id,
            event_type: self.event_type,
            created: self.created,
            data: GatewayEventData {
                object: self.object,
                previous_attributes: None,
            },
            livemode: self.livemode,
            api_version: self.api_version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_event_types() {
        assert_eq!(
            GatewayEventType::from_str("payment_intent.succeeded"),
            GatewayEventType::PaymentIntentSucceeded
        );
        assert_eq!(
            GatewayEventType::from_str("invoice.paid"),
            GatewayEventType::InvoicePaid
        );
        assert_eq!(
            GatewayEventType::from_str("customer.subscription.deleted"),
            GatewayEventType::SubscriptionDeleted
        );
    }

    #[test]
    fn unknown_event_types_parse_as_unknown() {
        assert_eq!(
            GatewayEventType::from_str("product.created"),
            GatewayEventType::Unknown
        );
    }

    #[test]
    fn event_type_round_trips() {
        for event_type in [
            GatewayEventType::PaymentIntentSucceeded,
            GatewayEventType::PaymentIntentFailed,
            GatewayEventType::InvoicePaid,
            GatewayEventType::InvoicePaymentFailed,
            GatewayEventType::SubscriptionDeleted,
            GatewayEventType::ChargeRefunded,
        ] {
            assert_eq!(GatewayEventType::from_str(event_type.as_str()), event_type);
        }
    }

    #[test]
    fn event_deserializes_from_gateway_json() {
        let json = serde_json::json!({
            "id": "evt_abc",
            "type": "invoice.paid",
            "created": 1704067200,
            "data": { "object": { "id": "in_123" } },
            "livemode": false,
            "api_version": "2023-10-16"
        });

        let event: GatewayEvent = serde_json::from_value(json).unwrap();
        assert_eq!(event.id, "evt_abc");
        assert_eq!(event.parsed_type(), GatewayEventType::InvoicePaid);
        assert!(!event.is_live());
    }

    #[test]
    fn deserialize_object_extracts_typed_payload() {
        #[derive(Deserialize)]
        struct Invoice {
            id: String,
        }

        let event = GatewayEventBuilder::new()
            .object(serde_json::json!({"id": "in_555"}))
            .build();

        let invoice: Invoice = event.deserialize_object().unwrap();
        assert_eq!(invoice.id, "in_555");
    }
}
