//! Realtime wire protocol: the message envelope and its tagged payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{OrderState, Quote, ThreadMessage};

/// Envelope wrapping every frame in both directions.
///
/// The payload is flattened, so on the wire a frame looks like
/// `{"id": "...", "type": "message.new", "data": {...}, "ts": "...", "correlationId": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WsEnvelope<T> {
    pub id: String,
    #[serde(flatten)]
    pub payload: T,
    pub ts: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl<T> WsEnvelope<T> {
    pub fn new(payload: T) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            payload,
            ts: Utc::now(),
            correlation_id: None,
        }
    }

    pub fn with_correlation(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }
}

/// Commands the client sends over the realtime channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ClientCommand {
    Subscribe {
        thread_id: String,
    },
    Unsubscribe {
        thread_id: String,
    },
    #[serde(rename = "message.create")]
    MessageCreate {
        thread_id: String,
        body: String,
        nonce: String,
    },
}

/// Events the server pushes to the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    /// A supplier submitted a quote on one of the buyer's RFQs.
    #[serde(rename = "quote.received")]
    QuoteReceived { rfq_id: String, quote: Quote },
    /// An order the session participates in changed state.
    #[serde(rename = "order.status")]
    OrderStatus {
        order_id: String,
        status: OrderState,
    },
    /// A new message in a subscribed negotiation thread.
    #[serde(rename = "message.new")]
    MessageNew {
        thread_id: String,
        message: ThreadMessage,
    },
    Ack {
        nonce: String,
        message_id: String,
    },
    Error {
        code: String,
        message: String,
        correlation_id: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_event_round_trips_with_tag_and_data() {
        let json = r#"{
            "id": "e-1",
            "type": "order.status",
            "data": { "orderId": "o-7", "status": "shipped" },
            "ts": "2026-03-01T12:00:00Z"
        }"#;
        let env: WsEnvelope<ServerEvent> = serde_json::from_str(json).unwrap();
        assert_eq!(env.id, "e-1");
        assert_eq!(
            env.payload,
            ServerEvent::OrderStatus {
                order_id: "o-7".into(),
                status: OrderState::Shipped,
            }
        );
        assert!(env.correlation_id.is_none());
    }

    #[test]
    fn client_command_serializes_tagged() {
        let env = WsEnvelope::new(ClientCommand::Subscribe {
            thread_id: "t-1".into(),
        })
        .with_correlation("c-9");
        let value = serde_json::to_value(&env).unwrap();
        assert_eq!(value["type"], "subscribe");
        assert_eq!(value["data"]["threadId"], "t-1");
        assert_eq!(value["correlationId"], "c-9");
    }

    #[test]
    fn unknown_event_type_fails_to_parse() {
        let json = r#"{"id":"e-2","type":"totally.unknown","data":{},"ts":"2026-03-01T12:00:00Z"}"#;
        assert!(serde_json::from_str::<WsEnvelope<ServerEvent>>(json).is_err());
    }
}
