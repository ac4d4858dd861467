//! Socket wire frames.
//!
//! Peers send [`InboundFrame`]s; the relay answers a recipient's socket with
//! a [`DeliveryEnvelope`] per persisted message. The same envelope seeds the
//! string-keyed data payload carried by the mobile push notification.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ConversationId, MessageId, PrincipalId};

/// Peer → server chat frame: `{"to": <principal>, "content": "..."}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundFrame {
    /// Recipient principal.
    pub to: PrincipalId,
    /// Message text.
    pub content: String,
}

impl InboundFrame {
    /// Decode a text frame.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Envelope type tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeType {
    /// A chat message addressed to the receiving principal.
    NewMessage,
}

impl EnvelopeType {
    /// Wire string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NewMessage => "new_message",
        }
    }
}

/// Server → peer delivery frame for a persisted message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryEnvelope {
    /// Persisted message id.
    pub message_id: MessageId,
    /// Conversation the message belongs to.
    pub conversation_id: ConversationId,
    /// Sending principal.
    pub sender_id: PrincipalId,
    /// Message text.
    pub content: String,
    /// Creation time, serialized as RFC 3339.
    pub created_at: DateTime<Utc>,
    /// Always [`EnvelopeType::NewMessage`].
    #[serde(rename = "type")]
    pub kind: EnvelopeType,
    /// Always `false`; kept for client compatibility.
    pub is_duplicate: bool,
}

impl DeliveryEnvelope {
    /// Build the envelope for a freshly persisted message.
    pub fn new_message(
        message_id: MessageId,
        conversation_id: ConversationId,
        sender_id: PrincipalId,
        content: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            message_id,
            conversation_id,
            sender_id,
            content: content.into(),
            created_at,
            kind: EnvelopeType::NewMessage,
            is_duplicate: false,
        }
    }

    /// Serialize to the outbound text frame.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Data payload attached to the push notification for this message.
    pub fn push_data(&self) -> HashMap<String, String> {
        HashMap::from([
            ("type".to_string(), self.kind.as_str().to_string()),
            (
                "conversation_id".to_string(),
                self.conversation_id.to_string(),
            ),
            ("sender_id".to_string(), self.sender_id.to_string()),
            ("message_content".to_string(), self.content.clone()),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> DeliveryEnvelope {
        DeliveryEnvelope::new_message(
            MessageId::new(10),
            ConversationId::new(3),
            PrincipalId::new(1),
            "hello",
            Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
        )
    }

    #[test]
    fn parse_inbound_frame() {
        let frame = InboundFrame::parse(r#"{"to": 2, "content": "hello"}"#).unwrap();
        assert_eq!(frame.to, PrincipalId::new(2));
        assert_eq!(frame.content, "hello");
    }

    #[test]
    fn parse_rejects_missing_recipient() {
        assert!(InboundFrame::parse(r#"{"content": "hello"}"#).is_err());
    }

    #[test]
    fn parse_rejects_non_numeric_recipient() {
        assert!(InboundFrame::parse(r#"{"to": "two", "content": "hi"}"#).is_err());
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(InboundFrame::parse("not json").is_err());
    }

    #[test]
    fn envelope_wire_shape() {
        let json: serde_json::Value = serde_json::from_str(&sample().to_json().unwrap()).unwrap();
        assert_eq!(json["message_id"], 10);
        assert_eq!(json["conversation_id"], 3);
        assert_eq!(json["sender_id"], 1);
        assert_eq!(json["content"], "hello");
        assert_eq!(json["type"], "new_message");
        assert_eq!(json["is_duplicate"], false);
        let created = json["created_at"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(created).is_ok(), "got: {created}");
    }

    #[test]
    fn push_data_carries_message_fields() {
        let data = sample().push_data();
        assert_eq!(data["type"], "new_message");
        assert_eq!(data["conversation_id"], "3");
        assert_eq!(data["sender_id"], "1");
        assert_eq!(data["message_content"], "hello");
        assert_eq!(data.len(), 4);
    }
}
