//! Chat event vocabulary — the named events exchanged with the messaging backend.
//!
//! Event names and payload shapes match the backend exactly; field names are
//! camelCase on the wire. This module only describes the vocabulary: decoding
//! what arrives ([`ServerEvent::decode`]) and encoding what is sent
//! ([`ClientEvent::payload`]). Routing, persistence, and receipts are left to
//! the application.
//!
//! # Examples
//!
//! ```
//! use serde_json::json;
//! use chatlink::protocol::ServerEvent;
//!
//! let event = ServerEvent::decode("typing:start", json!({
//!     "userId": "u1",
//!     "conversationId": "general",
//! })).unwrap();
//! assert_eq!(event.name(), "typing:start");
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;

/// Errors produced while decoding server events.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unknown server event `{0}`")]
    UnknownEvent(String),

    #[error("malformed payload for `{event}`: {source}")]
    Payload {
        event: String,
        #[source]
        source: serde_json::Error,
    },
}

// ── Data models ───────────────────────────────────────────────────────────────

/// What a message carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
    File,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Delivered,
    Read,
}

/// A user's advertised presence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Online,
    Away,
    Busy,
    Offline,
}

/// A chat message as the backend stores it.
///
/// Timestamps are kept as raw JSON because the backend sends either an ISO
/// string or epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub timestamp: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DeliveryStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub participants: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<Message>,
    pub updated_at: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
    pub read: bool,
    pub created_at: Value,
}

// ── Payloads ──────────────────────────────────────────────────────────────────

/// Sent by the backend once it has bound the socket to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedInfo {
    pub user_id: String,
    pub socket_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    pub message_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRef {
    pub conversation_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Typing {
    pub user_id: String,
    pub conversation_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Presence {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedText {
    pub text: String,
}

/// An error reported by the backend over the channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerFault {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Payload of `message:send`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessage {
    pub conversation_id: String,
    pub content: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<MessageKind>,
}

impl SendMessage {
    /// A text message for `conversation_id`.
    pub fn text(conversation_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            content: content.into(),
            kind: Some(MessageKind::Text),
        }
    }
}

// ── Events ────────────────────────────────────────────────────────────────────

/// Events the backend sends to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "connected")]
    Connected(ConnectedInfo),
    #[serde(rename = "message:new")]
    MessageNew(Message),
    #[serde(rename = "message:delivered")]
    MessageDelivered(MessageRef),
    #[serde(rename = "message:read")]
    MessageRead(MessageRef),
    #[serde(rename = "typing:start")]
    TypingStart(Typing),
    #[serde(rename = "typing:stop")]
    TypingStop(Typing),
    #[serde(rename = "user:online")]
    UserOnline(Presence),
    #[serde(rename = "user:offline")]
    UserOffline(UserRef),
    #[serde(rename = "conversation:updated")]
    ConversationUpdated(Conversation),
    #[serde(rename = "conversation:deleted")]
    ConversationDeleted(ConversationRef),
    #[serde(rename = "notification:new")]
    NotificationNew(Notification),
    #[serde(rename = "receive:message")]
    ReceiveMessage(ReceivedText),
    #[serde(rename = "error")]
    Error(ServerFault),
}

impl ServerEvent {
    /// Every event name the backend may send.
    pub const NAMES: [&'static str; 13] = [
        "connected",
        "message:new",
        "message:delivered",
        "message:read",
        "typing:start",
        "typing:stop",
        "user:online",
        "user:offline",
        "conversation:updated",
        "conversation:deleted",
        "notification:new",
        "receive:message",
        "error",
    ];

    /// Decodes an incoming event from its name and payload.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnknownEvent`] for names outside [`NAMES`](Self::NAMES)
    /// and [`ProtocolError::Payload`] when the payload does not match the event.
    pub fn decode(event: &str, payload: Value) -> Result<Self, ProtocolError> {
        if !Self::NAMES.contains(&event) {
            return Err(ProtocolError::UnknownEvent(event.to_owned()));
        }
        serde_json::from_value(json!({ "event": event, "data": payload })).map_err(|source| {
            ProtocolError::Payload {
                event: event.to_owned(),
                source,
            }
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected(_) => "connected",
            Self::MessageNew(_) => "message:new",
            Self::MessageDelivered(_) => "message:delivered",
            Self::MessageRead(_) => "message:read",
            Self::TypingStart(_) => "typing:start",
            Self::TypingStop(_) => "typing:stop",
            Self::UserOnline(_) => "user:online",
            Self::UserOffline(_) => "user:offline",
            Self::ConversationUpdated(_) => "conversation:updated",
            Self::ConversationDeleted(_) => "conversation:deleted",
            Self::NotificationNew(_) => "notification:new",
            Self::ReceiveMessage(_) => "receive:message",
            Self::Error(_) => "error",
        }
    }
}

/// Events the client sends to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "authenticate")]
    Authenticate(String),
    #[serde(rename = "message:send")]
    MessageSend(SendMessage),
    #[serde(rename = "message:read")]
    MessageRead(MessageRef),
    #[serde(rename = "typing:start")]
    TypingStart(ConversationRef),
    #[serde(rename = "typing:stop")]
    TypingStop(ConversationRef),
    #[serde(rename = "conversation:join")]
    ConversationJoin(String),
    #[serde(rename = "conversation:leave")]
    ConversationLeave(String),
    #[serde(rename = "user:status")]
    UserStatus(UserStatus),
    #[serde(rename = "custom:event")]
    Custom(Value),
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Authenticate(_) => "authenticate",
            Self::MessageSend(_) => "message:send",
            Self::MessageRead(_) => "message:read",
            Self::TypingStart(_) => "typing:start",
            Self::TypingStop(_) => "typing:stop",
            Self::ConversationJoin(_) => "conversation:join",
            Self::ConversationLeave(_) => "conversation:leave",
            Self::UserStatus(_) => "user:status",
            Self::Custom(_) => "custom:event",
        }
    }

    /// The wire payload, without the event name.
    pub fn payload(&self) -> Result<Value, serde_json::Error> {
        let mut tagged = serde_json::to_value(self)?;
        Ok(tagged.get_mut("data").map(Value::take).unwrap_or(Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_new_message() {
        let event = ServerEvent::decode(
            "message:new",
            json!({
                "id": "m1",
                "conversationId": "general",
                "senderId": "u1",
                "content": "hi",
                "type": "text",
                "timestamp": 1_700_000_000_000u64,
            }),
        )
        .unwrap();

        let ServerEvent::MessageNew(message) = event else {
            panic!("expected message:new");
        };
        assert_eq!(message.conversation_id, "general");
        assert_eq!(message.kind, MessageKind::Text);
        assert_eq!(message.status, None);
        assert_eq!(message.timestamp, json!(1_700_000_000_000u64));
    }

    #[test]
    fn decodes_conversation_with_last_message() {
        let event = ServerEvent::decode(
            "conversation:updated",
            json!({
                "id": "c1",
                "participants": ["u1", "u2"],
                "lastMessage": {
                    "id": "m9",
                    "conversationId": "c1",
                    "senderId": "u2",
                    "content": "see you",
                    "type": "text",
                    "timestamp": "2025-01-01T10:00:00Z",
                    "status": "read",
                },
                "updatedAt": "2025-01-01T10:00:00Z",
            }),
        )
        .unwrap();

        let ServerEvent::ConversationUpdated(conversation) = event else {
            panic!("expected conversation:updated");
        };
        let last = conversation.last_message.unwrap();
        assert_eq!(last.status, Some(DeliveryStatus::Read));
        assert_eq!(conversation.participants.len(), 2);
    }

    #[test]
    fn decodes_notification_and_error() {
        let event = ServerEvent::decode(
            "notification:new",
            json!({
                "id": "n1",
                "userId": "u1",
                "type": "mention",
                "message": "you were mentioned",
                "data": { "conversationId": "general" },
                "read": false,
                "createdAt": 1,
            }),
        )
        .unwrap();
        assert_eq!(event.name(), "notification:new");

        let event =
            ServerEvent::decode("error", json!({ "message": "rate limited", "code": "E429" }))
                .unwrap();
        assert_eq!(
            event,
            ServerEvent::Error(ServerFault {
                message: "rate limited".into(),
                code: Some("E429".into()),
            })
        );
    }

    #[test]
    fn decodes_receive_message() {
        let event = ServerEvent::decode("receive:message", json!({ "text": "hello" })).unwrap();
        assert_eq!(
            event,
            ServerEvent::ReceiveMessage(ReceivedText {
                text: "hello".into()
            })
        );
    }

    #[test]
    fn unknown_event_is_rejected() {
        let err = ServerEvent::decode("message:edit", Value::Null).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownEvent(ref name) if name == "message:edit"));
    }

    #[test]
    fn malformed_payload_is_rejected() {
        let err = ServerEvent::decode("user:offline", json!({ "id": 7 })).unwrap_err();
        assert!(matches!(err, ProtocolError::Payload { ref event, .. } if event == "user:offline"));
    }

    #[test]
    fn names_cover_every_variant() {
        let event = ServerEvent::UserOffline(UserRef {
            user_id: "u1".into(),
        });
        assert!(ServerEvent::NAMES.contains(&event.name()));
    }

    #[test]
    fn client_payload_strips_event_name() {
        let event = ClientEvent::ConversationJoin("general".into());
        assert_eq!(event.name(), "conversation:join");
        assert_eq!(event.payload().unwrap(), json!("general"));

        let event = ClientEvent::UserStatus(UserStatus::Away);
        assert_eq!(event.payload().unwrap(), json!("away"));
    }

    #[test]
    fn send_message_omits_missing_kind() {
        let event = ClientEvent::MessageSend(SendMessage {
            conversation_id: "general".into(),
            content: "hi".into(),
            kind: None,
        });
        assert_eq!(
            event.payload().unwrap(),
            json!({ "conversationId": "general", "content": "hi" })
        );
    }
}
