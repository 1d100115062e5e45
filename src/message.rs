//! Message protocol definitions
//!
//! JSON-based bidirectional event protocol using Serde's tagged enum
//! for type-safe serialization/deserialization, plus the chat message
//! model shared by the dispatcher, the store, and the HTTP interface.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ConnectionId, MessageId};

/// Per-message reaction state: emoji -> users who reacted, dedup'd.
///
/// BTreeMap keeps emoji order deterministic; the user list keeps
/// first-reaction order.
pub type ReactionMap = BTreeMap<String, Vec<ConnectionId>>;

/// File descriptor carried by file messages
///
/// `data` is an opaque base64 blob; the server passes it through
/// untouched (transport encoding is the client's concern).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePayload {
    pub name: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub data: String,
}

/// Message body: text content or a file descriptor, mutually exclusive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Text { message: String },
    File { file: FilePayload },
}

/// Where a message is addressed: a room, or one recipient connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Destination {
    Room { room: String },
    Direct { to: ConnectionId },
}

/// A chat message, immutable once created
///
/// `sender` is a username snapshot taken at send time; the record
/// outlives its author's connection. `payload` and `destination` are
/// flattened so the wire shape matches the flat message objects
/// clients already consume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub sender: String,
    pub sender_id: ConnectionId,
    #[serde(flatten)]
    pub payload: Payload,
    #[serde(flatten)]
    pub destination: Destination,
    pub is_private: bool,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// The room this message belongs to, if room-addressed
    pub fn room(&self) -> Option<&str> {
        match &self.destination {
            Destination::Room { room } => Some(room),
            Destination::Direct { .. } => None,
        }
    }

    /// The recipient connection, if privately addressed
    pub fn recipient(&self) -> Option<ConnectionId> {
        match &self.destination {
            Destination::Room { .. } => None,
            Destination::Direct { to } => Some(*to),
        }
    }
}

/// Presence entry broadcast in `user_list` and served by `/api/users`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: ConnectionId,
    pub username: String,
    pub room: String,
}

/// Local-write acknowledgment for a room message
///
/// Confirms the message was persisted and fanned out. Not a receipt
/// from recipients; that is the seen tracker's concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryAck {
    pub delivered: bool,
    pub message_id: MessageId,
}

/// Client → Server event
///
/// All events from client to server. Uses tagged enum with snake_case naming.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Register identity (required before any other event takes effect)
    Join { username: String },
    /// Send a text message to the current room (acknowledged)
    RoomMessage { message: String },
    /// Send a text message to one recipient connection
    PrivateMessage { to: ConnectionId, message: String },
    /// Send a file to the current room
    RoomFile { file: FilePayload },
    /// Send a file to one recipient connection
    PrivateFile { to: ConnectionId, file: FilePayload },
    /// Create a room by name (idempotent)
    CreateRoom { name: String },
    /// Switch to a room, creating it on demand
    JoinRoom { name: String },
    /// Typing indicator on/off
    Typing { is_typing: bool },
    /// React to a message with an emoji
    AddReaction {
        message_id: MessageId,
        emoji: String,
        user_id: ConnectionId,
    },
    /// Acknowledge having viewed a message
    MessageSeen {
        message_id: MessageId,
        user_id: ConnectionId,
        room: Option<String>,
    },
}

/// Server → Client event
///
/// All events from server to client. Uses tagged enum with snake_case naming.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Connection successful, connection ID issued
    Connected { connection_id: ConnectionId },
    /// Full presence snapshot
    UserList { users: Vec<UserInfo> },
    /// A user joined the chat
    UserJoined { username: String, id: ConnectionId },
    /// A user disconnected
    UserLeft { username: String, id: ConnectionId },
    /// Full room directory listing
    RoomList { rooms: Vec<String> },
    /// Room message delivered to its audience
    ReceiveMessage { message: ChatMessage },
    /// Private message delivered to both parties
    PrivateMessage { message: ChatMessage },
    /// Full typing snapshot
    TypingUsers { users: Vec<String> },
    /// Complete reaction state for one message
    ReactionUpdate {
        message_id: MessageId,
        reactions: ReactionMap,
    },
    /// Updated seen set for one message
    MessageSeenUpdate {
        message_id: MessageId,
        seen_by: Vec<ConnectionId>,
    },
    /// Local-write acknowledgment for a room message
    MessageAck {
        delivered: bool,
        message_id: MessageId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DEFAULT_ROOM;

    fn text_message(id: u64, room: &str) -> ChatMessage {
        ChatMessage {
            id: MessageId(id),
            sender: "Alice".to_string(),
            sender_id: ConnectionId::new(),
            payload: Payload::Text {
                message: "hi".to_string(),
            },
            destination: Destination::Room {
                room: room.to_string(),
            },
            is_private: false,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_client_event_deserialize() {
        let json = r#"{"type": "join", "username": "Alice"}"#;
        let event: ClientEvent = serde_json::from_str(json).unwrap();
        match event {
            ClientEvent::Join { username } => assert_eq!(username, "Alice"),
            _ => panic!("Wrong variant"),
        }
    }

    #[test]
    fn test_typing_event_deserialize() {
        let json = r#"{"type": "typing", "is_typing": true}"#;
        let event: ClientEvent = serde_json::from_str(json).unwrap();
        match event {
            ClientEvent::Typing { is_typing } => assert!(is_typing),
            _ => panic!("Wrong variant"),
        }
    }

    #[test]
    fn test_reaction_event_deserialize() {
        let user = ConnectionId::new();
        let json = format!(
            r#"{{"type": "add_reaction", "message_id": 7, "emoji": "👍", "user_id": "{user}"}}"#
        );
        let event: ClientEvent = serde_json::from_str(&json).unwrap();
        match event {
            ClientEvent::AddReaction {
                message_id,
                emoji,
                user_id,
            } => {
                assert_eq!(message_id, MessageId(7));
                assert_eq!(emoji, "👍");
                assert_eq!(user_id, user);
            }
            _ => panic!("Wrong variant"),
        }
    }

    #[test]
    fn test_message_flattens_room_and_text() {
        let message = text_message(1, DEFAULT_ROOM);
        let json = serde_json::to_string(&ServerEvent::ReceiveMessage { message }).unwrap();
        assert!(json.contains("\"type\":\"receive_message\""));
        assert!(json.contains("\"room\":\"general\""));
        assert!(json.contains("\"message\":\"hi\""));
        assert!(json.contains("\"is_private\":false"));
    }

    #[test]
    fn test_file_payload_round_trip() {
        let json = r#"{"name": "cat.png", "type": "image/png", "data": "aGVsbG8="}"#;
        let file: FilePayload = serde_json::from_str(json).unwrap();
        assert_eq!(file.mime_type, "image/png");
        let back = serde_json::to_string(&file).unwrap();
        assert!(back.contains("\"type\":\"image/png\""));
    }

    #[test]
    fn test_private_message_carries_recipient() {
        let to = ConnectionId::new();
        let message = ChatMessage {
            destination: Destination::Direct { to },
            is_private: true,
            ..text_message(2, DEFAULT_ROOM)
        };
        assert_eq!(message.room(), None);
        assert_eq!(message.recipient(), Some(to));
        let json = serde_json::to_string(&message).unwrap();
        assert!(json.contains(&format!("\"to\":\"{to}\"")));
    }

    #[test]
    fn test_message_deserialize_round_trip() {
        let message = text_message(3, "rust");
        let json = serde_json::to_string(&message).unwrap();
        let back: ChatMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, message);
    }
}
