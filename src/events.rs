//! Closed event vocabulary for both directions of a connection.
//! The loosely-typed socket payloads of classic chat servers are
//! re-expressed as tagged variants so a handler can only ever see a
//! payload matching its event kind. Tag and field names are part of the
//! client contract and must survive serialization unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Conversation, Identity, MessageKind, ReadReceipt, StoredMessage};

/// Client-originated events, as the transport hands them to
/// `Session::handle_event`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "send-message")]
    SendMessage {
        #[serde(rename = "chatId")]
        chat_id: String,
        content: String,
        #[serde(rename = "messageType", default)]
        kind: MessageKind,
    },

    #[serde(rename = "start-typing")]
    StartTyping {
        #[serde(rename = "chatId")]
        chat_id: String,
    },

    #[serde(rename = "stop-typing")]
    StopTyping {
        #[serde(rename = "chatId")]
        chat_id: String,
    },

    #[serde(rename = "mark-read")]
    MarkRead {
        #[serde(rename = "messageId")]
        message_id: String,
    },

    #[serde(rename = "create-chat")]
    CreateChat {
        participants: Vec<String>,
        #[serde(rename = "isGroupChat", default)]
        is_group: bool,
        #[serde(default)]
        name: Option<String>,
    },

    #[serde(rename = "join-room")]
    JoinRoom {
        #[serde(rename = "chatId")]
        chat_id: String,
    },

    #[serde(rename = "leave-room")]
    LeaveRoom {
        #[serde(rename = "chatId")]
        chat_id: String,
    },
}

/// A message as delivered to clients: the sender is populated with an
/// identity snapshot, unlike the stored record which keeps only the id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePayload {
    #[serde(rename = "_id")]
    pub id: String,
    pub sender: Identity,
    pub content: String,
    pub chat: String,
    #[serde(rename = "messageType")]
    pub kind: MessageKind,
    #[serde(rename = "readBy")]
    pub read_by: Vec<ReadReceipt>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// A conversation as delivered to clients, participants populated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationPayload {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: Option<String>,
    #[serde(rename = "isGroupChat")]
    pub is_group: bool,
    pub participants: Vec<Identity>,
    pub admin: Option<String>,
    #[serde(rename = "lastMessage")]
    pub last_message: Option<StoredMessage>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypingPayload {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "chatId")]
    pub chat_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadPayload {
    #[serde(rename = "messageId")]
    pub message_id: String,
    #[serde(rename = "userId")]
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresencePayload {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "isOnline")]
    pub is_online: bool,
    #[serde(rename = "lastSeen")]
    pub last_seen: DateTime<Utc>,
}

/// Server-originated events, pushed through each session's
/// `ConnectionHandle`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "message-received")]
    MessageReceived(MessagePayload),

    #[serde(rename = "typing-start")]
    TypingStart(TypingPayload),

    #[serde(rename = "typing-stop")]
    TypingStop(TypingPayload),

    #[serde(rename = "message-read")]
    MessageRead(ReadPayload),

    #[serde(rename = "chat-created")]
    ChatCreated(ConversationPayload),

    #[serde(rename = "presence-changed")]
    PresenceChanged(PresencePayload),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(id: &str) -> Identity {
        Identity {
            id: id.to_string(),
            username: format!("user-{id}"),
            email: format!("{id}@example.com"),
            is_online: true,
            last_seen: Utc::now(),
        }
    }

    #[test]
    fn test_message_received_wire_shape() {
        let event = ServerEvent::MessageReceived(MessagePayload {
            id: "m1".to_string(),
            sender: identity("a"),
            content: "hello".to_string(),
            chat: "c1".to_string(),
            kind: MessageKind::Text,
            read_by: vec![],
            created_at: Utc::now(),
        });

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "message-received");
        assert_eq!(value["data"]["_id"], "m1");
        assert_eq!(value["data"]["chat"], "c1");
        assert_eq!(value["data"]["messageType"], "text");
        assert_eq!(value["data"]["sender"]["_id"], "a");
        assert_eq!(value["data"]["sender"]["isOnline"], true);
        assert!(value["data"]["readBy"].is_array());
    }

    #[test]
    fn test_typing_and_read_wire_shape() {
        let typing = ServerEvent::TypingStart(TypingPayload {
            user_id: "a".to_string(),
            chat_id: "c1".to_string(),
        });
        let value = serde_json::to_value(&typing).unwrap();
        assert_eq!(value["event"], "typing-start");
        assert_eq!(value["data"]["userId"], "a");
        assert_eq!(value["data"]["chatId"], "c1");

        let read = ServerEvent::MessageRead(ReadPayload {
            message_id: "m1".to_string(),
            user_id: "b".to_string(),
        });
        let value = serde_json::to_value(&read).unwrap();
        assert_eq!(value["event"], "message-read");
        assert_eq!(value["data"]["messageId"], "m1");
        assert_eq!(value["data"]["userId"], "b");
    }

    #[test]
    fn test_client_event_parses_with_defaults() {
        let event: ClientEvent = serde_json::from_str(
            r#"{"event":"send-message","data":{"chatId":"c1","content":"hi"}}"#,
        )
        .unwrap();
        match event {
            ClientEvent::SendMessage { chat_id, kind, .. } => {
                assert_eq!(chat_id, "c1");
                assert_eq!(kind, MessageKind::Text);
            }
            other => panic!("unexpected event: {other:?}"),
        }

        let event: ClientEvent = serde_json::from_str(
            r#"{"event":"create-chat","data":{"participants":["b"]}}"#,
        )
        .unwrap();
        match event {
            ClientEvent::CreateChat { is_group, name, .. } => {
                assert!(!is_group);
                assert!(name.is_none());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
