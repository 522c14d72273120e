//! Domain records shared between the core and the external stores.
//! Serde renames encode the wire contract the transport layer must
//! preserve byte-for-byte with client expectations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One authenticated user as the identity store records it.
/// `is_online`/`last_seen` are mutated only by the session lifecycle;
/// live online status should be read from the connection registry, not
/// from cached snapshots of this record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(rename = "isOnline")]
    pub is_online: bool,
    #[serde(rename = "lastSeen")]
    pub last_seen: DateTime<Utc>,
}

/// Message payload kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    File,
}

impl Default for MessageKind {
    fn default() -> Self {
        MessageKind::Text
    }
}

/// A single read receipt on a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadReceipt {
    pub user: String,
    #[serde(rename = "readAt")]
    pub read_at: DateTime<Utc>,
}

/// A message as the message store records it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    #[serde(rename = "_id")]
    pub id: String,
    pub sender: String,
    pub content: String,
    /// Conversation (room) this message belongs to.
    pub chat: String,
    #[serde(rename = "messageType")]
    pub kind: MessageKind,
    #[serde(rename = "readBy")]
    pub read_by: Vec<ReadReceipt>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// Input to `MessageStore::append`. The store assigns id and timestamp.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub sender: String,
    pub content: String,
    pub chat: String,
    pub kind: MessageKind,
    /// Seeded with the sender's own receipt so the author never shows
    /// their own message as unread.
    pub read_by: Vec<ReadReceipt>,
}

/// A conversation as the conversation store records it. Doubles as the
/// room definition: the conversation id is the fanout addressing key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: Option<String>,
    #[serde(rename = "isGroupChat")]
    pub is_group: bool,
    pub participants: Vec<String>,
    pub admin: Option<String>,
    #[serde(rename = "lastMessage")]
    pub last_message: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn has_participant(&self, identity_id: &str) -> bool {
        self.participants.iter().any(|p| p == identity_id)
    }
}

/// Canonical key for a non-group conversation: the unordered participant
/// pair, stored sorted so (a, b) and (b, a) collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationKey(pub String, pub String);

impl ConversationKey {
    pub fn direct(a: &str, b: &str) -> Self {
        if a <= b {
            Self(a.to_string(), b.to_string())
        } else {
            Self(b.to_string(), a.to_string())
        }
    }
}
