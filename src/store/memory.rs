//! In-memory store implementations. These back the integration tests and
//! double as reference semantics for real (database-backed) implementors.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::StoreError;
use crate::model::{
    Conversation, ConversationKey, Identity, NewMessage, ReadReceipt, StoredMessage,
};
use crate::store::{ConversationStore, IdentityStore, MessageStore};

#[derive(Default)]
pub struct MemoryIdentityStore {
    users: DashMap<String, Identity>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an identity (registration is outside the core).
    pub fn insert(&self, identity: Identity) {
        self.users.insert(identity.id.clone(), identity);
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<Identity>, StoreError> {
        Ok(self.users.get(id).map(|entry| entry.value().clone()))
    }

    async fn update_presence(
        &self,
        id: &str,
        is_online: bool,
        last_seen: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if let Some(mut entry) = self.users.get_mut(id) {
            entry.is_online = is_online;
            entry.last_seen = last_seen;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryConversationStore {
    conversations: DashMap<String, Conversation>,
}

impl MemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<Conversation>, StoreError> {
        Ok(self.conversations.get(id).map(|entry| entry.value().clone()))
    }

    async fn find_direct(
        &self,
        key: &ConversationKey,
    ) -> Result<Option<Conversation>, StoreError> {
        let found = self.conversations.iter().find_map(|entry| {
            let conv = entry.value();
            if conv.is_group || conv.participants.len() != 2 {
                return None;
            }
            let candidate =
                ConversationKey::direct(&conv.participants[0], &conv.participants[1]);
            (candidate == *key).then(|| conv.clone())
        });
        Ok(found)
    }

    async fn find_for_participant(
        &self,
        identity_id: &str,
    ) -> Result<Vec<Conversation>, StoreError> {
        Ok(self
            .conversations
            .iter()
            .filter(|entry| entry.value().has_participant(identity_id))
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn create(&self, conversation: Conversation) -> Result<Conversation, StoreError> {
        self.conversations
            .insert(conversation.id.clone(), conversation.clone());
        Ok(conversation)
    }

    async fn set_last_message(
        &self,
        conversation_id: &str,
        message_id: &str,
    ) -> Result<(), StoreError> {
        if let Some(mut entry) = self.conversations.get_mut(conversation_id) {
            entry.last_message = Some(message_id.to_string());
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryMessageStore {
    messages: DashMap<String, StoredMessage>,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<StoredMessage>, StoreError> {
        Ok(self.messages.get(id).map(|entry| entry.value().clone()))
    }

    async fn append(&self, message: NewMessage) -> Result<StoredMessage, StoreError> {
        let stored = StoredMessage {
            id: Uuid::now_v7().to_string(),
            sender: message.sender,
            content: message.content,
            chat: message.chat,
            kind: message.kind,
            read_by: message.read_by,
            created_at: Utc::now(),
        };
        self.messages.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn mark_read(
        &self,
        message_id: &str,
        reader_id: &str,
        read_at: DateTime<Utc>,
    ) -> Result<Option<StoredMessage>, StoreError> {
        let Some(mut entry) = self.messages.get_mut(message_id) else {
            return Ok(None);
        };
        let already_read = entry.read_by.iter().any(|receipt| receipt.user == reader_id);
        if !already_read {
            entry.read_by.push(ReadReceipt {
                user: reader_id.to_string(),
                read_at,
            });
        }
        Ok(Some(entry.value().clone()))
    }
}
