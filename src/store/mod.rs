//! Interfaces to the external collaborators: identity, conversation and
//! message storage. The core only ever talks to these traits; expected
//! not-found conditions are `Ok(None)`, never errors.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::model::{Conversation, ConversationKey, Identity, NewMessage, StoredMessage};

#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<Identity>, StoreError>;

    /// Persist a presence flip. Called off the admission/teardown path;
    /// the registry remains the live source of truth either way.
    async fn update_presence(
        &self,
        id: &str,
        is_online: bool,
        last_seen: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<Conversation>, StoreError>;

    /// Look up the non-group conversation for an unordered participant pair.
    async fn find_direct(
        &self,
        key: &ConversationKey,
    ) -> Result<Option<Conversation>, StoreError>;

    /// All conversations the identity participates in. Used to subscribe
    /// a freshly admitted session to its rooms.
    async fn find_for_participant(
        &self,
        identity_id: &str,
    ) -> Result<Vec<Conversation>, StoreError>;

    async fn create(&self, conversation: Conversation) -> Result<Conversation, StoreError>;

    async fn set_last_message(
        &self,
        conversation_id: &str,
        message_id: &str,
    ) -> Result<(), StoreError>;
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<StoredMessage>, StoreError>;

    /// Persist a new message; the store assigns id and timestamp.
    async fn append(&self, message: NewMessage) -> Result<StoredMessage, StoreError>;

    /// Record a read receipt if the reader has none yet. Returns the
    /// (possibly unchanged) message, or None if it does not exist.
    async fn mark_read(
        &self,
        message_id: &str,
        reader_id: &str,
        read_at: DateTime<Utc>,
    ) -> Result<Option<StoredMessage>, StoreError>;
}
