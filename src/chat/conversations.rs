//! Conversation creation. Direct (1:1) conversations are deduplicated per
//! unordered participant pair: concurrent create requests from either
//! side serialize on a per-pair lock, so at most one conversation ever
//! exists for a pair. Group creation has no dedup requirement.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::timeout;
use uuid::Uuid;

use crate::config::CoreConfig;
use crate::error::{ChatError, EventError};
use crate::events::{ConversationPayload, ServerEvent};
use crate::model::{Conversation, ConversationKey, Identity};
use crate::rooms::RoomMembership;
use crate::session::lifecycle::Session;
use crate::session::registry::ConnectionRegistry;
use crate::state::CoreState;
use crate::store::{ConversationStore, IdentityStore};

/// Result of a get-or-create: the conversation, populated participant
/// snapshots, and whether this call created it.
#[derive(Debug)]
pub struct ConversationOutcome {
    pub conversation: Conversation,
    pub participants: Vec<Identity>,
    pub created: bool,
}

pub struct ConversationCoordinator {
    conversations: Arc<dyn ConversationStore>,
    identities: Arc<dyn IdentityStore>,
    registry: Arc<ConnectionRegistry>,
    rooms: Arc<RoomMembership>,
    /// Per-pair creation locks. Entries are dropped once uncontended so
    /// the map tracks live contention, not pair history.
    locks: DashMap<ConversationKey, Arc<Mutex<()>>>,
    lock_timeout: Duration,
    lock_attempts: u32,
}

impl ConversationCoordinator {
    pub fn new(
        conversations: Arc<dyn ConversationStore>,
        identities: Arc<dyn IdentityStore>,
        registry: Arc<ConnectionRegistry>,
        rooms: Arc<RoomMembership>,
        config: &CoreConfig,
    ) -> Self {
        Self {
            conversations,
            identities,
            registry,
            rooms,
            locks: DashMap::new(),
            lock_timeout: config.create_lock_timeout(),
            lock_attempts: config.create_lock_attempts,
        }
    }

    /// Get or create the direct conversation between two identities.
    /// Membership for every online participant session is synchronized
    /// before this returns; the caller fans the creation event out
    /// afterwards, outside the pair lock.
    pub async fn get_or_create_direct(
        &self,
        identity_a: &str,
        identity_b: &str,
    ) -> Result<ConversationOutcome, ChatError> {
        if identity_a == identity_b {
            return Err(ChatError::EmptyParticipantSet);
        }
        let key = ConversationKey::direct(identity_a, identity_b);
        let participants = self
            .load_participants(&[key.0.clone(), key.1.clone()])
            .await?;

        let outcome = {
            let _guard = self.acquire(&key).await?;

            if let Some(existing) = self.conversations.find_direct(&key).await? {
                ConversationOutcome {
                    conversation: existing,
                    participants,
                    created: false,
                }
            } else {
                let conversation = self
                    .conversations
                    .create(Conversation {
                        id: Uuid::now_v7().to_string(),
                        name: None,
                        is_group: false,
                        participants: vec![key.0.clone(), key.1.clone()],
                        admin: None,
                        last_message: None,
                        created_at: Utc::now(),
                    })
                    .await?;
                self.subscribe_online_participants(&conversation);
                ConversationOutcome {
                    conversation,
                    participants,
                    created: true,
                }
            }
            // Pair lock released here, before any fanout.
        };

        self.locks
            .remove_if(&key, |_, lock| Arc::strong_count(lock) == 1);
        Ok(outcome)
    }

    /// Create a group conversation. Every call creates a new one; the
    /// creator becomes its admin.
    pub async fn create_group(
        &self,
        creator_id: &str,
        participant_ids: &[String],
        name: Option<String>,
    ) -> Result<ConversationOutcome, ChatError> {
        let mut member_ids: Vec<String> = vec![creator_id.to_string()];
        for id in participant_ids {
            if !member_ids.contains(id) {
                member_ids.push(id.clone());
            }
        }
        if member_ids.len() < 2 {
            return Err(ChatError::EmptyParticipantSet);
        }

        let participants = self.load_participants(&member_ids).await?;

        let conversation = self
            .conversations
            .create(Conversation {
                id: Uuid::now_v7().to_string(),
                name,
                is_group: true,
                participants: member_ids,
                admin: Some(creator_id.to_string()),
                last_message: None,
                created_at: Utc::now(),
            })
            .await?;
        self.subscribe_online_participants(&conversation);

        Ok(ConversationOutcome {
            conversation,
            participants,
            created: true,
        })
    }

    /// Acquire the pair lock, retrying a bounded number of times on
    /// contention timeouts before giving up.
    async fn acquire(
        &self,
        key: &ConversationKey,
    ) -> Result<tokio::sync::OwnedMutexGuard<()>, ChatError> {
        let lock = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        for attempt in 1..=self.lock_attempts {
            match timeout(self.lock_timeout, lock.clone().lock_owned()).await {
                Ok(guard) => return Ok(guard),
                Err(_) => {
                    tracing::warn!(attempt, "conversation creation lock contended, retrying");
                }
            }
        }
        Err(ChatError::ConcurrencyConflict)
    }

    async fn load_participants(&self, ids: &[String]) -> Result<Vec<Identity>, ChatError> {
        let mut participants = Vec::with_capacity(ids.len());
        for id in ids {
            let identity = self
                .identities
                .find_by_id(id)
                .await?
                .ok_or_else(|| ChatError::ParticipantNotFound(id.clone()))?;
            participants.push(identity);
        }
        Ok(participants)
    }

    /// Subscribe every active session of every participant to the new
    /// room. Runs before the creation event fans out so no participant
    /// can miss a message sent right after creation.
    fn subscribe_online_participants(&self, conversation: &Conversation) {
        for participant in &conversation.participants {
            for session_id in self.registry.sessions_of(participant) {
                self.rooms.subscribe(session_id, &conversation.id);
            }
        }
    }
}

/// Handle a `create-chat` client event: fold the creator into the
/// participant set, dispatch to the coordinator, then fan the result out.
/// A newly created conversation goes to the whole room; an existing one
/// goes back to the requester only.
pub(crate) async fn handle_create_chat(
    core: &CoreState,
    session: &Session,
    participants: Vec<String>,
    is_group: bool,
    name: Option<String>,
) -> Result<(), EventError> {
    let creator_id = &session.identity().id;
    let mut others: Vec<String> = Vec::new();
    for id in participants {
        if id != *creator_id && !others.contains(&id) {
            others.push(id);
        }
    }
    if others.is_empty() {
        return Err(ChatError::EmptyParticipantSet.into());
    }

    let outcome = if is_group {
        core.coordinator
            .create_group(creator_id, &others, name)
            .await?
    } else {
        if others.len() > 1 {
            return Err(ChatError::InvalidParticipantCount.into());
        }
        core.coordinator
            .get_or_create_direct(creator_id, &others[0])
            .await?
    };

    let event = ServerEvent::ChatCreated(conversation_payload(core, &outcome));
    if outcome.created {
        tracing::info!(
            conversation_id = %outcome.conversation.id,
            is_group = outcome.conversation.is_group,
            "conversation created"
        );
        core.fanout.publish(&outcome.conversation.id, &event);
    } else {
        core.fanout.deliver_to_handle(session.handle(), &event);
    }
    Ok(())
}

/// Build the client-facing conversation payload, participants populated
/// with live online status.
pub(crate) fn conversation_payload(
    core: &CoreState,
    outcome: &ConversationOutcome,
) -> ConversationPayload {
    ConversationPayload {
        id: outcome.conversation.id.clone(),
        name: outcome.conversation.name.clone(),
        is_group: outcome.conversation.is_group,
        participants: outcome
            .participants
            .iter()
            .map(|identity| core.identity_view(identity))
            .collect(),
        admin: outcome.conversation.admin.clone(),
        last_message: None,
        created_at: outcome.conversation.created_at,
    }
}
