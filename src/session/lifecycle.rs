//! Per-connection session lifecycle. Each live connection is represented
//! by one `Session` value owned by its connection worker; every client
//! event arrives as an explicit method call on it, and teardown drives
//! the registry, membership and presence side effects exactly once.

use std::sync::{Arc, Mutex};

use crate::chat::{conversations, messages, presence};
use crate::error::{AuthError, EventError};
use crate::events::{ClientEvent, ServerEvent, TypingPayload};
use crate::model::Identity;
use crate::session::{ConnectionHandle, SessionId};
use crate::state::CoreState;

/// Lifecycle states. `Handshaking` covers authentication (before any
/// registry side effect); a session object only exists once it reached
/// `Active`. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Handshaking,
    Active,
    Closing,
    Closed,
}

/// One authenticated live connection.
pub struct Session {
    core: Arc<CoreState>,
    id: SessionId,
    identity: Identity,
    handle: ConnectionHandle,
    state: Mutex<SessionState>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("identity", &self.identity)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// HANDSHAKING -> ACTIVE (or CLOSED on auth failure).
    ///
    /// On success the connection is admitted into the registry and
    /// subscribed to every room its identity belongs to; if this is the
    /// identity's first live session, an online presence event also
    /// fans out to its rooms. Presence persistence is deferred and never
    /// blocks admission. On failure nothing is registered; the
    /// connection is simply rejected.
    pub(crate) async fn connect(
        core: Arc<CoreState>,
        token: &str,
        handle: ConnectionHandle,
    ) -> Result<Self, AuthError> {
        let identity = match core.credentials.resolve(token).await {
            Ok(identity) => identity,
            Err(err) => {
                tracing::info!(error = %err, "connection rejected");
                return Err(err);
            }
        };

        let session_id = core.registry.admit(&identity.id, handle.clone());

        let conversations = match core.conversations.find_for_participant(&identity.id).await {
            Ok(conversations) => conversations,
            Err(err) => {
                // Roll the admission back rather than leave a session
                // detached from its rooms.
                core.registry.remove(session_id);
                return Err(AuthError::Store(err));
            }
        };
        core.rooms
            .sync_on_connect(session_id, conversations.iter().map(|c| c.id.as_str()));

        let room_ids: Vec<String> = conversations.into_iter().map(|c| c.id).collect();
        if core.registry.sessions_of(&identity.id).len() == 1 {
            presence::presence_changed(&core, &identity.id, true, &room_ids);
        }
        presence::presence_snapshot(&core, session_id, &handle);

        tracing::info!(
            identity_id = %identity.id,
            session_id = %session_id,
            rooms = room_ids.len(),
            "session active"
        );

        Ok(Self {
            core,
            id: session_id,
            identity,
            handle,
            state: Mutex::new(SessionState::Active),
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Identity snapshot taken at authentication time.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn handle(&self) -> &ConnectionHandle {
        &self.handle
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().expect("session state lock")
    }

    fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    /// Dispatch one client-originated event. Any event against a session
    /// that is not ACTIVE is rejected before it can touch the stores or
    /// the fanout engine.
    pub async fn handle_event(&self, event: ClientEvent) -> Result<(), EventError> {
        if !self.is_active() {
            return Err(EventError::SessionNotActive);
        }

        match event {
            ClientEvent::SendMessage {
                chat_id,
                content,
                kind,
            } => messages::send_message(&self.core, self, chat_id, content, kind).await,
            ClientEvent::StartTyping { chat_id } => self.typing(chat_id, true),
            ClientEvent::StopTyping { chat_id } => self.typing(chat_id, false),
            ClientEvent::MarkRead { message_id } => {
                messages::mark_read(&self.core, self, message_id).await
            }
            ClientEvent::CreateChat {
                participants,
                is_group,
                name,
            } => {
                conversations::handle_create_chat(&self.core, self, participants, is_group, name)
                    .await
            }
            ClientEvent::JoinRoom { chat_id } => self.join_room(chat_id).await,
            ClientEvent::LeaveRoom { chat_id } => {
                self.core.rooms.unsubscribe(self.id, &chat_id);
                Ok(())
            }
        }
    }

    /// ACTIVE -> CLOSING -> CLOSED. Idempotent: transport disconnect
    /// signals race with explicit logout, and only the first call tears
    /// down. An offline presence event fans out only when this was the
    /// identity's last session.
    pub fn disconnect(&self) {
        {
            let mut state = self.state.lock().expect("session state lock");
            match *state {
                SessionState::Active => *state = SessionState::Closing,
                SessionState::Handshaking => {
                    *state = SessionState::Closed;
                    return;
                }
                SessionState::Closing | SessionState::Closed => return,
            }
        }

        // Capture room targets before membership is torn down; the
        // offline event still has to reach this identity's contacts.
        let room_ids = self.core.rooms.rooms_of(self.id);
        self.core.registry.remove(self.id);
        self.core.rooms.drop_session(self.id);

        if !self.core.registry.is_online(&self.identity.id) {
            presence::presence_changed(&self.core, &self.identity.id, false, &room_ids);
        }

        *self.state.lock().expect("session state lock") = SessionState::Closed;
        tracing::info!(
            identity_id = %self.identity.id,
            session_id = %self.id,
            "session closed"
        );
    }

    /// Typing indicators go to everyone in the room except the typist.
    fn typing(&self, chat_id: String, start: bool) -> Result<(), EventError> {
        if !self.core.rooms.is_member(self.id, &chat_id) {
            return Err(EventError::ConversationNotFound);
        }
        let payload = TypingPayload {
            user_id: self.identity.id.clone(),
            chat_id: chat_id.clone(),
        };
        let event = if start {
            ServerEvent::TypingStart(payload)
        } else {
            ServerEvent::TypingStop(payload)
        };
        self.core.fanout.publish_except(&chat_id, &event, self.id);
        Ok(())
    }

    /// Subscribe to a room after validating against the authoritative
    /// membership, preserving the joined-rooms-subset invariant.
    async fn join_room(&self, chat_id: String) -> Result<(), EventError> {
        let conversation = self
            .core
            .conversations
            .find_by_id(&chat_id)
            .await?
            .ok_or(EventError::ConversationNotFound)?;
        if !conversation.has_participant(&self.identity.id) {
            return Err(EventError::ConversationNotFound);
        }
        self.core.rooms.subscribe(self.id, &chat_id);
        Ok(())
    }
}
