//! Room membership: which sessions are subscribed to which conversation
//! rooms. Kept synchronized with the authoritative conversation
//! membership at connect time and whenever a conversation is created.

use std::collections::HashSet;

use dashmap::DashMap;

use crate::session::SessionId;

/// Shared membership table. Two indexes are maintained (room -> sessions
/// and session -> rooms); ops mutate one map at a time and never hold a
/// guard on both, so shard locks cannot deadlock against each other.
#[derive(Default)]
pub struct RoomMembership {
    rooms: DashMap<String, HashSet<SessionId>>,
    by_session: DashMap<SessionId, HashSet<String>>,
}

impl RoomMembership {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a session to a room. Idempotent.
    pub fn subscribe(&self, session_id: SessionId, room_id: &str) {
        self.rooms
            .entry(room_id.to_string())
            .or_default()
            .insert(session_id);
        self.by_session
            .entry(session_id)
            .or_default()
            .insert(room_id.to_string());
    }

    /// Unsubscribe a session from a room. Absent memberships are a no-op.
    pub fn unsubscribe(&self, session_id: SessionId, room_id: &str) {
        if let Some(mut entry) = self.rooms.get_mut(room_id) {
            entry.remove(&session_id);
        }
        self.rooms.remove_if(room_id, |_, members| members.is_empty());

        if let Some(mut entry) = self.by_session.get_mut(&session_id) {
            entry.remove(room_id);
        }
        self.by_session
            .remove_if(&session_id, |_, rooms| rooms.is_empty());
    }

    /// Subscribe a freshly admitted session to every room passed.
    pub fn sync_on_connect<I, S>(&self, session_id: SessionId, room_ids: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for room_id in room_ids {
            self.subscribe(session_id, room_id.as_ref());
        }
    }

    pub fn members_of(&self, room_id: &str) -> Vec<SessionId> {
        self.rooms
            .get(room_id)
            .map(|entry| entry.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn rooms_of(&self, session_id: SessionId) -> Vec<String> {
        self.by_session
            .get(&session_id)
            .map(|entry| entry.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_member(&self, session_id: SessionId, room_id: &str) -> bool {
        self.by_session
            .get(&session_id)
            .map(|entry| entry.contains(room_id))
            .unwrap_or(false)
    }

    /// Tear down every membership of a session. Called exactly once per
    /// disconnect, alongside registry removal.
    pub fn drop_session(&self, session_id: SessionId) {
        let Some((_, rooms)) = self.by_session.remove(&session_id) else {
            return;
        };
        for room_id in rooms {
            if let Some(mut entry) = self.rooms.get_mut(&room_id) {
                entry.remove(&session_id);
            }
            self.rooms.remove_if(&room_id, |_, members| members.is_empty());
        }
    }
}
