//! Connection registry: the source of truth for "who is online right now".
//! Bidirectional mapping between identities and their live sessions.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::session::{ConnectionHandle, SessionId};

/// Registry-owned record for one live connection.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub identity_id: String,
    pub handle: ConnectionHandle,
    pub connected_at: DateTime<Utc>,
}

/// Tracks all active sessions per identity. Operations are synchronous
/// and never touch external I/O; presence persistence happens in a
/// decoupled side-effect step, not here.
#[derive(Default)]
pub struct ConnectionRegistry {
    sessions: DashMap<SessionId, SessionRecord>,
    by_identity: DashMap<String, Vec<SessionId>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a connection, returning its fresh session id. The per-identity
    /// session list is updated through the map's entry API so concurrent
    /// admits for the same identity cannot lose each other's updates.
    pub fn admit(&self, identity_id: &str, handle: ConnectionHandle) -> SessionId {
        let session_id = Uuid::now_v7();
        self.sessions.insert(
            session_id,
            SessionRecord {
                identity_id: identity_id.to_string(),
                handle,
                connected_at: Utc::now(),
            },
        );
        self.by_identity
            .entry(identity_id.to_string())
            .or_default()
            .push(session_id);

        tracing::debug!(
            identity_id = %identity_id,
            session_id = %session_id,
            sessions = self.session_count(identity_id),
            "session admitted"
        );
        session_id
    }

    /// Remove a session. Idempotent: disconnect notifications race with
    /// explicit logout, so removing an already-removed session is a no-op.
    /// Returns false in that case.
    pub fn remove(&self, session_id: SessionId) -> bool {
        let Some((_, record)) = self.sessions.remove(&session_id) else {
            return false;
        };
        if let Some(mut entry) = self.by_identity.get_mut(&record.identity_id) {
            entry.retain(|id| *id != session_id);
        }
        self.by_identity
            .remove_if(&record.identity_id, |_, sessions| sessions.is_empty());

        tracing::debug!(
            identity_id = %record.identity_id,
            session_id = %session_id,
            "session removed"
        );
        true
    }

    pub fn sessions_of(&self, identity_id: &str) -> Vec<SessionId> {
        self.by_identity
            .get(identity_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    pub fn handle_of(&self, session_id: SessionId) -> Option<ConnectionHandle> {
        self.sessions
            .get(&session_id)
            .map(|entry| entry.handle.clone())
    }

    pub fn identity_of(&self, session_id: SessionId) -> Option<String> {
        self.sessions
            .get(&session_id)
            .map(|entry| entry.identity_id.clone())
    }

    /// Live online status: an identity is online while it holds at least
    /// one session. Presence reads come from here, not from cached
    /// identity snapshots.
    pub fn is_online(&self, identity_id: &str) -> bool {
        self.by_identity
            .get(identity_id)
            .map(|entry| !entry.is_empty())
            .unwrap_or(false)
    }

    fn session_count(&self, identity_id: &str) -> usize {
        self.by_identity
            .get(identity_id)
            .map(|entry| entry.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::connection_channel;

    #[test]
    fn test_admit_and_remove_roundtrip() {
        let registry = ConnectionRegistry::new();
        let (handle, _stream) = connection_channel();

        let session = registry.admit("alice", handle);
        assert!(registry.is_online("alice"));
        assert_eq!(registry.sessions_of("alice"), vec![session]);
        assert_eq!(registry.identity_of(session).as_deref(), Some("alice"));
        assert!(registry.handle_of(session).is_some());

        assert!(registry.remove(session));
        assert!(!registry.is_online("alice"));
        assert!(registry.sessions_of("alice").is_empty());
        assert!(registry.handle_of(session).is_none());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let (handle, _stream) = connection_channel();

        let session = registry.admit("alice", handle);
        assert!(registry.remove(session));
        assert!(!registry.remove(session));
    }

    #[test]
    fn test_multiple_sessions_per_identity() {
        let registry = ConnectionRegistry::new();
        let (h1, _s1) = connection_channel();
        let (h2, _s2) = connection_channel();

        let first = registry.admit("alice", h1);
        let second = registry.admit("alice", h2);
        assert_eq!(registry.sessions_of("alice").len(), 2);

        registry.remove(first);
        assert!(registry.is_online("alice"));
        assert_eq!(registry.sessions_of("alice"), vec![second]);

        registry.remove(second);
        assert!(!registry.is_online("alice"));
    }
}
