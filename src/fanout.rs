//! Fanout engine: push one logical event to every live session that
//! should see it, and only those. Delivery is best-effort per connection;
//! a dead or slow consumer is skipped, never waited on.

use std::collections::HashSet;
use std::sync::Arc;

use crate::events::ServerEvent;
use crate::rooms::RoomMembership;
use crate::session::registry::ConnectionRegistry;
use crate::session::{ConnectionHandle, SessionId};

pub struct FanoutEngine {
    registry: Arc<ConnectionRegistry>,
    rooms: Arc<RoomMembership>,
}

impl FanoutEngine {
    pub fn new(registry: Arc<ConnectionRegistry>, rooms: Arc<RoomMembership>) -> Self {
        Self { registry, rooms }
    }

    /// Deliver an event to every session currently subscribed to the room.
    pub fn publish(&self, room_id: &str, event: &ServerEvent) {
        for session_id in self.rooms.members_of(room_id) {
            self.deliver(session_id, event);
        }
    }

    /// Deliver to every room member except one session, typically the
    /// originator. Typing indicators use this so clients never see their
    /// own typing echoed back.
    pub fn publish_except(&self, room_id: &str, event: &ServerEvent, except: SessionId) {
        for session_id in self.rooms.members_of(room_id) {
            if session_id != except {
                self.deliver(session_id, event);
            }
        }
    }

    /// Deliver to all current sessions of one identity.
    pub fn publish_to_identity(&self, identity_id: &str, event: &ServerEvent) {
        for session_id in self.registry.sessions_of(identity_id) {
            self.deliver(session_id, event);
        }
    }

    /// Deliver once per session across a set of rooms. Presence changes
    /// target the union of the subject's rooms; a contact sharing several
    /// rooms still receives a single event.
    pub fn publish_to_rooms<'a, I>(&self, room_ids: I, event: &ServerEvent)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut seen: HashSet<SessionId> = HashSet::new();
        for room_id in room_ids {
            for session_id in self.rooms.members_of(room_id) {
                if seen.insert(session_id) {
                    self.deliver(session_id, event);
                }
            }
        }
    }

    /// Deliver directly to a known handle, bypassing membership lookup.
    /// Used for session-targeted replies (e.g. an existing conversation
    /// returned to only its requester).
    pub fn deliver_to_handle(&self, handle: &ConnectionHandle, event: &ServerEvent) {
        if handle.send(event.clone()).is_err() {
            tracing::debug!("delivery to closed connection skipped");
        }
    }

    fn deliver(&self, session_id: SessionId, event: &ServerEvent) {
        let Some(handle) = self.registry.handle_of(session_id) else {
            // Session vanished between membership lookup and delivery.
            return;
        };
        if handle.send(event.clone()).is_err() {
            tracing::debug!(
                session_id = %session_id,
                "delivery failed, connection gone; skipping"
            );
        }
    }
}
