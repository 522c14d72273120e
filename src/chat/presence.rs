//! Presence side effects. Online/offline transitions fan out to the
//! subject's rooms and are persisted to the identity store off the
//! admission/teardown path, so registry mutation never waits on I/O.

use std::collections::HashSet;

use chrono::Utc;

use crate::events::{PresencePayload, ServerEvent};
use crate::session::{ConnectionHandle, SessionId};
use crate::state::CoreState;

/// Fan a presence transition out to every session sharing a room with
/// the subject (each session once, however many rooms they share), then
/// persist it asynchronously.
pub(crate) fn presence_changed(
    core: &CoreState,
    identity_id: &str,
    is_online: bool,
    room_ids: &[String],
) {
    let last_seen = Utc::now();
    let event = ServerEvent::PresenceChanged(PresencePayload {
        user_id: identity_id.to_string(),
        is_online,
        last_seen,
    });
    core.fanout
        .publish_to_rooms(room_ids.iter().map(String::as_str), &event);

    // Deferred persistence: the store write happens on its own task and
    // failures are logged, never surfaced to the lifecycle.
    let identities = core.identities.clone();
    let identity_id = identity_id.to_string();
    tokio::spawn(async move {
        if let Err(err) = identities
            .update_presence(&identity_id, is_online, last_seen)
            .await
        {
            tracing::warn!(
                identity_id = %identity_id,
                error = %err,
                "presence persistence failed"
            );
        }
    });
}

/// Send a freshly admitted session one presence-changed event per
/// currently-online contact it shares a room with, so its client starts
/// from an accurate presence picture.
pub(crate) fn presence_snapshot(core: &CoreState, session_id: SessionId, handle: &ConnectionHandle) {
    let mut seen: HashSet<String> = HashSet::new();
    for room_id in core.rooms.rooms_of(session_id) {
        for member in core.rooms.members_of(&room_id) {
            if member == session_id {
                continue;
            }
            let Some(identity_id) = core.registry.identity_of(member) else {
                continue;
            };
            if seen.insert(identity_id.clone()) {
                let event = ServerEvent::PresenceChanged(PresencePayload {
                    user_id: identity_id,
                    is_online: true,
                    last_seen: Utc::now(),
                });
                core.fanout.deliver_to_handle(handle, &event);
            }
        }
    }
}
