//! Message flows: append-and-fanout for new messages, read receipts.
//! Validation runs against the session's room memberships, which are a
//! subset of the authoritative conversation membership by construction.

use chrono::Utc;

use crate::error::EventError;
use crate::events::{MessagePayload, ReadPayload, ServerEvent};
use crate::model::{Identity, MessageKind, NewMessage, ReadReceipt, StoredMessage};
use crate::session::lifecycle::Session;
use crate::state::CoreState;

/// Persist a message and fan it out to the room. The sender's own read
/// receipt is seeded at append time so the author never sees their
/// message as unread.
pub(crate) async fn send_message(
    core: &CoreState,
    session: &Session,
    chat_id: String,
    content: String,
    kind: MessageKind,
) -> Result<(), EventError> {
    if !core.rooms.is_member(session.id(), &chat_id) {
        return Err(EventError::ConversationNotFound);
    }

    let sender = session.identity();
    let stored = core
        .messages
        .append(NewMessage {
            sender: sender.id.clone(),
            content,
            chat: chat_id.clone(),
            kind,
            read_by: vec![ReadReceipt {
                user: sender.id.clone(),
                read_at: Utc::now(),
            }],
        })
        .await?;

    core.conversations
        .set_last_message(&chat_id, &stored.id)
        .await?;

    tracing::debug!(
        message_id = %stored.id,
        chat_id = %chat_id,
        sender = %sender.id,
        "message appended"
    );

    let payload = message_payload(core, stored, sender);
    core.fanout
        .publish(&chat_id, &ServerEvent::MessageReceived(payload));
    Ok(())
}

/// Record a read receipt and notify the room. Re-reading an already-read
/// message leaves the receipt list unchanged but the notification still
/// goes out.
pub(crate) async fn mark_read(
    core: &CoreState,
    session: &Session,
    message_id: String,
) -> Result<(), EventError> {
    let message = core
        .messages
        .find_by_id(&message_id)
        .await?
        .ok_or(EventError::MessageNotFound)?;

    if !core.rooms.is_member(session.id(), &message.chat) {
        return Err(EventError::ConversationNotFound);
    }

    let reader = &session.identity().id;
    core.messages
        .mark_read(&message_id, reader, Utc::now())
        .await?
        .ok_or(EventError::MessageNotFound)?;

    core.fanout.publish(
        &message.chat,
        &ServerEvent::MessageRead(ReadPayload {
            message_id,
            user_id: reader.clone(),
        }),
    );
    Ok(())
}

/// Build the delivered form of a message: the stored record with the
/// sender populated from the session's identity snapshot, online status
/// sourced from the registry.
fn message_payload(core: &CoreState, stored: StoredMessage, sender: &Identity) -> MessagePayload {
    MessagePayload {
        sender: core.identity_view(sender),
        id: stored.id,
        content: stored.content,
        chat: stored.chat,
        kind: stored.kind,
        read_by: stored.read_by,
        created_at: stored.created_at,
    }
}
