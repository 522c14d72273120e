pub mod lifecycle;
pub mod registry;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::events::ServerEvent;

/// One live connection for one identity. An identity may hold several
/// concurrently (multiple devices/tabs).
pub type SessionId = Uuid;

/// Sender half of a connection's outbound event channel. The transport
/// owns the receiver and forwards events onto the socket; anything in the
/// core can clone this to push events to that client. Sends never block,
/// so teardown and fanout are immune to slow consumers.
pub type ConnectionHandle = mpsc::UnboundedSender<ServerEvent>;

/// Receiver half, held by the transport's writer task.
pub type EventStream = mpsc::UnboundedReceiver<ServerEvent>;

/// Create a connected handle/stream pair.
pub fn connection_channel() -> (ConnectionHandle, EventStream) {
    mpsc::unbounded_channel()
}
