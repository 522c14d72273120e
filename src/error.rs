use thiserror::Error;

/// Failure talking to an external store. The core never interprets the
/// payload; it is propagated to the originating caller only.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Connection admission failures. These reject the connection outright;
/// the core performs no retry.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Token signature or expiry check failed.
    #[error("invalid token")]
    InvalidToken,

    /// Token verified but no matching identity exists (e.g. deleted account).
    #[error("identity not found")]
    IdentityNotFound,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Conversation-creation failures.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("participant not found: {0}")]
    ParticipantNotFound(String),

    /// Fewer than one other participant was supplied.
    #[error("empty participant set")]
    EmptyParticipantSet,

    /// A non-group conversation names more than one other participant.
    #[error("direct conversations have exactly two participants")]
    InvalidParticipantCount,

    /// The per-pair creation lock stayed contended through every retry.
    #[error("conversation creation contended, giving up")]
    ConcurrencyConflict,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Per-event failures. The event is rejected and reported to the
/// originating session only; the connection stays open.
#[derive(Debug, Error)]
pub enum EventError {
    /// The session is not in the ACTIVE state.
    #[error("session not active")]
    SessionNotActive,

    /// Unknown conversation, or the session is not a member of its room.
    #[error("conversation not found")]
    ConversationNotFound,

    #[error("message not found")]
    MessageNotFound,

    #[error(transparent)]
    Chat(#[from] ChatError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
