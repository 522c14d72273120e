//! Shared core state. One `CoreState` is built at startup and handed
//! (via `Arc`) to every per-connection worker; all cross-connection
//! coordination flows through it. There is no process-global state.

use std::sync::Arc;

use crate::auth::cache::CredentialCache;
use crate::auth::TokenVerifier;
use crate::chat::conversations::ConversationCoordinator;
use crate::config::CoreConfig;
use crate::error::AuthError;
use crate::fanout::FanoutEngine;
use crate::model::Identity;
use crate::rooms::RoomMembership;
use crate::session::lifecycle::Session;
use crate::session::registry::ConnectionRegistry;
use crate::session::ConnectionHandle;
use crate::store::{ConversationStore, IdentityStore, MessageStore};

pub struct CoreState {
    pub config: CoreConfig,
    pub identities: Arc<dyn IdentityStore>,
    pub conversations: Arc<dyn ConversationStore>,
    pub messages: Arc<dyn MessageStore>,
    pub credentials: CredentialCache,
    pub registry: Arc<ConnectionRegistry>,
    pub rooms: Arc<RoomMembership>,
    pub fanout: FanoutEngine,
    pub coordinator: ConversationCoordinator,
}

impl CoreState {
    pub fn new(
        config: CoreConfig,
        identities: Arc<dyn IdentityStore>,
        conversations: Arc<dyn ConversationStore>,
        messages: Arc<dyn MessageStore>,
        verifier: Arc<dyn TokenVerifier>,
    ) -> Arc<Self> {
        let registry = Arc::new(ConnectionRegistry::new());
        let rooms = Arc::new(RoomMembership::new());
        let fanout = FanoutEngine::new(registry.clone(), rooms.clone());
        let credentials =
            CredentialCache::new(verifier, identities.clone(), config.credential_ttl());
        let coordinator = ConversationCoordinator::new(
            conversations.clone(),
            identities.clone(),
            registry.clone(),
            rooms.clone(),
            &config,
        );

        Arc::new(Self {
            config,
            identities,
            conversations,
            messages,
            credentials,
            registry,
            rooms,
            fanout,
            coordinator,
        })
    }

    /// Connection admission entrypoint: authenticate the token and, on
    /// success, admit the connection as a live session subscribed to all
    /// of its identity's rooms.
    pub async fn connect(
        self: &Arc<Self>,
        token: &str,
        handle: ConnectionHandle,
    ) -> Result<Session, AuthError> {
        Session::connect(self.clone(), token, handle).await
    }

    /// An identity snapshot with `is_online` taken from the registry
    /// rather than the possibly stale stored or cached value.
    pub(crate) fn identity_view(&self, identity: &Identity) -> Identity {
        let mut view = identity.clone();
        view.is_online = self.registry.is_online(&identity.id);
        view
    }
}
