//! Read-through credential cache: token -> validated identity snapshot.
//! Shields the identity store from repeated lookups while connections
//! authenticate. Entries expire passively by TTL and are never actively
//! invalidated; the cache serves authentication only, so live presence
//! is read from the connection registry instead.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::auth::TokenVerifier;
use crate::error::AuthError;
use crate::model::Identity;
use crate::store::IdentityStore;

struct CacheEntry {
    identity: Identity,
    expires_at: Instant,
}

pub struct CredentialCache {
    verifier: Arc<dyn TokenVerifier>,
    identities: Arc<dyn IdentityStore>,
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
}

impl CredentialCache {
    pub fn new(
        verifier: Arc<dyn TokenVerifier>,
        identities: Arc<dyn IdentityStore>,
        ttl: Duration,
    ) -> Self {
        Self {
            verifier,
            identities,
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Verify the token and resolve its identity, from cache when fresh.
    /// Nothing is written to the cache on any failure path.
    pub async fn resolve(&self, token: &str) -> Result<Identity, AuthError> {
        let claims = self.verifier.verify(token)?;

        if let Some(entry) = self.entries.get(&claims.sub) {
            if entry.expires_at > Instant::now() {
                return Ok(entry.identity.clone());
            }
        }

        let identity = self
            .identities
            .find_by_id(&claims.sub)
            .await?
            .ok_or(AuthError::IdentityNotFound)?;

        self.entries.insert(
            claims.sub,
            CacheEntry {
                identity: identity.clone(),
                expires_at: Instant::now() + self.ttl,
            },
        );
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Claims;
    use crate::error::StoreError;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Accepts any token whose text is a known identity id.
    struct EchoVerifier;

    impl TokenVerifier for EchoVerifier {
        fn verify(&self, token: &str) -> Result<Claims, AuthError> {
            if token.is_empty() {
                return Err(AuthError::InvalidToken);
            }
            Ok(Claims {
                sub: token.to_string(),
                iat: 0,
                exp: i64::MAX,
            })
        }
    }

    /// Identity store that counts lookups.
    struct CountingStore {
        lookups: AtomicUsize,
    }

    impl CountingStore {
        fn new() -> Self {
            Self {
                lookups: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl IdentityStore for CountingStore {
        async fn find_by_id(&self, id: &str) -> Result<Option<Identity>, StoreError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            if id == "missing" {
                return Ok(None);
            }
            Ok(Some(Identity {
                id: id.to_string(),
                username: id.to_string(),
                email: format!("{id}@example.com"),
                is_online: false,
                last_seen: Utc::now(),
            }))
        }

        async fn update_presence(
            &self,
            _id: &str,
            _is_online: bool,
            _last_seen: DateTime<Utc>,
        ) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn cache_with_ttl(ttl: Duration) -> (CredentialCache, Arc<CountingStore>) {
        let store = Arc::new(CountingStore::new());
        let cache = CredentialCache::new(Arc::new(EchoVerifier), store.clone(), ttl);
        (cache, store)
    }

    #[tokio::test]
    async fn test_fresh_entry_skips_the_store() {
        let (cache, store) = cache_with_ttl(Duration::from_secs(3600));

        let first = cache.resolve("alice").await.unwrap();
        let second = cache.resolve("alice").await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(store.lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_reloads_from_store() {
        let (cache, store) = cache_with_ttl(Duration::from_secs(3600));
        cache.resolve("alice").await.unwrap();

        // Age the entry past its TTL without waiting for wall-clock time.
        cache
            .entries
            .get_mut("alice")
            .unwrap()
            .expires_at = Instant::now() - Duration::from_secs(1);

        cache.resolve("alice").await.unwrap();
        assert_eq!(store.lookups.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unknown_identity_not_cached() {
        let (cache, store) = cache_with_ttl(Duration::from_secs(3600));

        for _ in 0..2 {
            let err = cache.resolve("missing").await.unwrap_err();
            assert!(matches!(err, AuthError::IdentityNotFound));
        }
        // Each failed resolve hits the store again: failures never populate.
        assert_eq!(store.lookups.load(Ordering::SeqCst), 2);
        assert!(cache.entries.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_token_never_reaches_store() {
        let (cache, store) = cache_with_ttl(Duration::from_secs(3600));
        let err = cache.resolve("").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
        assert_eq!(store.lookups.load(Ordering::SeqCst), 0);
    }
}
