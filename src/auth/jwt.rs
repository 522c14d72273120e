//! HS256 token verification. The issuing side lives in the external auth
//! service; the issue helper here exists so tests and embedders can mint
//! tokens against the same secret.

use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;

use crate::auth::{Claims, TokenVerifier};
use crate::error::AuthError;

/// Access token lifetime in seconds (15 minutes).
const TOKEN_TTL_SECS: i64 = 900;

pub struct JwtVerifier {
    secret: Vec<u8>,
}

impl JwtVerifier {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Generate a 256-bit random signing secret. Must be
    /// cryptographically random, never human-readable.
    pub fn generate_secret() -> Vec<u8> {
        let secret: [u8; 32] = rand::rng().random();
        secret.to_vec()
    }

    /// Issue an access token for an identity.
    pub fn issue(&self, identity_id: &str) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: identity_id.to_string(),
            iat: now,
            exp: now + TOKEN_TTL_SECS,
        };
        encode(
            &Header::default(), // HS256
            &claims,
            &EncodingKey::from_secret(&self.secret),
        )
        .map_err(|_| AuthError::InvalidToken)
    }
}

impl TokenVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let validation = Validation::new(jsonwebtoken::Algorithm::HS256);
        decode::<Claims>(token, &DecodingKey::from_secret(&self.secret), &validation)
            .map(|data| data.claims)
            .map_err(|err| {
                tracing::debug!(error = %err, "token verification failed");
                AuthError::InvalidToken
            })
    }
}
