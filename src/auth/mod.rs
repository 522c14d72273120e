pub mod cache;
pub mod jwt;

use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Claims extracted from a verified token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Identity id the token was issued for.
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Token verification, delegated to an external verifier. Implementations
/// check signature and expiry and extract the claimed identity id; they
/// do not consult the identity store.
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<Claims, AuthError>;
}
