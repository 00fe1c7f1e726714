//! Identity token verification and session credentials.

pub mod cookie;
mod jwks;
mod session;

pub use jwks::JwksVerifier;
pub use session::{SessionClaims, SessionCredential, SessionIssuer};

use async_trait::async_trait;

use crate::models::IdentityClaim;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid token: {0}")]
    InvalidToken(String),
    #[error("JWKS fetch error: {0}")]
    JwksFetchError(String),
    #[error("Key not found for kid: {0}")]
    KeyNotFound(String),
    #[error("Failed to sign session: {0}")]
    Signing(String),
}

/// Verifies identity tokens issued by an external identity provider.
///
/// A token rejected once is never retried: invalid tokens do not become
/// valid.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<IdentityClaim, AuthError>;
}
