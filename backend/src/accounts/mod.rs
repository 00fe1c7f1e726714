//! Password account creation at the external identity platform.

mod identity_toolkit;

pub use identity_toolkit::IdentityToolkitClient;

use async_trait::async_trait;

use crate::models::IdentityClaim;

/// Credentials and profile for a new password account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub password: String,
    pub display_name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("An account already exists for this email")]
    AlreadyExists,
    #[error("Account rejected: {0}")]
    Rejected(String),
    #[error("Identity provider unavailable: {0}")]
    Unavailable(String),
}

/// Creates accounts at the identity platform.
#[async_trait]
pub trait AccountProvider: Send + Sync {
    /// Create the account and return the platform's identity for it.
    async fn create_account(&self, account: &NewAccount) -> Result<IdentityClaim, ProviderError>;

    /// Check an existing account's password and return its identity.
    ///
    /// Wrong credentials and unknown emails are `Rejected`.
    async fn sign_in(&self, email: &str, password: &str) -> Result<IdentityClaim, ProviderError>;
}
