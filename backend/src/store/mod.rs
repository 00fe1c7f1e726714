//! Durable user record storage.

mod sqlite;

pub use sqlite::SqliteUserStore;

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::UserRecord;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database busy: {0}")]
    Busy(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Store call timed out")]
    Timeout,
}

impl StoreError {
    /// Whether the failure may clear up on its own and is worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Busy(_) | StoreError::Timeout)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked) => {
                StoreError::Busy(err.to_string())
            }
            _ => StoreError::DatabaseError(err.to_string()),
        }
    }
}

/// Storage for [`UserRecord`]s keyed by uid.
///
/// `create_if_absent` is the only way a record comes into existence and must
/// be atomic: of any number of concurrent calls for the same uid, exactly one
/// returns `true`.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get(&self, uid: &str) -> Result<Option<UserRecord>, StoreError>;

    /// Look up a record by email, case-insensitively.
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;

    /// Insert `record` unless a record with the same uid exists.
    /// Returns whether the record was inserted.
    async fn create_if_absent(&self, record: &UserRecord) -> Result<bool, StoreError>;

    /// Set `email_verified` and `updated_at`. Returns `false` for an unknown uid.
    async fn set_email_verified(
        &self,
        uid: &str,
        email_verified: bool,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Add a product to the wishlist. Returns the updated wishlist, or `None`
    /// for an unknown uid.
    async fn add_to_wishlist(
        &self,
        uid: &str,
        product_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<BTreeSet<String>>, StoreError>;

    /// Remove a product from the wishlist. Returns the updated wishlist, or
    /// `None` for an unknown uid.
    async fn remove_from_wishlist(
        &self,
        uid: &str,
        product_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<BTreeSet<String>>, StoreError>;
}
