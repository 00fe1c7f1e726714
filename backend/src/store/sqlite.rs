use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marketplace_common::Provider;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{StoreError, UserStore};
use crate::models::UserRecord;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SELECT_USER: &str = "SELECT uid, email, first_name, last_name, phone_number, photo_url,
        email_verified, provider, created_at, updated_at
     FROM users";

/// SQLite-backed user store.
///
/// Queries run on the blocking thread pool, so a caller's timeout can
/// abandon a call that is waiting on the connection.
pub struct SqliteUserStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteUserStore {
    /// Open (or create) the database at `database_url`.
    ///
    /// Accepts a plain path, a `sqlite:` prefixed path, or `:memory:`.
    pub fn new(database_url: &str) -> Result<Self, StoreError> {
        let path = database_url.strip_prefix("sqlite:").unwrap_or(database_url);

        let conn = if path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            if let Some(parent) = Path::new(path).parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StoreError::IoError(e.to_string()))?;
            }
            Connection::open(path)?
        };
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                uid TEXT PRIMARY KEY,
                email TEXT,
                first_name TEXT NOT NULL DEFAULT '',
                last_name TEXT NOT NULL DEFAULT '',
                phone_number TEXT,
                photo_url TEXT,
                email_verified INTEGER NOT NULL DEFAULT 0,
                provider TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_users_email ON users(email COLLATE NOCASE);
            CREATE TABLE IF NOT EXISTS wishlist_items (
                uid TEXT NOT NULL,
                product_id TEXT NOT NULL,
                added_at TEXT NOT NULL,
                PRIMARY KEY (uid, product_id),
                FOREIGN KEY (uid) REFERENCES users(uid)
            );",
        )?;

        tracing::info!("User store initialized with database: {}", path);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::DatabaseError(e.to_string()))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::DatabaseError(e.to_string()))?
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRecord> {
    let provider: String = row.get(7)?;
    let provider = provider
        .parse::<Provider>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))?;

    Ok(UserRecord {
        uid: row.get(0)?,
        email: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        phone_number: row.get(4)?,
        photo_url: row.get(5)?,
        email_verified: row.get(6)?,
        provider,
        wishlist: BTreeSet::new(),
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn load_wishlist(conn: &Connection, uid: &str) -> rusqlite::Result<BTreeSet<String>> {
    let mut stmt = conn.prepare_cached("SELECT product_id FROM wishlist_items WHERE uid = ?1")?;
    let items = stmt
        .query_map(params![uid], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<BTreeSet<String>>>()?;
    Ok(items)
}

fn load_user(
    conn: &Connection,
    filter: &str,
    value: &str,
) -> Result<Option<UserRecord>, StoreError> {
    let sql = format!("{SELECT_USER} WHERE {filter} LIMIT 1");
    let user = conn
        .query_row(&sql, params![value], user_from_row)
        .optional()?;

    match user {
        Some(mut user) => {
            user.wishlist = load_wishlist(conn, &user.uid)?;
            Ok(Some(user))
        }
        None => Ok(None),
    }
}

fn user_exists(conn: &Connection, uid: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE uid = ?1)",
        params![uid],
        |row| row.get(0),
    )
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn get(&self, uid: &str) -> Result<Option<UserRecord>, StoreError> {
        let uid = uid.to_string();
        self.with_conn(move |conn| load_user(conn, "uid = ?1", &uid))
            .await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let email = email.trim().to_string();
        self.with_conn(move |conn| load_user(conn, "email = ?1 COLLATE NOCASE", &email))
            .await
    }

    async fn create_if_absent(&self, record: &UserRecord) -> Result<bool, StoreError> {
        let record = record.clone();
        self.with_conn(move |conn| {
            // The primary key is the precondition: a conflicting insert is a no-op.
            let inserted = conn.execute(
                "INSERT INTO users (uid, email, first_name, last_name, phone_number, photo_url,
                    email_verified, provider, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(uid) DO NOTHING",
                params![
                    record.uid,
                    record.email,
                    record.first_name,
                    record.last_name,
                    record.phone_number,
                    record.photo_url,
                    record.email_verified,
                    record.provider.as_str(),
                    record.created_at,
                    record.updated_at,
                ],
            )?;

            if inserted == 1 {
                tracing::debug!("Inserted user record: {}", record.uid);
            }
            Ok(inserted == 1)
        })
        .await
    }

    async fn set_email_verified(
        &self,
        uid: &str,
        email_verified: bool,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let uid = uid.to_string();
        self.with_conn(move |conn| {
            let updated = conn.execute(
                "UPDATE users SET email_verified = ?1, updated_at = ?2 WHERE uid = ?3",
                params![email_verified, at, uid],
            )?;
            Ok(updated == 1)
        })
        .await
    }

    async fn add_to_wishlist(
        &self,
        uid: &str,
        product_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<BTreeSet<String>>, StoreError> {
        let (uid, product_id) = (uid.to_string(), product_id.to_string());
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            if !user_exists(&tx, &uid)? {
                return Ok(None);
            }

            let added = tx.execute(
                "INSERT INTO wishlist_items (uid, product_id, added_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(uid, product_id) DO NOTHING",
                params![uid, product_id, at],
            )?;
            if added == 1 {
                tx.execute(
                    "UPDATE users SET updated_at = ?1 WHERE uid = ?2",
                    params![at, uid],
                )?;
            }

            let wishlist = load_wishlist(&tx, &uid)?;
            tx.commit()?;
            Ok(Some(wishlist))
        })
        .await
    }

    async fn remove_from_wishlist(
        &self,
        uid: &str,
        product_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<BTreeSet<String>>, StoreError> {
        let (uid, product_id) = (uid.to_string(), product_id.to_string());
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            if !user_exists(&tx, &uid)? {
                return Ok(None);
            }

            let removed = tx.execute(
                "DELETE FROM wishlist_items WHERE uid = ?1 AND product_id = ?2",
                params![uid, product_id],
            )?;
            if removed == 1 {
                tx.execute(
                    "UPDATE users SET updated_at = ?1 WHERE uid = ?2",
                    params![at, uid],
                )?;
            }

            let wishlist = load_wishlist(&tx, &uid)?;
            tx.commit()?;
            Ok(Some(wishlist))
        })
        .await
    }
}
