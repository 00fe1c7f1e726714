//! Test doubles and token minting shared by unit and integration tests.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use marketplace_common::Provider;
use serde_json::{json, Value};

use crate::accounts::{AccountProvider, NewAccount, ProviderError};
use crate::auth::{AuthError, TokenVerifier};
use crate::config::{
    Config, CorsConfig, DatabaseConfig, IdentityToolkitConfig, LoggingConfig, OidcConfig,
    PhoneConfig, ServerConfig, SessionConfig, TimeoutsConfig,
};
use crate::models::{IdentityClaim, UserRecord};
use crate::store::{SqliteUserStore, StoreError, UserStore};
use crate::AppState;

pub const TEST_KID: &str = "test-key";
pub const TEST_ISSUER: &str = "https://issuer.test";
pub const TEST_SESSION_SECRET: &str = "test-session-secret-0123456789abcdef";

const TEST_RSA_KEY: &[u8] = include_bytes!("test_rsa_key.pem");
const TEST_RSA_N: &str = "p0UqhawI0579LPZkYE33TkH4x_NPEO_loOoVclvPsHZCde5Tz8RLPAU2lqCswuLNAk9fx2FKHOw8YbYnZXj3FMsFzGLrH1jwK13292YCdfOaGRpeqWuEcH441MOPRbbLQ8UKmvsm2B8VB6xfTp_eCMPXz-52WJzWei2frkEtsw4R1sN5vcHSnp-C2Dgnm0o3EYvF3vu9imFsj_0N0D4QIc4SiR2NRkzF8l1X4JxYHnGGaaCBX65F96uw67yrmUm8BMX07yeCRKQg3vHknlAOntr_NPNJsAL07byRhCM3r94qbq5BTuE5uM_9mwsVNxJlUva2LRbTmBK1-siMQ9fa0w";
const TEST_RSA_E: &str = "AQAB";

/// Verifier that accepts a fixed set of tokens.
#[derive(Default)]
pub struct StaticVerifier {
    tokens: HashMap<String, IdentityClaim>,
}

impl StaticVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: &str, claim: IdentityClaim) -> Self {
        self.tokens.insert(token.to_string(), claim);
        self
    }
}

#[async_trait]
impl TokenVerifier for StaticVerifier {
    async fn verify(&self, token: &str) -> Result<IdentityClaim, AuthError> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| AuthError::InvalidToken("Unknown test token".to_string()))
    }
}

/// Store wrapper that fails the first `failures` calls with [`StoreError::Busy`].
pub struct FlakyStore {
    inner: Arc<dyn UserStore>,
    remaining: AtomicUsize,
    injected: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: Arc<dyn UserStore>, failures: usize) -> Self {
        Self {
            inner,
            remaining: AtomicUsize::new(failures),
            injected: AtomicUsize::new(0),
        }
    }

    pub fn failures_injected(&self) -> usize {
        self.injected.load(Ordering::SeqCst)
    }

    fn maybe_fail(&self) -> Result<(), StoreError> {
        let took = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if took {
            self.injected.fetch_add(1, Ordering::SeqCst);
            return Err(StoreError::Busy("injected".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for FlakyStore {
    async fn get(&self, uid: &str) -> Result<Option<UserRecord>, StoreError> {
        self.maybe_fail()?;
        self.inner.get(uid).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        self.maybe_fail()?;
        self.inner.find_by_email(email).await
    }

    async fn create_if_absent(&self, record: &UserRecord) -> Result<bool, StoreError> {
        self.maybe_fail()?;
        self.inner.create_if_absent(record).await
    }

    async fn set_email_verified(
        &self,
        uid: &str,
        verified: bool,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.maybe_fail()?;
        self.inner.set_email_verified(uid, verified, at).await
    }

    async fn add_to_wishlist(
        &self,
        uid: &str,
        product_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<BTreeSet<String>>, StoreError> {
        self.maybe_fail()?;
        self.inner.add_to_wishlist(uid, product_id, at).await
    }

    async fn remove_from_wishlist(
        &self,
        uid: &str,
        product_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<BTreeSet<String>>, StoreError> {
        self.maybe_fail()?;
        self.inner.remove_from_wishlist(uid, product_id, at).await
    }
}

struct MemoryAccount {
    uid: String,
    password: String,
    display_name: String,
}

/// In-memory identity platform that rejects duplicate emails.
#[derive(Default)]
pub struct MemoryAccountProvider {
    accounts: Mutex<HashMap<String, MemoryAccount>>,
}

impl MemoryAccountProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn account_count(&self) -> usize {
        self.accounts.lock().unwrap().len()
    }
}

#[async_trait]
impl AccountProvider for MemoryAccountProvider {
    async fn create_account(&self, account: &NewAccount) -> Result<IdentityClaim, ProviderError> {
        let mut accounts = self.accounts.lock().unwrap();
        let key = account.email.to_lowercase();
        if accounts.contains_key(&key) {
            return Err(ProviderError::AlreadyExists);
        }

        let uid = format!("pw-{}", accounts.len() + 1);
        accounts.insert(
            key,
            MemoryAccount {
                uid: uid.clone(),
                password: account.password.clone(),
                display_name: account.display_name.clone(),
            },
        );

        Ok(IdentityClaim {
            email: Some(account.email.clone()),
            display_name: Some(account.display_name.clone()),
            sign_in_provider: Some(Provider::Password),
            ..IdentityClaim::new(uid)
        })
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<IdentityClaim, ProviderError> {
        let accounts = self.accounts.lock().unwrap();
        match accounts.get(&email.to_lowercase()) {
            Some(account) if account.password == password => Ok(IdentityClaim {
                email: Some(email.to_string()),
                display_name: Some(account.display_name.clone()),
                sign_in_provider: Some(Provider::Password),
                ..IdentityClaim::new(account.uid.clone())
            }),
            _ => Err(ProviderError::Rejected("INVALID_LOGIN_CREDENTIALS".to_string())),
        }
    }
}

pub fn test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            ..ServerConfig::default()
        },
        oidc: OidcConfig {
            issuer: TEST_ISSUER.to_string(),
            audience: Some("test-audience".to_string()),
            extra_issuers: vec![],
            jwks_min_refresh_secs: 30,
        },
        identity_toolkit: IdentityToolkitConfig::default(),
        database: DatabaseConfig {
            url: ":memory:".to_string(),
        },
        session: SessionConfig {
            secret: TEST_SESSION_SECRET.to_string(),
            ttl_secs: 60 * 60 * 24 * 5,
            cookie_name: "session".to_string(),
        },
        phone: PhoneConfig::default(),
        timeouts: TimeoutsConfig::default(),
        logging: LoggingConfig {
            level: "debug".to_string(),
        },
        cors: CorsConfig::default(),
    }
}

pub fn memory_store() -> Arc<SqliteUserStore> {
    Arc::new(SqliteUserStore::new(":memory:").expect("Failed to open test store"))
}

/// State backed by an in-memory store and account provider.
pub fn test_state(verifier: Arc<dyn TokenVerifier>) -> Arc<AppState> {
    test_state_with(
        verifier,
        memory_store(),
        Arc::new(MemoryAccountProvider::new()),
    )
}

pub fn test_state_with(
    verifier: Arc<dyn TokenVerifier>,
    store: Arc<dyn UserStore>,
    accounts: Arc<dyn AccountProvider>,
) -> Arc<AppState> {
    Arc::new(AppState::new(test_config(), verifier, store, accounts))
}

pub fn test_encoding_key() -> EncodingKey {
    EncodingKey::from_rsa_pem(TEST_RSA_KEY).expect("Failed to parse test RSA key")
}

/// JWKS document publishing the test key under `kid`.
pub fn test_jwks(kid: &str) -> Value {
    json!({
        "keys": [{
            "kid": kid,
            "kty": "RSA",
            "alg": "RS256",
            "use": "sig",
            "n": TEST_RSA_N,
            "e": TEST_RSA_E,
        }]
    })
}

/// Claims for a Google-style ID token valid for the next hour.
pub fn id_token_claims(issuer: &str, sub: &str, email: &str) -> Value {
    let now = Utc::now();
    json!({
        "iss": issuer,
        "aud": "test-audience",
        "sub": sub,
        "email": email,
        "email_verified": true,
        "name": "Ama Serwaa",
        "picture": "https://example.com/ama.png",
        "iat": now.timestamp(),
        "exp": (now + Duration::hours(1)).timestamp(),
    })
}

pub fn sign_id_token(claims: &Value, kid: &str) -> String {
    let header = Header {
        alg: Algorithm::RS256,
        kid: Some(kid.to_string()),
        ..Default::default()
    };
    encode(&header, claims, &test_encoding_key()).expect("Failed to encode JWT")
}

pub fn generate_id_token(issuer: &str, sub: &str, email: &str) -> String {
    sign_id_token(&id_token_claims(issuer, sub, email), TEST_KID)
}

pub fn generate_expired_id_token(issuer: &str, sub: &str) -> String {
    let now = Utc::now();
    let mut claims = id_token_claims(issuer, sub, "expired@example.com");
    claims["iat"] = json!((now - Duration::hours(2)).timestamp());
    claims["exp"] = json!((now - Duration::hours(1)).timestamp());
    sign_id_token(&claims, TEST_KID)
}
