use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use marketplace_common::Provider;
use reqwest::Client;
use serde::{Deserialize, Deserializer};
use tokio::sync::{Mutex, RwLock};

use super::{AuthError, TokenVerifier};
use crate::config::OidcConfig;
use crate::models::IdentityClaim;

/// JWKS key set response.
#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<Jwk>,
}

#[derive(Debug, Clone, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    #[allow(dead_code)]
    alg: Option<String>,
    n: Option<String>,
    e: Option<String>,
}

/// ID token claims.
#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    email_verified: bool,
    #[serde(default)]
    phone_number: Option<String>,
    #[serde(default)]
    picture: Option<String>,
    #[serde(default)]
    firebase: Option<FirebaseClaims>,
}

/// Claims the identity platform nests under `firebase`.
#[derive(Debug, Default, Deserialize)]
struct FirebaseClaims {
    #[serde(default)]
    sign_in_provider: Option<String>,
}

fn provider_from_sign_in(sign_in_provider: &str) -> Option<Provider> {
    match sign_in_provider {
        "password" => Some(Provider::Password),
        "google.com" => Some(Provider::Google),
        _ => None,
    }
}

impl From<Claims> for IdentityClaim {
    fn from(claims: Claims) -> Self {
        IdentityClaim {
            subject_id: claims.sub,
            email: claims.email,
            display_name: claims.name,
            email_verified: claims.email_verified,
            phone_number: claims.phone_number,
            avatar_url: claims.picture,
            sign_in_provider: claims
                .firebase
                .and_then(|f| f.sign_in_provider)
                .as_deref()
                .and_then(provider_from_sign_in),
        }
    }
}

/// Some issuers encode `email_verified` as the string `"true"`.
fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrString {
        Bool(bool),
        String(String),
    }

    Ok(match BoolOrString::deserialize(deserializer)? {
        BoolOrString::Bool(b) => b,
        BoolOrString::String(s) => s.eq_ignore_ascii_case("true"),
    })
}

#[derive(Debug, Deserialize)]
struct OidcDiscovery {
    jwks_uri: String,
}

/// Verifies RS256 ID tokens against an OIDC issuer's published keys.
pub struct JwksVerifier {
    http_client: Client,
    jwks_uri: String,
    keys: Arc<RwLock<HashMap<String, DecodingKey>>>,
    issuers: Vec<String>,
    audience: Option<String>,
    min_refresh_interval: Duration,
    /// When an unknown `kid` last triggered a refresh.
    last_refresh: Mutex<Option<Instant>>,
}

impl JwksVerifier {
    /// Discover the issuer's JWKS endpoint and load its keys.
    pub async fn new(config: &OidcConfig) -> Result<Self, AuthError> {
        let http_client = Client::new();

        let config_url = format!(
            "{}/.well-known/openid-configuration",
            config.issuer.trim_end_matches('/')
        );
        let discovery: OidcDiscovery = http_client
            .get(&config_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AuthError::JwksFetchError(e.to_string()))?
            .json()
            .await
            .map_err(|e| AuthError::JwksFetchError(e.to_string()))?;

        let verifier = Self {
            http_client,
            jwks_uri: discovery.jwks_uri,
            keys: Arc::new(RwLock::new(HashMap::new())),
            issuers: config.accepted_issuers(),
            audience: config.audience.clone().filter(|a| !a.is_empty()),
            min_refresh_interval: config.jwks_min_refresh(),
            last_refresh: Mutex::new(None),
        };

        verifier.refresh_keys().await?;

        Ok(verifier)
    }

    async fn refresh_keys(&self) -> Result<(), AuthError> {
        tracing::info!("Fetching JWKS from {}", self.jwks_uri);

        let response: JwksResponse = self
            .http_client
            .get(&self.jwks_uri)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AuthError::JwksFetchError(e.to_string()))?
            .json()
            .await
            .map_err(|e| AuthError::JwksFetchError(e.to_string()))?;

        let mut keys = self.keys.write().await;
        keys.clear();

        for jwk in response.keys {
            if jwk.kty == "RSA" {
                if let (Some(n), Some(e)) = (&jwk.n, &jwk.e) {
                    match DecodingKey::from_rsa_components(n, e) {
                        Ok(key) => {
                            keys.insert(jwk.kid.clone(), key);
                        }
                        Err(e) => {
                            tracing::warn!("Failed to parse RSA key {}: {}", jwk.kid, e);
                        }
                    }
                }
            }
        }

        tracing::info!("Loaded {} JWKS keys", keys.len());
        Ok(())
    }

    /// Key for `kid`, refreshing the key set once if it is unknown.
    ///
    /// Unknown-kid refreshes are at least `min_refresh_interval` apart;
    /// concurrent misses share one refresh.
    async fn decoding_key(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        if let Some(key) = self.keys.read().await.get(kid) {
            return Ok(key.clone());
        }

        let mut last_refresh = self.last_refresh.lock().await;
        if let Some(key) = self.keys.read().await.get(kid) {
            return Ok(key.clone());
        }
        if matches!(*last_refresh, Some(at) if at.elapsed() < self.min_refresh_interval) {
            tracing::debug!("Unknown kid {}, JWKS refreshed recently", kid);
            return Err(AuthError::KeyNotFound(kid.to_string()));
        }

        tracing::debug!("Unknown kid {}, refreshing JWKS", kid);
        *last_refresh = Some(Instant::now());
        self.refresh_keys().await?;

        self.keys
            .read()
            .await
            .get(kid)
            .cloned()
            .ok_or_else(|| AuthError::KeyNotFound(kid.to_string()))
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&self.issuers);
        match &self.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }
        validation
    }
}

#[async_trait]
impl TokenVerifier for JwksVerifier {
    async fn verify(&self, token: &str) -> Result<IdentityClaim, AuthError> {
        let header = decode_header(token).map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        let kid = header
            .kid
            .ok_or_else(|| AuthError::InvalidToken("Missing kid in token header".to_string()))?;

        // An unreachable key endpoint or a retired kid leaves the token unverified.
        let key = self
            .decoding_key(&kid)
            .await
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        let token_data = decode::<Claims>(token, &key, &self.validation())
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        Ok(token_data.claims.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_map_to_identity_claim() {
        let claims: Claims = serde_json::from_value(serde_json::json!({
            "sub": "110169484474386276334",
            "email": "ama@example.com",
            "name": "Ama Serwaa",
            "email_verified": true,
            "picture": "https://lh3.googleusercontent.com/a/photo",
            "exp": 1,
        }))
        .unwrap();

        let claim = IdentityClaim::from(claims);
        assert_eq!(claim.subject_id, "110169484474386276334");
        assert_eq!(claim.display_name.as_deref(), Some("Ama Serwaa"));
        assert!(claim.email_verified);
        assert_eq!(
            claim.avatar_url.as_deref(),
            Some("https://lh3.googleusercontent.com/a/photo")
        );
        assert!(claim.phone_number.is_none());
    }

    #[test]
    fn test_email_verified_accepts_string() {
        let claims: Claims =
            serde_json::from_value(serde_json::json!({"sub": "s", "email_verified": "true"}))
                .unwrap();
        assert!(claims.email_verified);

        let claims: Claims =
            serde_json::from_value(serde_json::json!({"sub": "s", "email_verified": "false"}))
                .unwrap();
        assert!(!claims.email_verified);
    }

    #[test]
    fn test_sign_in_provider_mapped() {
        let claims: Claims = serde_json::from_value(serde_json::json!({
            "sub": "pw-1",
            "firebase": { "sign_in_provider": "password", "identities": {} }
        }))
        .unwrap();
        assert_eq!(
            IdentityClaim::from(claims).sign_in_provider,
            Some(Provider::Password)
        );

        let claims: Claims = serde_json::from_value(serde_json::json!({
            "sub": "g-1",
            "firebase": { "sign_in_provider": "google.com" }
        }))
        .unwrap();
        assert_eq!(
            IdentityClaim::from(claims).sign_in_provider,
            Some(Provider::Google)
        );

        let claims: Claims = serde_json::from_value(serde_json::json!({
            "sub": "a-1",
            "firebase": { "sign_in_provider": "anonymous" }
        }))
        .unwrap();
        assert_eq!(IdentityClaim::from(claims).sign_in_provider, None);
    }

    #[test]
    fn test_missing_sub_defaults_to_empty() {
        let claims: Claims = serde_json::from_value(serde_json::json!({})).unwrap();
        let claim = IdentityClaim::from(claims);
        assert_eq!(claim.subject(), None);
        assert!(!claim.email_verified);
    }

    #[test]
    fn test_auth_error_messages() {
        assert!(AuthError::InvalidToken("expired".to_string())
            .to_string()
            .contains("Invalid token"));
        assert!(AuthError::KeyNotFound("kid123".to_string())
            .to_string()
            .contains("Key not found for kid"));
        assert!(AuthError::JwksFetchError("connection refused".to_string())
            .to_string()
            .contains("JWKS fetch error"));
    }
}
