use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::{AuthError, TokenVerifier};

const SESSION_ISSUER: &str = "marketplace-session";

/// Claims carried by a session credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Unique per issued session.
    pub sid: String,
    pub iss: String,
    pub iat: u64,
    pub exp: u64,
}

/// A signed, time-bounded session credential ready to be stored in a cookie.
#[derive(Debug, Clone)]
pub struct SessionCredential {
    pub value: String,
    pub uid: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub max_age: Duration,
}

/// Mints session credentials from verified identity tokens.
pub struct SessionIssuer {
    verifier: Arc<dyn TokenVerifier>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    default_ttl: Duration,
}

impl SessionIssuer {
    pub fn new(verifier: Arc<dyn TokenVerifier>, secret: &[u8], default_ttl: Duration) -> Self {
        Self {
            verifier,
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Verify `token` and wrap the resulting identity into a session
    /// credential valid for `ttl`.
    pub async fn issue_session(
        &self,
        token: &str,
        ttl: Duration,
    ) -> Result<SessionCredential, AuthError> {
        let claim = self.verifier.verify(token).await?;
        let uid = claim
            .subject()
            .ok_or_else(|| AuthError::InvalidToken("Token has no subject".to_string()))?
            .to_string();

        let issued_at = Utc::now();
        let expires_at = issued_at
            + chrono::Duration::from_std(ttl).map_err(|e| AuthError::Signing(e.to_string()))?;

        let claims = SessionClaims {
            sub: uid.clone(),
            email: claim.email,
            sid: uuid::Uuid::new_v4().to_string(),
            iss: SESSION_ISSUER.to_string(),
            iat: issued_at.timestamp() as u64,
            exp: expires_at.timestamp() as u64,
        };

        let value = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Signing(e.to_string()))?;

        tracing::debug!("Issued session {} for {}", claims.sid, uid);

        Ok(SessionCredential {
            value,
            uid,
            issued_at,
            expires_at,
            max_age: ttl,
        })
    }

    /// Validate a credential previously returned by [`Self::issue_session`].
    pub fn verify_session(&self, value: &str) -> Result<SessionClaims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[SESSION_ISSUER]);
        validation.validate_aud = false;
        validation.leeway = 0;

        decode::<SessionClaims>(value, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IdentityClaim;
    use crate::test_util::StaticVerifier;

    fn issuer() -> SessionIssuer {
        let verifier = StaticVerifier::new().with_token(
            "good-token",
            IdentityClaim {
                email: Some("ama@example.com".to_string()),
                ..IdentityClaim::new("u1")
            },
        );
        SessionIssuer::new(
            Arc::new(verifier),
            b"test-secret",
            Duration::from_secs(60 * 60 * 24 * 5),
        )
    }

    #[tokio::test]
    async fn test_issue_and_verify_session() {
        let issuer = issuer();
        let credential = issuer
            .issue_session("good-token", issuer.default_ttl())
            .await
            .unwrap();

        assert_eq!(credential.uid, "u1");
        assert_eq!(credential.max_age, Duration::from_secs(432_000));
        assert_eq!(
            (credential.expires_at - credential.issued_at).num_seconds(),
            432_000
        );

        let claims = issuer.verify_session(&credential.value).unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.email.as_deref(), Some("ama@example.com"));
    }

    #[tokio::test]
    async fn test_each_session_has_unique_id() {
        let issuer = issuer();
        let ttl = Duration::from_secs(60);
        let a = issuer.issue_session("good-token", ttl).await.unwrap();
        let b = issuer.issue_session("good-token", ttl).await.unwrap();

        let a = issuer.verify_session(&a.value).unwrap();
        let b = issuer.verify_session(&b.value).unwrap();
        assert_ne!(a.sid, b.sid);
    }

    #[tokio::test]
    async fn test_no_session_for_invalid_token() {
        let issuer = issuer();
        let result = issuer.issue_session("bad-token", Duration::from_secs(60)).await;
        assert!(matches!(result, Err(AuthError::InvalidToken(_))));
    }

    #[tokio::test]
    async fn test_no_session_for_blank_subject() {
        let verifier = StaticVerifier::new().with_token("blank", IdentityClaim::new(""));
        let issuer = SessionIssuer::new(Arc::new(verifier), b"s", Duration::from_secs(60));
        let result = issuer.issue_session("blank", Duration::from_secs(60)).await;
        assert!(matches!(result, Err(AuthError::InvalidToken(_))));
    }

    #[tokio::test]
    async fn test_verify_rejects_other_secret() {
        let credential = issuer()
            .issue_session("good-token", Duration::from_secs(60))
            .await
            .unwrap();

        let other = SessionIssuer::new(
            Arc::new(StaticVerifier::new()),
            b"another-secret",
            Duration::from_secs(60),
        );
        assert!(matches!(
            other.verify_session(&credential.value),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_verify_rejects_expired_session() {
        let issuer = issuer();
        let now = Utc::now().timestamp() as u64;
        let claims = SessionClaims {
            sub: "u1".to_string(),
            email: None,
            sid: "sid".to_string(),
            iss: SESSION_ISSUER.to_string(),
            iat: now - 120,
            exp: now - 60,
        };
        let value = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        assert!(matches!(
            issuer.verify_session(&value),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_verify_rejects_garbage() {
        assert!(issuer().verify_session("not-a-session").is_err());
    }
}
