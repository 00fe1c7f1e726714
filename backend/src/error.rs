//! API error type shared by the HTTP routes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::accounts::ProviderError;
use crate::auth::AuthError;
use crate::phone::PhoneError;
use crate::reconcile::ReconcileError;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Malformed claim: {0}")]
    MalformedClaim(String),

    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("Invalid {field}: {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },

    /// `uid` is the existing record's, when one is known.
    #[error("{message}")]
    AlreadyExists {
        message: String,
        uid: Option<String>,
    },

    #[error("{0}")]
    NotFound(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn already_exists(message: impl Into<String>, uid: Option<String>) -> Self {
        ApiError::AlreadyExists {
            message: message.into(),
            uid,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            ApiError::MalformedClaim(_)
            | ApiError::MissingFields(_)
            | ApiError::InvalidField { .. } => StatusCode::BAD_REQUEST,
            ApiError::AlreadyExists { .. } => StatusCode::CONFLICT,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::StoreUnavailable(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            ApiError::InvalidToken(_) => "invalid_token",
            ApiError::MalformedClaim(_) => "malformed_claim",
            ApiError::MissingFields(_) => "missing_fields",
            ApiError::InvalidField { .. } => "invalid_field",
            ApiError::AlreadyExists { .. } => "already_exists",
            ApiError::NotFound(_) => "not_found",
            ApiError::StoreUnavailable(_) => "store_unavailable",
            ApiError::Internal(_) => "internal_error",
        }
    }

    fn uid(&self) -> Option<&str> {
        match self {
            ApiError::AlreadyExists { uid, .. } => uid.as_deref(),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::warn!("Request rejected: {}", self);
        }

        let mut error = json!({
            "type": self.error_type(),
            "message": self.to_string()
        });
        if let Some(uid) = self.uid() {
            error["uid"] = json!(uid);
        }

        (status, Json(json!({ "success": false, "error": error }))).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Signing(message) => ApiError::Internal(message),
            // Key fetch failures during verification still leave the token unverified.
            other => ApiError::InvalidToken(other.to_string()),
        }
    }
}

impl From<ReconcileError> for ApiError {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::MalformedClaim(message) => ApiError::MalformedClaim(message),
            ReconcileError::StoreUnavailable(err) => err.into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::StoreUnavailable(err.to_string())
    }
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::AlreadyExists => ApiError::already_exists(err.to_string(), None),
            ProviderError::Rejected(message) => ApiError::InvalidField {
                field: "account",
                message,
            },
            ProviderError::Unavailable(message) => ApiError::Internal(message),
        }
    }
}

impl From<PhoneError> for ApiError {
    fn from(err: PhoneError) -> Self {
        ApiError::InvalidField {
            field: "phoneNumber",
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::InvalidToken("x".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::MissingFields(vec!["email"]).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::already_exists("x", None).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::StoreUnavailable("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_missing_fields_message() {
        let err = ApiError::MissingFields(vec!["email", "password"]);
        assert_eq!(err.to_string(), "Missing required fields: email, password");
    }

    #[test]
    fn test_jwks_failure_is_unauthenticated() {
        let err: ApiError = AuthError::JwksFetchError("timeout".into()).into();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_store_errors_are_internal() {
        let err: ApiError = ReconcileError::StoreUnavailable(StoreError::Timeout).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let err: ApiError = ReconcileError::MalformedClaim("no sub".into()).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_provider_errors() {
        let err: ApiError = ProviderError::AlreadyExists.into();
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let err: ApiError = ProviderError::Rejected("INVALID_EMAIL".into()).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err: ApiError = ProviderError::Unavailable("503".into()).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let response = ApiError::NotFound("No user".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["type"], "not_found");
        assert_eq!(json["error"]["message"], "No user");
        assert!(json["error"].get("uid").is_none());
    }

    #[tokio::test]
    async fn test_conflict_body_carries_uid() {
        let response =
            ApiError::already_exists("User g-ama is already registered", Some("g-ama".into()))
                .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["type"], "already_exists");
        assert_eq!(json["error"]["uid"], "g-ama");
    }
}
