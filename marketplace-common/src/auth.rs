//! Request and response bodies for the auth and wishlist endpoints.
//!
//! Field names follow the web client's camelCase convention.

use serde::{Deserialize, Serialize};

/// Body of `POST /api/auth/signup`.
///
/// Every field defaults to empty so that missing fields surface as a
/// validation error naming them rather than a JSON rejection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone_number: String,
}

impl SignUpRequest {
    /// Names of required fields that are blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("email", &self.email),
            ("password", &self.password),
            ("firstName", &self.first_name),
            ("lastName", &self.last_name),
            ("phoneNumber", &self.phone_number),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

/// Body of `POST /api/auth/signin` (existence check).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignInRequest {
    #[serde(default)]
    pub email: String,
}

/// Body carrying an identity token issued by the external identity provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdTokenRequest {
    #[serde(default)]
    pub id_token: String,
}

/// Response body shared by every auth endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AuthResponse {
    pub fn ok(uid: impl Into<String>) -> Self {
        Self {
            success: true,
            uid: Some(uid.into()),
            created: None,
            message: None,
        }
    }

    pub fn reconciled(uid: impl Into<String>, created: bool) -> Self {
        Self {
            created: Some(created),
            ..Self::ok(uid)
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            uid: None,
            created: None,
            message: Some(message.into()),
        }
    }
}

/// Response body of the wishlist endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WishlistResponse {
    pub success: bool,
    pub uid: String,
    pub wishlist: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signup_request_camel_case() {
        let json = r#"{
            "email": "ama@example.com",
            "password": "hunter22",
            "firstName": "Ama",
            "lastName": "Serwaa",
            "phoneNumber": "0244123456"
        }"#;

        let request: SignUpRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.first_name, "Ama");
        assert_eq!(request.phone_number, "0244123456");
        assert!(request.missing_fields().is_empty());
    }

    #[test]
    fn test_signup_request_reports_missing_fields() {
        let request: SignUpRequest =
            serde_json::from_str(r#"{"email": "a@b.c", "lastName": "  "}"#).unwrap();
        assert_eq!(
            request.missing_fields(),
            vec!["password", "firstName", "lastName", "phoneNumber"]
        );
    }

    #[test]
    fn test_id_token_request_field_name() {
        let request: IdTokenRequest = serde_json::from_str(r#"{"idToken": "abc"}"#).unwrap();
        assert_eq!(request.id_token, "abc");
    }

    #[test]
    fn test_auth_response_omits_empty_fields() {
        let json = serde_json::to_value(AuthResponse::ok("u1")).unwrap();
        assert_eq!(json, serde_json::json!({"success": true, "uid": "u1"}));

        let json = serde_json::to_value(AuthResponse::reconciled("u1", true)).unwrap();
        assert_eq!(json["created"], true);
    }
}
