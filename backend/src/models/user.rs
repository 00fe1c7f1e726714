use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use marketplace_common::Provider;
use serde::Serialize;

use super::claim::IdentityClaim;

/// Local user record, one per identity provider subject.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// Subject ID from the identity provider. Never regenerated.
    pub uid: String,
    pub email: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    pub email_verified: bool,
    pub provider: Provider,
    /// Product IDs, mutated only by the wishlist operations.
    pub wishlist: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    /// Build the record for a first reconciliation of `claim`.
    pub fn from_claim(claim: &IdentityClaim, provider: Provider, now: DateTime<Utc>) -> Self {
        let (first_name, last_name) = split_display_name(claim.display_name.as_deref());
        Self {
            uid: claim.subject_id.trim().to_string(),
            email: claim.email.clone(),
            first_name,
            last_name,
            phone_number: claim.phone_number.clone(),
            photo_url: claim.avatar_url.clone(),
            email_verified: claim.email_verified,
            provider,
            wishlist: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Split a display name on its first whitespace run.
///
/// The first token is the first name, the trimmed remainder the last name.
/// Both are empty when there is no display name.
pub fn split_display_name(display_name: Option<&str>) -> (String, String) {
    let name = display_name.unwrap_or_default().trim();
    match name.split_once(char::is_whitespace) {
        Some((first, rest)) => (first.to_string(), rest.trim().to_string()),
        None => (name.to_string(), String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Some("Ama Serwaa"), "Ama", "Serwaa")]
    #[case(Some("Kofi"), "Kofi", "")]
    #[case(Some("  Yaw   Boateng Mensah "), "Yaw", "Boateng Mensah")]
    #[case(Some("Efua\tOwusu"), "Efua", "Owusu")]
    #[case(Some(""), "", "")]
    #[case(None, "", "")]
    fn test_split_display_name(
        #[case] display_name: Option<&str>,
        #[case] first: &str,
        #[case] last: &str,
    ) {
        assert_eq!(
            split_display_name(display_name),
            (first.to_string(), last.to_string())
        );
    }

    #[test]
    fn test_from_claim_maps_fields() {
        let now = Utc::now();
        let claim = IdentityClaim {
            subject_id: "g-1".to_string(),
            email: Some("ama@example.com".to_string()),
            display_name: Some("Ama Serwaa".to_string()),
            email_verified: true,
            phone_number: Some("+233244123456".to_string()),
            avatar_url: Some("https://example.com/a.png".to_string()),
            sign_in_provider: None,
        };

        let record = UserRecord::from_claim(&claim, Provider::Google, now);

        assert_eq!(record.uid, "g-1");
        assert_eq!(record.first_name, "Ama");
        assert_eq!(record.last_name, "Serwaa");
        assert_eq!(record.photo_url.as_deref(), Some("https://example.com/a.png"));
        assert!(record.email_verified);
        assert_eq!(record.provider, Provider::Google);
        assert!(record.wishlist.is_empty());
        assert_eq!(record.created_at, now);
        assert_eq!(record.updated_at, now);
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record = UserRecord::from_claim(&IdentityClaim::new("u1"), Provider::Password, Utc::now());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["uid"], "u1");
        assert_eq!(json["provider"], "password");
        assert!(json.get("photoURL").is_some());
        assert!(json.get("emailVerified").is_some());
        assert!(json.get("createdAt").is_some());
    }
}
