use marketplace_common::Provider;

/// Verified attributes about an authenticated principal.
///
/// Produced by a token verifier or the account provider; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityClaim {
    /// Stable identifier at the identity provider (`sub` claim).
    pub subject_id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub email_verified: bool,
    pub phone_number: Option<String>,
    pub avatar_url: Option<String>,
    /// How the principal signed in, when the token says so.
    pub sign_in_provider: Option<Provider>,
}

impl IdentityClaim {
    pub fn new(subject_id: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            ..Self::default()
        }
    }

    /// The subject ID, or `None` when it is blank.
    pub fn subject(&self) -> Option<&str> {
        let subject = self.subject_id.trim();
        if subject.is_empty() {
            None
        } else {
            Some(subject)
        }
    }
}
