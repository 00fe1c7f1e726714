//! Sign-in provider types.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How a user record was first established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// Email and password account created through sign-up
    Password,
    /// Google OAuth identity
    Google,
}

impl Provider {
    /// All provider variants for iteration.
    pub const ALL: [Provider; 2] = [Provider::Password, Provider::Google];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Password => "password",
            Provider::Google => "google",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown provider: {0}")]
pub struct ParseProviderError(pub String);

impl FromStr for Provider {
    type Err = ParseProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "password" => Ok(Provider::Password),
            "google" => Ok(Provider::Google),
            other => Err(ParseProviderError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_serialization() {
        let json = serde_json::to_string(&Provider::Google).unwrap();
        assert_eq!(json, r#""google""#);

        let parsed: Provider = serde_json::from_str(r#""password""#).unwrap();
        assert_eq!(parsed, Provider::Password);
    }

    #[test]
    fn test_provider_display_matches_from_str() {
        for provider in Provider::ALL {
            assert_eq!(provider.to_string().parse::<Provider>(), Ok(provider));
        }
    }

    #[test]
    fn test_provider_rejects_unknown() {
        let err = "google.com".parse::<Provider>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown provider: google.com");
    }
}
