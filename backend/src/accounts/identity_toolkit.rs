use async_trait::async_trait;
use marketplace_common::Provider;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{AccountProvider, NewAccount, ProviderError};
use crate::config::IdentityToolkitConfig;
use crate::models::IdentityClaim;

/// Client for the identity toolkit `accounts:signUp` and
/// `accounts:signInWithPassword` REST endpoints.
pub struct IdentityToolkitClient {
    http_client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignUpRequest<'a> {
    email: &'a str,
    password: &'a str,
    display_name: &'a str,
    return_secure_token: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignUpResponse {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignInRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

impl IdentityToolkitClient {
    pub fn new(config: &IdentityToolkitConfig) -> Self {
        Self {
            http_client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    /// POST `body` to `accounts:{action}` and decode the success response.
    async fn call<B, R>(&self, action: &str, body: &B) -> Result<R, ProviderError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}/v1/accounts:{}", self.base_url, action);

        tracing::debug!("Calling identity toolkit {}", url);

        let response = self
            .http_client
            .post(&url)
            .query(&[("key", &self.api_key)])
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_error(status, &body));
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))
    }
}

/// Map an error response from the identity toolkit.
fn classify_error(status: StatusCode, body: &str) -> ProviderError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| body.to_string());

    if message.starts_with("EMAIL_EXISTS") {
        ProviderError::AlreadyExists
    } else if status.is_client_error() {
        ProviderError::Rejected(message)
    } else {
        ProviderError::Unavailable(format!("{}: {}", status, message))
    }
}

#[async_trait]
impl AccountProvider for IdentityToolkitClient {
    async fn create_account(&self, account: &NewAccount) -> Result<IdentityClaim, ProviderError> {
        let created: SignUpResponse = self
            .call(
                "signUp",
                &SignUpRequest {
                    email: &account.email,
                    password: &account.password,
                    display_name: &account.display_name,
                    return_secure_token: true,
                },
            )
            .await?;

        Ok(IdentityClaim {
            subject_id: created.local_id,
            email: created.email.or_else(|| Some(account.email.clone())),
            display_name: Some(account.display_name.clone()),
            sign_in_provider: Some(Provider::Password),
            ..IdentityClaim::default()
        })
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<IdentityClaim, ProviderError> {
        let signed_in: SignInResponse = self
            .call(
                "signInWithPassword",
                &SignInRequest {
                    email,
                    password,
                    return_secure_token: true,
                },
            )
            .await?;

        Ok(IdentityClaim {
            subject_id: signed_in.local_id,
            email: signed_in.email.or_else(|| Some(email.to_string())),
            display_name: signed_in.display_name.filter(|name| !name.trim().is_empty()),
            sign_in_provider: Some(Provider::Password),
            ..IdentityClaim::default()
        })
    }
}
