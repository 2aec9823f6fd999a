//! Identity Toolkit REST provider
//!
//! Talks to `{base_url}/v1/accounts:*` with an API key taken from the
//! environment and sent as a header. Provider error codes are mapped onto
//! AuthError kinds.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

use super::{AuthError, Identity, IdentityProvider};
use crate::config::IdentityConfig;
use crate::llm::API_KEY_HEADER;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct IdentityToolkitProvider {
    api_key: String,
    base_url: String,
    min_password_len: usize,
    http: Client,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    #[serde(default)]
    local_id: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
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

/// Map an Identity Toolkit error code (e.g. `EMAIL_EXISTS`) to an AuthError
///
/// Codes may carry a suffix such as `WEAK_PASSWORD : Password should be...`.
pub fn map_error_code(message: &str, min_password_len: usize) -> AuthError {
    let code = message.split([' ', ':']).next().unwrap_or_default();
    match code {
        "EMAIL_EXISTS" => AuthError::EmailInUse,
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" | "INVALID_EMAIL" | "USER_DISABLED"
        | "MISSING_PASSWORD" => AuthError::InvalidCredentials,
        "WEAK_PASSWORD" => AuthError::WeakPassword {
            min_len: min_password_len,
        },
        "INVALID_CUSTOM_TOKEN" | "CREDENTIAL_MISMATCH" | "INVALID_ID_TOKEN" => AuthError::InvalidToken,
        other => AuthError::Unavailable(other.to_string()),
    }
}

/// Transport failure without the request URL
fn unavailable(e: reqwest::Error) -> AuthError {
    AuthError::Unavailable(e.without_url().to_string())
}

impl IdentityToolkitProvider {
    pub fn from_config(config: &IdentityConfig) -> Result<Self, AuthError> {
        debug!(base_url = %config.base_url, "from_config: called");
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| AuthError::Unavailable(format!("{} is not set", config.api_key_env)))?;
        Self::new(api_key, &config.base_url, config.min_password_len)
    }

    pub fn new(api_key: String, base_url: &str, min_password_len: usize) -> Result<Self, AuthError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(unavailable)?;
        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            min_password_len,
            http,
        })
    }

    async fn call<T: for<'de> Deserialize<'de>>(&self, method: &str, body: serde_json::Value) -> Result<T, AuthError> {
        let url = format!("{}/v1/accounts:{}", self.base_url, method);
        debug!(%method, "call: called");
        let response = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, self.api_key.as_str())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                let err = unavailable(e);
                warn!(%method, error = %err, "call: network error");
                err
            })?;

        let status = response.status();
        let text = response.text().await.map_err(unavailable)?;

        if !status.is_success() {
            debug!(%method, status = status.as_u16(), "call: error response");
            return Err(match serde_json::from_str::<ErrorEnvelope>(&text) {
                Ok(envelope) if status.as_u16() == 400 => map_error_code(&envelope.error.message, self.min_password_len),
                _ => AuthError::Unavailable(format!("HTTP {}", status.as_u16())),
            });
        }

        serde_json::from_str(&text).map_err(|e| AuthError::Unavailable(e.to_string()))
    }

    fn identity_from(&self, response: AuthResponse, fallback_email: &str) -> Result<Identity, AuthError> {
        let uid = response
            .local_id
            .ok_or_else(|| AuthError::Unavailable("response missing localId".to_string()))?;
        Ok(Identity::new(uid, response.email.unwrap_or_else(|| fallback_email.to_string())))
    }
}

#[async_trait]
impl IdentityProvider for IdentityToolkitProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let response: AuthResponse = self
            .call(
                "signInWithPassword",
                json!({"email": email, "password": password, "returnSecureToken": true}),
            )
            .await?;
        self.identity_from(response, email)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let response: AuthResponse = self
            .call(
                "signUp",
                json!({"email": email, "password": password, "returnSecureToken": true}),
            )
            .await?;
        self.identity_from(response, email)
    }

    async fn sign_in_with_custom_token(&self, token: &str) -> Result<Identity, AuthError> {
        let response: AuthResponse = self
            .call("signInWithCustomToken", json!({"token": token, "returnSecureToken": true}))
            .await?;
        let id_token = response
            .id_token
            .ok_or_else(|| AuthError::Unavailable("response missing idToken".to_string()))?;

        // The token exchange does not return the uid; look it up
        let lookup: LookupResponse = self.call("lookup", json!({"idToken": id_token})).await?;
        let user = lookup.users.into_iter().next().ok_or(AuthError::InvalidToken)?;
        Ok(Identity::new(user.local_id, user.email.unwrap_or_default()))
    }
}
