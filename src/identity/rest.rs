//! Identity Toolkit compatible REST provider.
//!
//! Primary credentials are checked with `accounts:signInWithPassword`; reset
//! emails go through `accounts:sendOobCode`. The provider's own tokens are
//! not kept: once the password check passes, the session lives in our
//! [`SessionStore`](crate::store::SessionStore).

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, instrument, warn};
use url::Url;

use super::{IdentityError, IdentityProvider, IdentitySession, Sessions};
use crate::gate::clock::Clock;
use crate::gate::models::{LiveSession, Principal, PrincipalId, normalize_email};
use crate::store::SessionStore;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    local_id: String,
    email: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

pub struct RestIdentityProvider {
    client: Client,
    base_url: Url,
    api_key: SecretString,
    sessions: Sessions,
}

impl RestIdentityProvider {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        base_url: Url,
        api_key: SecretString,
        store: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
        session_ttl: Duration,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url,
            api_key,
            sessions: Sessions::new(store, clock, session_ttl),
        })
    }

    fn endpoint(&self, action: &str) -> Result<Url, IdentityError> {
        endpoint_url(&self.base_url, action, self.api_key.expose_secret())
    }

    async fn post(
        &self,
        action: &str,
        body: serde_json::Value,
    ) -> Result<reqwest::Response, IdentityError> {
        let url = self.endpoint(action)?;
        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|err| IdentityError::Unavailable(err.to_string()))?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let message = response
            .json::<ErrorEnvelope>()
            .await
            .map(|envelope| envelope.error.message)
            .unwrap_or_default();
        Err(classify_error(status, &message))
    }
}

fn endpoint_url(base_url: &Url, action: &str, api_key: &str) -> Result<Url, IdentityError> {
    let base = base_url.as_str().trim_end_matches('/');
    let mut url = Url::parse(&format!("{base}/v1/accounts:{action}"))
        .map_err(|err| IdentityError::Unavailable(format!("invalid identity endpoint: {err}")))?;
    url.query_pairs_mut().append_pair("key", api_key);
    Ok(url)
}

/// Map an Identity Toolkit error message onto the gate's taxonomy.
fn classify_error(status: reqwest::StatusCode, message: &str) -> IdentityError {
    // Messages look like `TOO_MANY_ATTEMPTS_TRY_LATER : <detail>`.
    let code = message.split(':').next().map_or("", str::trim);
    match code {
        "TOO_MANY_ATTEMPTS_TRY_LATER" => IdentityError::TooManyAttempts,
        "INVALID_LOGIN_CREDENTIALS" | "INVALID_PASSWORD" | "EMAIL_NOT_FOUND" | "USER_DISABLED"
        | "INVALID_EMAIL" | "MISSING_PASSWORD" => IdentityError::InvalidCredentials,
        _ if status == reqwest::StatusCode::TOO_MANY_REQUESTS => IdentityError::TooManyAttempts,
        _ => {
            error!(%status, code, "unexpected identity provider error");
            IdentityError::Unavailable(format!("identity provider returned {status}"))
        }
    }
}

#[async_trait]
impl IdentityProvider for RestIdentityProvider {
    #[instrument(skip(self, secret))]
    async fn sign_in(
        &self,
        identifier: &str,
        secret: &SecretString,
    ) -> Result<IdentitySession, IdentityError> {
        let body = json!({
            "email": identifier.trim(),
            "password": secret.expose_secret(),
            "returnSecureToken": true,
        });
        let response = self.post("signInWithPassword", body).await?;
        let account: SignInResponse = response
            .json()
            .await
            .map_err(|err| IdentityError::Unavailable(err.to_string()))?;

        let email = normalize_email(account.email.as_deref().unwrap_or(identifier));
        self.sessions
            .open(Principal {
                id: PrincipalId(account.local_id),
                email,
            })
            .await
    }

    async fn session(&self, token: &str) -> Result<Option<LiveSession>, IdentityError> {
        self.sessions.current(token).await
    }

    async fn elevate(&self, token: &str, at: DateTime<Utc>) -> Result<bool, IdentityError> {
        self.sessions.elevate(token, at).await
    }

    async fn sign_out(&self, token: &str) -> Result<(), IdentityError> {
        self.sessions.close(token).await
    }

    #[instrument(skip(self))]
    async fn send_password_reset(&self, email: &str) -> Result<(), IdentityError> {
        let body = json!({
            "requestType": "PASSWORD_RESET",
            "email": normalize_email(email),
        });
        match self.post("sendOobCode", body).await {
            Ok(_) => Ok(()),
            // Unknown addresses are not reported to callers.
            Err(IdentityError::InvalidCredentials) => {
                warn!("password reset requested for an unknown or disabled account");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}
