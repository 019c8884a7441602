//! JSON webhook dispatcher for a transactional mail API.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::{error, instrument};
use url::Url;

use super::{CodeDispatcher, CodeMessage, DispatchError};

/// Posts `{ to, template, params: { code, expires_at } }` to a mail webhook,
/// authenticated with a bearer token when one is configured.
pub struct HttpDispatcher {
    client: Client,
    url: Url,
    token: Option<SecretString>,
}

impl HttpDispatcher {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: Url, token: Option<SecretString>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(Self { client, url, token })
    }
}

fn payload(message: &CodeMessage) -> serde_json::Value {
    json!({
        "to": message.to_email,
        "template": message.template,
        "params": {
            "code": message.code,
            "expires_at": message.expires_at.to_rfc3339(),
        },
    })
}

#[async_trait]
impl CodeDispatcher for HttpDispatcher {
    #[instrument(skip(self, message), fields(template = %message.template))]
    async fn send(&self, message: &CodeMessage) -> Result<(), DispatchError> {
        let mut request = self.client.post(self.url.clone()).json(&payload(message));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|err| DispatchError::Transport(err.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            error!(%status, "mail webhook rejected code message");
            Err(DispatchError::Rejected(format!("webhook returned {status}")))
        }
    }
}
