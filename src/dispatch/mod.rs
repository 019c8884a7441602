//! Delivery of one-time codes to the principal's address.
//!
//! The issuer never sends anything itself; the login flow hands the minted
//! code to a [`CodeDispatcher`]. A failed delivery is reported back to the
//! caller but never rolls back the stored code.
//!
//! The default dispatcher for local development is [`LogDispatcher`], which
//! logs the message instead of sending it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

mod http;

pub use http::HttpDispatcher;

/// Template name used for login codes.
pub const LOGIN_CODE_TEMPLATE: &str = "admin_login_code";

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("dispatch rejected: {0}")]
    Rejected(String),
    #[error("dispatch transport failed: {0}")]
    Transport(String),
}

#[derive(Clone, Debug, Serialize)]
pub struct CodeMessage {
    pub to_email: String,
    pub template: String,
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

impl CodeMessage {
    #[must_use]
    pub fn login_code(to_email: &str, code: &str, expires_at: DateTime<Utc>) -> Self {
        Self {
            to_email: to_email.to_string(),
            template: LOGIN_CODE_TEMPLATE.to_string(),
            code: code.to_string(),
            expires_at,
        }
    }
}

#[async_trait]
pub trait CodeDispatcher: Send + Sync {
    /// Deliver a message or return an error so the caller can warn the user.
    async fn send(&self, message: &CodeMessage) -> Result<(), DispatchError>;
}

/// Local dev dispatcher that logs the payload instead of sending email.
#[derive(Clone, Debug, Default)]
pub struct LogDispatcher;

#[async_trait]
impl CodeDispatcher for LogDispatcher {
    async fn send(&self, message: &CodeMessage) -> Result<(), DispatchError> {
        info!(
            to_email = %message.to_email,
            template = %message.template,
            code = %message.code,
            expires_at = %message.expires_at,
            "code dispatch stub"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_dispatcher_accepts_everything() {
        let message = CodeMessage::login_code("a@b.com", "012345", Utc::now());
        assert_eq!(message.template, LOGIN_CODE_TEMPLATE);
        assert!(LogDispatcher.send(&message).await.is_ok());
    }
}
