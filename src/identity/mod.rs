//! Identity provider seam: primary credential checks and live sessions.
//!
//! The gate never inspects passwords itself. It asks an [`IdentityProvider`]
//! to sign a principal in, and the provider hands back an [`IdentitySession`]
//! whose token the HTTP layer stores in an `HttpOnly` cookie. Session rows
//! live in a [`SessionStore`](crate::store::SessionStore) so that sign-out is
//! a real server-side teardown.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use secrecy::SecretString;
use std::sync::Arc;
use thiserror::Error;

use crate::gate::clock::Clock;
use crate::gate::models::{LiveSession, Principal};
use crate::store::{SessionStore, StoreError};

mod memory;
mod rest;

pub use memory::MemoryIdentityProvider;
pub use rest::RestIdentityProvider;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("too many attempts")]
    TooManyAttempts,
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for IdentityError {
    fn from(err: StoreError) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// A live identity-provider session.
#[derive(Clone, Debug)]
pub struct IdentitySession {
    pub token: String,
    pub principal: Principal,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Check the primary credential and open a session.
    async fn sign_in(
        &self,
        identifier: &str,
        secret: &SecretString,
    ) -> Result<IdentitySession, IdentityError>;

    /// Session behind a token, if it is still live.
    async fn session(&self, token: &str) -> Result<Option<LiveSession>, IdentityError>;

    /// Principal behind a session token, if the session is still live.
    async fn current_principal(&self, token: &str) -> Result<Option<Principal>, IdentityError> {
        Ok(self.session(token).await?.map(|session| session.principal))
    }

    /// Mark a live session as having passed the second factor at `at`.
    /// Returns `false` when the session is gone.
    async fn elevate(&self, token: &str, at: DateTime<Utc>) -> Result<bool, IdentityError>;

    /// Terminate a session. Unknown tokens are not an error.
    async fn sign_out(&self, token: &str) -> Result<(), IdentityError>;

    /// Ask the provider to send its password-reset email.
    async fn send_password_reset(&self, email: &str) -> Result<(), IdentityError>;
}

/// Session bookkeeping shared by the provider implementations.
#[derive(Clone)]
pub(crate) struct Sessions {
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl Sessions {
    pub(crate) fn new(store: Arc<dyn SessionStore>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self { store, clock, ttl }
    }

    async fn open(&self, principal: Principal) -> Result<IdentitySession, IdentityError> {
        let expires_at = self
            .clock
            .now()
            .checked_add_signed(self.ttl)
            .ok_or_else(|| IdentityError::Unavailable("session expiry out of range".to_string()))?;
        let token = self.store.create(&principal, expires_at).await?;
        Ok(IdentitySession { token, principal })
    }

    async fn current(&self, token: &str) -> Result<Option<LiveSession>, IdentityError> {
        if token.is_empty() {
            return Ok(None);
        }
        Ok(self.store.lookup(token, self.clock.now()).await?)
    }

    async fn elevate(&self, token: &str, at: DateTime<Utc>) -> Result<bool, IdentityError> {
        if token.is_empty() {
            return Ok(false);
        }
        Ok(self.store.elevate(token, at).await?)
    }

    async fn close(&self, token: &str) -> Result<(), IdentityError> {
        if token.is_empty() {
            return Ok(());
        }
        Ok(self.store.delete(token).await?)
    }
}
