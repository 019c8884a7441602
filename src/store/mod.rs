//! Persistence seams for the gate.
//!
//! Each record type gets a thin repository trait so the gate never handles
//! loosely-typed documents. Two backends implement them:
//!
//! - [`memory`]: process-local maps, used by tests and by the server when no
//!   DSN is configured.
//! - [`postgres`]: `sqlx` over the tables in `sql/schema.sql`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::gate::models::{AdministratorRecord, LiveSession, OneTimeCode, Principal, PrincipalId};

pub mod memory;
pub mod postgres;

/// Uniform error type for all storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record failed validation: {0}")]
    Invalid(String),
    #[error("backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Decode(inner) => Self::Invalid(inner.to_string()),
            other => Self::Backend(other.to_string()),
        }
    }
}

/// Administrator role lookups. Only provisioning tools call the mutators.
#[async_trait]
pub trait AdminDirectory: Send + Sync {
    /// True when at least one record matches `email` with role `admin`.
    async fn is_admin(&self, email: &str) -> Result<bool, StoreError>;

    /// Returns `false` when the record already existed.
    async fn grant(&self, email: &str) -> Result<bool, StoreError>;

    /// Returns `false` when there was nothing to remove.
    async fn revoke(&self, email: &str) -> Result<bool, StoreError>;

    async fn list(&self) -> Result<Vec<AdministratorRecord>, StoreError>;
}

/// One-time code persistence.
#[async_trait]
pub trait CodeRepository: Send + Sync {
    async fn insert(&self, code: &OneTimeCode) -> Result<(), StoreError>;

    /// Most recently issued unused record for `owner` carrying `code`.
    async fn find_unused(
        &self,
        owner: &PrincipalId,
        code: &str,
    ) -> Result<Option<OneTimeCode>, StoreError>;

    /// Flip `used` on a still-unused record. Returns `false` when another
    /// caller got there first.
    async fn mark_used(
        &self,
        id: Uuid,
        used_at: Option<DateTime<Utc>>,
    ) -> Result<bool, StoreError>;

    /// Delete records that expired before `cutoff`; returns the count.
    async fn purge_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;
}

/// Live identity sessions keyed by an opaque bearer token.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Store a new session and return the raw token for the cookie.
    async fn create(
        &self,
        principal: &Principal,
        expires_at: DateTime<Utc>,
    ) -> Result<String, StoreError>;

    async fn lookup(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<LiveSession>, StoreError>;

    /// Record that the second factor was satisfied for this session.
    /// Returns `false` when no live session matches `token`.
    async fn elevate(&self, token: &str, at: DateTime<Utc>) -> Result<bool, StoreError>;

    async fn delete(&self, token: &str) -> Result<(), StoreError>;

    /// Delete sessions that expired before `cutoff`; returns the count.
    async fn purge_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;
}

/// Create a new session token for the auth cookie.
/// The raw value is only returned to set the cookie; stores keep a hash.
pub(crate) fn generate_session_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session token")?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

/// Hash a session token so raw values never touch storage.
pub(crate) fn hash_session_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    #[test]
    fn session_token_is_32_random_bytes() {
        let decoded_len = generate_session_token()
            .ok()
            .and_then(|token| URL_SAFE_NO_PAD.decode(token.as_bytes()).ok())
            .map(|bytes| bytes.len());
        assert_eq!(decoded_len, Some(32));
    }

    #[test]
    fn session_token_hash_is_stable() {
        assert_eq!(hash_session_token("token"), hash_session_token("token"));
        assert_ne!(hash_session_token("token"), hash_session_token("other"));
        assert_eq!(hash_session_token("token").len(), 32);
    }

    #[test]
    fn decode_errors_map_to_invalid() {
        let err = StoreError::from(sqlx::Error::Decode("bad code".into()));
        assert!(matches!(err, StoreError::Invalid(_)));

        let err = StoreError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Backend(_)));
    }
}
