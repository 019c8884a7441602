//! Typed records handled by the gate.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Only role value that grants access to the admin panel.
pub const ADMIN_ROLE: &str = "admin";

/// Number of digits in a one-time code.
pub const CODE_DIGITS: usize = 6;

/// Opaque account identifier issued by the identity provider.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(pub String);

impl PrincipalId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An authenticated identity as reported by the identity provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    pub email: String,
}

/// Association granting an email the admin role. Read-only for the gate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdministratorRecord {
    pub email: String,
    pub role: String,
}

impl AdministratorRecord {
    #[must_use]
    pub fn admin(email: &str) -> Self {
        Self {
            email: normalize_email(email),
            role: ADMIN_ROLE.to_string(),
        }
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }
}

/// Persisted second-factor code.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OneTimeCode {
    pub id: Uuid,
    pub owner: PrincipalId,
    pub code: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub used_at: Option<DateTime<Utc>>,
}

impl OneTimeCode {
    /// Build a fresh, unused code record valid for `ttl` from `now`.
    /// `None` when the expiry falls outside the representable range.
    #[must_use]
    pub fn new(
        owner: PrincipalId,
        code: String,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Option<Self> {
        let expires_at = now.checked_add_signed(ttl)?;
        Some(Self {
            id: Uuid::new_v4(),
            owner,
            code,
            created_at: now,
            expires_at,
            used: false,
            used_at: None,
        })
    }

    /// Expiry is absolute; a code is still valid at exactly `expires_at`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// Identity session as seen by the gate. `elevated_at` is set server-side
/// when a one-time code is accepted for this session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LiveSession {
    pub principal: Principal,
    pub elevated_at: Option<DateTime<Utc>>,
}

impl LiveSession {
    #[must_use]
    pub fn new(principal: Principal) -> Self {
        Self {
            principal,
            elevated_at: None,
        }
    }

    /// Same freshness window as the cookie marker, measured from the
    /// server-side elevation.
    #[must_use]
    pub fn is_elevated(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        self.elevated_at
            .is_some_and(|at| at <= now && now - at <= timeout)
    }
}

/// Client-held evidence that the second factor was satisfied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ElevatedSessionMarker {
    pub is_admin: bool,
    pub last_login_at: DateTime<Utc>,
}

impl ElevatedSessionMarker {
    #[must_use]
    pub fn elevated(now: DateTime<Utc>) -> Self {
        Self {
            is_admin: true,
            last_login_at: now,
        }
    }

    /// A marker is usable when it claims admin, is not dated in the future and
    /// is no older than `timeout`.
    #[must_use]
    pub fn is_fresh(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        if !self.is_admin || self.last_login_at > now {
            return false;
        }
        now - self.last_login_at <= timeout
    }
}

/// Outcome of a Session Guard pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    Unauthenticated,
    AuthenticatedNonAdmin,
    AuthenticatedAdmin,
}

impl AuthState {
    #[must_use]
    pub fn is_admin(self) -> bool {
        self == Self::AuthenticatedAdmin
    }
}

/// Emails are compared trimmed and lowercased everywhere.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// True when `code` is exactly six ASCII digits.
#[must_use]
pub fn is_code_shaped(code: &str) -> bool {
    code.len() == CODE_DIGITS && code.bytes().all(|b| b.is_ascii_digit())
}
