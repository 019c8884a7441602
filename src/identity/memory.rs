//! In-memory identity provider for local development and tests.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use super::{IdentityError, IdentityProvider, IdentitySession, Sessions};
use crate::gate::clock::Clock;
use crate::gate::models::{LiveSession, Principal, PrincipalId, normalize_email};
use crate::store::SessionStore;

const DEFAULT_MAX_FAILURES: u32 = 5;
const DEFAULT_LOCKOUT_SECONDS: i64 = 15 * 60;

struct Account {
    id: PrincipalId,
    secret_hash: Vec<u8>,
}

#[derive(Default)]
struct Failures {
    count: u32,
    last_at: Option<DateTime<Utc>>,
}

pub struct MemoryIdentityProvider {
    accounts: Mutex<HashMap<String, Account>>,
    failures: Mutex<HashMap<String, Failures>>,
    reset_requests: Mutex<Vec<String>>,
    sessions: Sessions,
    clock: Arc<dyn Clock>,
    max_failures: u32,
    lockout: Duration,
}

impl MemoryIdentityProvider {
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>, clock: Arc<dyn Clock>, session_ttl: Duration) -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            reset_requests: Mutex::new(Vec::new()),
            sessions: Sessions::new(store, clock.clone(), session_ttl),
            clock,
            max_failures: DEFAULT_MAX_FAILURES,
            lockout: Duration::seconds(DEFAULT_LOCKOUT_SECONDS),
        }
    }

    /// Consecutive failures before the identifier is locked out.
    #[must_use]
    pub fn with_max_failures(mut self, max_failures: u32) -> Self {
        self.max_failures = max_failures.max(1);
        self
    }

    #[must_use]
    pub fn with_lockout(mut self, lockout: Duration) -> Self {
        self.lockout = lockout;
        self
    }

    /// Register an account and return its principal id.
    pub async fn add_account(&self, email: &str, secret: &SecretString) -> PrincipalId {
        let email = normalize_email(email);
        let id = PrincipalId::new(ulid::Ulid::new().to_string());
        self.accounts.lock().await.insert(
            email,
            Account {
                id: id.clone(),
                secret_hash: hash_secret(secret),
            },
        );
        id
    }

    /// Emails that asked for a password reset, oldest first.
    pub async fn reset_requests(&self) -> Vec<String> {
        self.reset_requests.lock().await.clone()
    }

    async fn locked_out(&self, email: &str) -> bool {
        let now = self.clock.now();
        let mut failures = self.failures.lock().await;
        let Some(entry) = failures.get(email) else {
            return false;
        };
        if entry.count < self.max_failures {
            return false;
        }
        match entry.last_at {
            Some(last_at) if now - last_at < self.lockout => true,
            _ => {
                failures.remove(email);
                false
            }
        }
    }

    /// Counts older than the lockout window start over, and entries for
    /// other identifiers that went quiet for that long are dropped.
    async fn record_failure(&self, email: &str) {
        let now = self.clock.now();
        let lockout = self.lockout;
        let mut failures = self.failures.lock().await;
        failures.retain(|_, entry| entry.last_at.is_some_and(|at| now - at < lockout));
        let entry = failures.entry(email.to_string()).or_default();
        entry.count = entry.count.saturating_add(1);
        entry.last_at = Some(now);
    }
}

fn hash_secret(secret: &SecretString) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(secret.expose_secret().as_bytes());
    hasher.finalize().to_vec()
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn sign_in(
        &self,
        identifier: &str,
        secret: &SecretString,
    ) -> Result<IdentitySession, IdentityError> {
        let email = normalize_email(identifier);
        if self.locked_out(&email).await {
            return Err(IdentityError::TooManyAttempts);
        }

        let principal = {
            let accounts = self.accounts.lock().await;
            accounts
                .get(&email)
                .filter(|account| account.secret_hash == hash_secret(secret))
                .map(|account| Principal {
                    id: account.id.clone(),
                    email: email.clone(),
                })
        };

        let Some(principal) = principal else {
            debug!("memory identity rejected credentials");
            self.record_failure(&email).await;
            return Err(IdentityError::InvalidCredentials);
        };

        self.failures.lock().await.remove(&email);
        self.sessions.open(principal).await
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

    async fn send_password_reset(&self, email: &str) -> Result<(), IdentityError> {
        let email = normalize_email(email);
        if self.accounts.lock().await.contains_key(&email) {
            self.reset_requests.lock().await.push(email);
        }
        Ok(())
    }
}
