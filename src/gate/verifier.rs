use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};

use super::clock::Clock;
use super::error::GateError;
use super::marker::MarkerStore;
use super::models::{ElevatedSessionMarker, PrincipalId, is_code_shaped};
use crate::identity::{IdentityProvider, IdentitySession};
use crate::store::CodeRepository;

pub const DEFAULT_MAX_CODE_ATTEMPTS: u32 = 5;

#[derive(Clone, Copy, Debug)]
struct Attempts {
    failures: u32,
    first_at: DateTime<Utc>,
}

/// Second factor: consumes a one-time code and elevates the session.
#[derive(Clone)]
pub struct CodeVerifier {
    codes: Arc<dyn CodeRepository>,
    identity: Arc<dyn IdentityProvider>,
    clock: Arc<dyn Clock>,
    attempts: Arc<Mutex<HashMap<PrincipalId, Attempts>>>,
    max_attempts: u32,
    window: Duration,
}

impl CodeVerifier {
    #[must_use]
    pub fn new(
        codes: Arc<dyn CodeRepository>,
        identity: Arc<dyn IdentityProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            codes,
            identity,
            clock,
            attempts: Arc::new(Mutex::new(HashMap::new())),
            max_attempts: DEFAULT_MAX_CODE_ATTEMPTS,
            window: Duration::minutes(5),
        }
    }

    /// Wrong codes allowed per principal inside `window` before every
    /// submission is refused until the window closes.
    #[must_use]
    pub fn with_attempt_limit(mut self, max_attempts: u32, window: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.window = window;
        self
    }

    /// Verify `submitted` for the session owner, elevate the session
    /// server-side and write the client marker.
    ///
    /// An expired match is burned so it can never verify later. The mark
    /// step only succeeds on a still-unused record, so concurrent
    /// submissions of the same code verify at most once.
    ///
    /// # Errors
    /// `TooManyAttempts` after repeated wrong codes, `InvalidOrUsedCode`,
    /// `Expired`, `Unauthenticated` when the session ended meanwhile, or
    /// `Unavailable` on storage failure.
    #[instrument(skip_all, fields(principal_id = %session.principal.id))]
    pub async fn verify_code(
        &self,
        session: &IdentitySession,
        submitted: &str,
        markers: &mut dyn MarkerStore,
    ) -> Result<(), GateError> {
        let owner = &session.principal.id;
        let now = self.clock.now();
        if self.locked_out(owner, now).await {
            warn!("code attempts exhausted");
            return Err(GateError::TooManyAttempts);
        }

        let submitted = submitted.trim();
        if !is_code_shaped(submitted) {
            self.record_failure(owner, now).await;
            return Err(GateError::InvalidOrUsedCode);
        }

        let Some(record) = self.codes.find_unused(owner, submitted).await? else {
            warn!("no unused code matched");
            self.record_failure(owner, now).await;
            return Err(GateError::InvalidOrUsedCode);
        };

        if record.is_expired(now) {
            self.codes.mark_used(record.id, None).await?;
            warn!(code_id = %record.id, "expired code burned");
            return Err(GateError::Expired);
        }

        if !self.codes.mark_used(record.id, Some(now)).await? {
            warn!(code_id = %record.id, "code consumed concurrently");
            return Err(GateError::InvalidOrUsedCode);
        }

        match self.identity.elevate(&session.token, now).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(code_id = %record.id, "session ended before elevation");
                return Err(GateError::Unauthenticated);
            }
            Err(err) => {
                error!(code_id = %record.id, "failed to elevate session: {err}");
                return Err(GateError::from(err));
            }
        }

        self.attempts.lock().await.remove(owner);
        markers.save(ElevatedSessionMarker::elevated(now));
        info!(code_id = %record.id, "second factor verified");
        Ok(())
    }

    async fn locked_out(&self, owner: &PrincipalId, now: DateTime<Utc>) -> bool {
        let attempts = self.attempts.lock().await;
        attempts.get(owner).is_some_and(|entry| {
            entry.failures >= self.max_attempts && now - entry.first_at < self.window
        })
    }

    async fn record_failure(&self, owner: &PrincipalId, now: DateTime<Utc>) {
        let window = self.window;
        let mut attempts = self.attempts.lock().await;
        attempts.retain(|_, entry| now - entry.first_at < window);
        let entry = attempts.entry(owner.clone()).or_insert(Attempts {
            failures: 0,
            first_at: now,
        });
        entry.failures = entry.failures.saturating_add(1);
    }
}
