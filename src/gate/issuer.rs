use chrono::Duration;
use rand::{Rng, rngs::OsRng};
use std::sync::Arc;
use tracing::{debug, error, instrument};

use super::clock::Clock;
use super::error::GateError;
use super::models::{OneTimeCode, PrincipalId};
use crate::store::CodeRepository;

const CODE_SPACE: u32 = 1_000_000;

/// Mints and persists one-time codes. Delivery is the caller's job.
#[derive(Clone)]
pub struct CodeIssuer {
    codes: Arc<dyn CodeRepository>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl CodeIssuer {
    #[must_use]
    pub fn new(codes: Arc<dyn CodeRepository>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self { codes, clock, ttl }
    }

    /// Persist a fresh code for `owner` and return the stored record.
    ///
    /// # Errors
    /// `CodeGenerationFailed` when the record could not be stored; nothing
    /// should be delivered in that case.
    #[instrument(skip(self))]
    pub async fn issue_code(&self, owner: &PrincipalId) -> Result<OneTimeCode, GateError> {
        let record = OneTimeCode::new(owner.clone(), generate_code(), self.clock.now(), self.ttl)
            .ok_or_else(|| {
                error!(ttl = %self.ttl, "one-time code expiry out of range");
                GateError::CodeGenerationFailed
            })?;

        self.codes.insert(&record).await.map_err(|err| {
            error!("failed to store one-time code: {err}");
            GateError::CodeGenerationFailed
        })?;

        debug!(code_id = %record.id, expires_at = %record.expires_at, "issued one-time code");
        Ok(record)
    }
}

/// Uniform six-digit decimal string, leading zeros kept.
#[must_use]
pub fn generate_code() -> String {
    format!("{:06}", OsRng.gen_range(0..CODE_SPACE))
}
