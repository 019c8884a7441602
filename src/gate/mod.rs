//! The two-factor login gate.
//!
//! ## Flow
//!
//! ```text
//! start_login(id, secret)
//!   -> CredentialVerifier::login      identity + admin role
//!   -> CodeIssuer::issue_code         mint + store (5 min, single use)
//!   -> CodeDispatcher::send           email; failure is only a warning
//! verify(session, code)
//!   -> CodeVerifier::verify_code      attempts, expiry, single use,
//!                                     elevate session, write marker
//! resolve(session)
//!   -> SessionGuard::resolve_session  live session + elevation + marker + role
//! ```
//!
//! The marker cookies only mirror the elevation recorded on the session.
//! A marker without a matching server-side elevation never admits anyone.
//!
//! An expired code is burned on first sight, so the user has to restart
//! from the credential step. A principal can hold several live codes at
//! once (one per login); any of them verifies.

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use std::sync::Arc;
use tracing::{error, instrument, warn};

use crate::dispatch::{CodeDispatcher, CodeMessage};
use crate::identity::{IdentityProvider, IdentitySession};
use crate::store::{AdminDirectory, CodeRepository};

pub mod clock;
pub mod config;
pub mod credentials;
pub mod error;
pub mod guard;
pub mod issuer;
pub mod marker;
pub mod models;
pub mod verifier;


use clock::{Clock, SystemClock};
use config::GateConfig;
use credentials::CredentialVerifier;
use error::GateError;
use guard::SessionGuard;
use issuer::CodeIssuer;
use marker::MarkerStore;
use models::AuthState;
use verifier::CodeVerifier;

/// Whether the one-time code reached the dispatcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    Failed,
}

/// Result of a successful first step: the caller now awaits a code.
#[derive(Clone, Debug)]
pub struct LoginChallenge {
    pub session: IdentitySession,
    pub expires_at: DateTime<Utc>,
    pub delivery: Delivery,
}

/// Collaborators the gate is assembled from.
pub struct GateDeps {
    pub identity: Arc<dyn IdentityProvider>,
    pub admins: Arc<dyn AdminDirectory>,
    pub codes: Arc<dyn CodeRepository>,
    pub dispatcher: Arc<dyn CodeDispatcher>,
}

#[derive(Clone)]
pub struct Gate {
    config: GateConfig,
    identity: Arc<dyn IdentityProvider>,
    dispatcher: Arc<dyn CodeDispatcher>,
    credentials: CredentialVerifier,
    issuer: CodeIssuer,
    verifier: CodeVerifier,
    guard: SessionGuard,
}

impl Gate {
    #[must_use]
    pub fn new(config: GateConfig, deps: GateDeps) -> Self {
        Self::with_clock(config, deps, Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(config: GateConfig, deps: GateDeps, clock: Arc<dyn Clock>) -> Self {
        let GateDeps {
            identity,
            admins,
            codes,
            dispatcher,
        } = deps;
        Self {
            credentials: CredentialVerifier::new(identity.clone(), admins.clone()),
            issuer: CodeIssuer::new(codes.clone(), clock.clone(), config.code_ttl()),
            verifier: CodeVerifier::new(codes, identity.clone(), clock.clone())
                .with_attempt_limit(config.max_code_attempts(), config.code_ttl()),
            guard: SessionGuard::new(
                identity.clone(),
                admins,
                clock,
                config.session_timeout(),
            ),
            identity,
            dispatcher,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Check credentials, issue a code and hand it to the dispatcher.
    ///
    /// If the code cannot be stored the new session is signed out again so
    /// the caller restarts from the credential step.
    ///
    /// # Errors
    /// Any [`CredentialVerifier::login`] error, or `CodeGenerationFailed`.
    #[instrument(skip(self, secret))]
    pub async fn start_login(
        &self,
        identifier: &str,
        secret: &SecretString,
    ) -> Result<LoginChallenge, GateError> {
        let session = self.credentials.login(identifier, secret).await?;

        let record = match self.issuer.issue_code(&session.principal.id).await {
            Ok(record) => record,
            Err(err) => {
                if let Err(sign_out) = self.identity.sign_out(&session.token).await {
                    error!("failed to sign out after code generation failure: {sign_out}");
                }
                return Err(err);
            }
        };

        let message =
            CodeMessage::login_code(&session.principal.email, &record.code, record.expires_at);
        let delivery = match self.dispatcher.send(&message).await {
            Ok(()) => Delivery::Sent,
            Err(err) => {
                warn!(principal_id = %session.principal.id, "{}: {err}", GateError::DeliveryFailed);
                Delivery::Failed
            }
        };

        Ok(LoginChallenge {
            session,
            expires_at: record.expires_at,
            delivery,
        })
    }

    /// Verify a code for the principal behind `token`.
    ///
    /// # Errors
    /// `Unauthenticated` without a live session, otherwise any
    /// [`CodeVerifier::verify_code`] error.
    #[instrument(skip_all)]
    pub async fn verify(
        &self,
        token: Option<&str>,
        submitted: &str,
        markers: &mut dyn MarkerStore,
    ) -> Result<(), GateError> {
        let Some(token) = token else {
            return Err(GateError::Unauthenticated);
        };
        let Some(principal) = self.identity.current_principal(token).await? else {
            return Err(GateError::Unauthenticated);
        };
        let session = IdentitySession {
            token: token.to_string(),
            principal,
        };
        self.verifier.verify_code(&session, submitted, markers).await
    }

    /// # Errors
    /// `Unavailable` when the session could not be looked up.
    pub async fn resolve(
        &self,
        token: Option<&str>,
        markers: &mut dyn MarkerStore,
    ) -> Result<AuthState, GateError> {
        self.guard.resolve_session(token, markers).await
    }

    pub async fn logout(&self, token: Option<&str>, markers: &mut dyn MarkerStore) {
        self.guard.logout(token, markers).await;
    }

    /// Forward a password reset request to the identity provider.
    ///
    /// # Errors
    /// `TooManyAttempts` or `Unavailable` from the provider.
    #[instrument(skip(self))]
    pub async fn request_password_reset(&self, email: &str) -> Result<(), GateError> {
        Ok(self.identity.send_password_reset(email).await?)
    }
}
