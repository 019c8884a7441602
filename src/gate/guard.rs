use chrono::Duration;
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

use super::clock::Clock;
use super::error::GateError;
use super::marker::MarkerStore;
use super::models::AuthState;
use crate::identity::IdentityProvider;
use crate::store::AdminDirectory;

/// Re-derives the caller's state on every protected request.
#[derive(Clone)]
pub struct SessionGuard {
    identity: Arc<dyn IdentityProvider>,
    admins: Arc<dyn AdminDirectory>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl SessionGuard {
    #[must_use]
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        admins: Arc<dyn AdminDirectory>,
        clock: Arc<dyn Clock>,
        timeout: Duration,
    ) -> Self {
        Self {
            identity,
            admins,
            clock,
            timeout,
        }
    }

    /// Resolve the state for a session token and its marker.
    ///
    /// Without a live session the marker is cleared. A live session whose
    /// server-side elevation or client marker is missing or stale is logged
    /// out. Only a principal that still holds the admin role is
    /// `AuthenticatedAdmin`.
    ///
    /// # Errors
    /// `Unavailable` when the session lookup itself fails. The marker and
    /// the session are left untouched in that case.
    #[instrument(skip_all)]
    pub async fn resolve_session(
        &self,
        token: Option<&str>,
        markers: &mut dyn MarkerStore,
    ) -> Result<AuthState, GateError> {
        let session = match token {
            Some(token) => self.identity.session(token).await.map_err(|err| {
                error!("identity session lookup failed: {err}");
                GateError::Unavailable(err.to_string())
            })?,
            None => None,
        };

        let Some(session) = session else {
            markers.clear();
            return Ok(AuthState::Unauthenticated);
        };
        let principal = &session.principal;

        let now = self.clock.now();
        let marker_fresh = markers
            .load()
            .is_some_and(|marker| marker.is_fresh(now, self.timeout));
        let elevated = session.is_elevated(now, self.timeout);
        if !(marker_fresh && elevated) {
            debug!(
                principal_id = %principal.id,
                marker_fresh,
                elevated,
                "second factor missing or stale; signing out"
            );
            self.logout(token, markers).await;
            return Ok(AuthState::Unauthenticated);
        }

        match self.admins.is_admin(&principal.email).await {
            Ok(true) => Ok(AuthState::AuthenticatedAdmin),
            Ok(false) => {
                warn!(principal_id = %principal.id, "admin role no longer present");
                Ok(AuthState::AuthenticatedNonAdmin)
            }
            Err(err) => {
                error!(principal_id = %principal.id, "admin directory lookup failed: {err}");
                Ok(AuthState::AuthenticatedNonAdmin)
            }
        }
    }

    /// Clear the marker and terminate the identity session.
    #[instrument(skip_all)]
    pub async fn logout(&self, token: Option<&str>, markers: &mut dyn MarkerStore) {
        markers.clear();
        let Some(token) = token else {
            return;
        };
        if let Err(err) = self.identity.sign_out(token).await {
            error!("failed to terminate identity session: {err}");
        }
    }
}
