use secrecy::SecretString;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use super::error::GateError;
use crate::identity::{IdentityProvider, IdentitySession};
use crate::store::AdminDirectory;

/// First factor: the identity provider's password check plus the admin role.
#[derive(Clone)]
pub struct CredentialVerifier {
    identity: Arc<dyn IdentityProvider>,
    admins: Arc<dyn AdminDirectory>,
}

impl CredentialVerifier {
    #[must_use]
    pub fn new(identity: Arc<dyn IdentityProvider>, admins: Arc<dyn AdminDirectory>) -> Self {
        Self { identity, admins }
    }

    /// Authenticate and require an administrator record.
    ///
    /// A principal without one has its fresh session torn down before
    /// `NotAuthorized` is returned.
    ///
    /// # Errors
    /// `InvalidCredentials`, `TooManyAttempts`, `NotAuthorized`, or
    /// `Unavailable` when the identity provider cannot be reached.
    #[instrument(skip(self, secret))]
    pub async fn login(
        &self,
        identifier: &str,
        secret: &SecretString,
    ) -> Result<IdentitySession, GateError> {
        let session = self.identity.sign_in(identifier, secret).await?;
        let principal = &session.principal;

        let authorized = match self.admins.is_admin(&principal.email).await {
            Ok(authorized) => authorized,
            Err(err) => {
                error!(principal_id = %principal.id, "admin directory lookup failed: {err}");
                false
            }
        };

        if authorized {
            info!(principal_id = %principal.id, "administrator passed first factor");
            return Ok(session);
        }

        if let Err(err) = self.identity.sign_out(&session.token).await {
            error!(principal_id = %principal.id, "failed to tear down non-admin session: {err}");
        }
        warn!(principal_id = %principal.id, "non-admin sign in rejected");
        Err(GateError::NotAuthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::clock::SystemClock;
    use crate::identity::MemoryIdentityProvider;
    use crate::store::memory::{MemoryAdminDirectory, MemorySessionStore};
    use chrono::Duration;

    fn secret(value: &str) -> SecretString {
        SecretString::from(value.to_string())
    }

    async fn fixture() -> (Arc<MemoryIdentityProvider>, CredentialVerifier) {
        let identity = Arc::new(MemoryIdentityProvider::new(
            Arc::new(MemorySessionStore::new()),
            Arc::new(SystemClock),
            Duration::hours(24),
        ));
        identity.add_account("admin@b.com", &secret("pw")).await;
        identity.add_account("guest@b.com", &secret("pw")).await;
        let admins = Arc::new(MemoryAdminDirectory::with_admins(["admin@b.com"]));
        let verifier = CredentialVerifier::new(identity.clone(), admins);
        (identity, verifier)
    }

    #[tokio::test]
    async fn admin_gets_a_live_session() -> Result<(), GateError> {
        let (identity, verifier) = fixture().await;
        let session = verifier.login("Admin@B.com", &secret("pw")).await?;
        assert_eq!(
            identity.current_principal(&session.token).await?,
            Some(session.principal)
        );
        Ok(())
    }

    #[tokio::test]
    async fn wrong_password_is_invalid_credentials() {
        let (_identity, verifier) = fixture().await;
        assert!(matches!(
            verifier.login("admin@b.com", &secret("nope")).await,
            Err(GateError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn non_admin_is_rejected_and_signed_out() -> Result<(), GateError> {
        let store = Arc::new(MemorySessionStore::new());
        let identity = Arc::new(MemoryIdentityProvider::new(
            store.clone(),
            Arc::new(SystemClock),
            Duration::hours(24),
        ));
        identity.add_account("guest@b.com", &secret("pw")).await;
        let verifier =
            CredentialVerifier::new(identity, Arc::new(MemoryAdminDirectory::new()));

        let result = verifier.login("guest@b.com", &secret("pw")).await;
        assert!(matches!(result, Err(GateError::NotAuthorized)));
        assert!(store.is_empty().await);
        Ok(())
    }
}
