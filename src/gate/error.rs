use thiserror::Error;

use crate::identity::IdentityError;
use crate::store::StoreError;

/// Failures surfaced by the login gate. Messages are safe to show to users.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("Invalid email or password.")]
    InvalidCredentials,
    #[error("Too many attempts. Try again later.")]
    TooManyAttempts,
    #[error("This account is not authorized to access the admin panel.")]
    NotAuthorized,
    #[error("Could not generate a verification code. Try again.")]
    CodeGenerationFailed,
    #[error("The verification code could not be delivered.")]
    DeliveryFailed,
    #[error("Invalid or already used verification code.")]
    InvalidOrUsedCode,
    #[error("Verification code expired. Please sign in again.")]
    Expired,
    #[error("Sign in first.")]
    Unauthenticated,
    #[error("Service temporarily unavailable.")]
    Unavailable(String),
}

impl GateError {
    /// Stable machine-readable kind used in API bodies and logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "invalid_credentials",
            Self::TooManyAttempts => "too_many_attempts",
            Self::NotAuthorized => "not_authorized",
            Self::CodeGenerationFailed => "code_generation_failed",
            Self::DeliveryFailed => "delivery_failed",
            Self::InvalidOrUsedCode => "invalid_or_used_code",
            Self::Expired => "expired",
            Self::Unauthenticated => "unauthenticated",
            Self::Unavailable(_) => "unavailable",
        }
    }
}

impl From<IdentityError> for GateError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::InvalidCredentials => Self::InvalidCredentials,
            IdentityError::TooManyAttempts => Self::TooManyAttempts,
            IdentityError::Unavailable(detail) => Self::Unavailable(detail),
        }
    }
}

impl From<StoreError> for GateError {
    fn from(err: StoreError) -> Self {
        Self::Unavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_errors_keep_their_meaning() {
        assert!(matches!(
            GateError::from(IdentityError::InvalidCredentials),
            GateError::InvalidCredentials
        ));
        assert!(matches!(
            GateError::from(IdentityError::TooManyAttempts),
            GateError::TooManyAttempts
        ));
        assert!(matches!(
            GateError::from(IdentityError::Unavailable("down".into())),
            GateError::Unavailable(_)
        ));
    }

    #[test]
    fn backend_detail_stays_out_of_the_message() {
        let err = GateError::from(StoreError::Backend("connection refused".into()));
        assert_eq!(err.kind(), "unavailable");
        assert!(!err.to_string().contains("connection refused"));
    }
}
