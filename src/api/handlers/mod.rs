//! API handlers for the login gate and the guarded admin surface.

pub mod admin;
pub mod auth;
pub mod health;
pub mod root;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{error, warn};

use crate::gate::error::GateError;
use auth::types::ErrorResponse;

impl GateError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidCredentials | Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::TooManyAttempts => StatusCode::TOO_MANY_REQUESTS,
            Self::NotAuthorized => StatusCode::FORBIDDEN,
            Self::CodeGenerationFailed => StatusCode::INTERNAL_SERVER_ERROR,
            Self::DeliveryFailed => StatusCode::BAD_GATEWAY,
            Self::InvalidOrUsedCode => StatusCode::BAD_REQUEST,
            Self::Expired => StatusCode::GONE,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            Self::Unavailable(detail) => error!("Gate backend failure: {detail}"),
            Self::CodeGenerationFailed => error!("Gate failed to generate a code"),
            other => warn!(kind = other.kind(), "Gate request rejected"),
        }
        let body = ErrorResponse {
            error: self.kind().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn gate_errors_map_to_status_and_body() -> anyhow::Result<()> {
        let cases = [
            (GateError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (GateError::TooManyAttempts, StatusCode::TOO_MANY_REQUESTS),
            (GateError::NotAuthorized, StatusCode::FORBIDDEN),
            (GateError::CodeGenerationFailed, StatusCode::INTERNAL_SERVER_ERROR),
            (GateError::DeliveryFailed, StatusCode::BAD_GATEWAY),
            (GateError::InvalidOrUsedCode, StatusCode::BAD_REQUEST),
            (GateError::Expired, StatusCode::GONE),
            (GateError::Unauthenticated, StatusCode::UNAUTHORIZED),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }

        let response = GateError::Unavailable("pool timed out".into()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let body: serde_json::Value = serde_json::from_slice(&bytes)?;
        assert_eq!(body["error"], "unavailable");
        assert!(!body["message"].to_string().contains("pool timed out"));
        Ok(())
    }
}
