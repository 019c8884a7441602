//! Request/response types for auth endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::gate::models::AuthState;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CodeDelivery {
    Sent,
    Failed,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    pub delivery: CodeDelivery,
    pub expires_at: DateTime<Utc>,
    pub message: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyCodeRequest {
    pub code: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SessionResponse {
    #[schema(value_type = String, example = "authenticated_admin")]
    pub state: AuthState,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    #[test]
    fn login_response_uses_snake_case_delivery() -> Result<()> {
        let response = LoginResponse {
            delivery: CodeDelivery::Failed,
            expires_at: Utc::now(),
            message: "x".to_string(),
        };
        let value = serde_json::to_value(&response)?;
        let delivery = value
            .get("delivery")
            .and_then(serde_json::Value::as_str)
            .context("missing delivery")?;
        assert_eq!(delivery, "failed");
        Ok(())
    }

    #[test]
    fn session_response_reports_state() -> Result<()> {
        let value = serde_json::to_value(SessionResponse {
            state: AuthState::Unauthenticated,
        })?;
        assert_eq!(value["state"], "unauthenticated");
        Ok(())
    }
}
