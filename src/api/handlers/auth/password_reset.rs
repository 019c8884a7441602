use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};
use std::sync::Arc;
use tracing::{error, instrument};

use super::types::PasswordResetRequest;
use crate::gate::Gate;

#[utoipa::path(
    post,
    path = "/v1/auth/password-reset",
    request_body = PasswordResetRequest,
    responses(
        (status = 204, description = "Request accepted")
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn password_reset(
    gate: Extension<Arc<Gate>>,
    Json(request): Json<PasswordResetRequest>,
) -> impl IntoResponse {
    // The outcome is never reported so the endpoint cannot probe accounts.
    if let Err(err) = gate.request_password_reset(&request.email).await {
        error!("Password reset request failed: {err:?}");
    }
    StatusCode::NO_CONTENT
}
