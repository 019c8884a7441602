//! First and second login steps.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Response},
};
use secrecy::SecretString;
use std::sync::Arc;
use tracing::{error, instrument};

use super::{
    cookies::{CookieMarkerStore, extract_session_token, session_cookie},
    types::{CodeDelivery, LoginRequest, LoginResponse, VerifyCodeRequest},
};
use crate::gate::{Delivery, Gate, error::GateError};

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Credentials accepted; a code was issued", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = super::types::ErrorResponse),
        (status = 403, description = "Not an administrator", body = super::types::ErrorResponse),
        (status = 429, description = "Too many attempts", body = super::types::ErrorResponse),
        (status = 500, description = "Code could not be generated", body = super::types::ErrorResponse)
    ),
    tag = "auth"
)]
#[instrument(skip_all, fields(email = %request.email))]
pub async fn login(
    gate: Extension<Arc<Gate>>,
    Json(request): Json<LoginRequest>,
) -> Result<Response, GateError> {
    let secret = SecretString::from(request.password);
    let challenge = gate.start_login(&request.email, &secret).await?;

    let mut headers = HeaderMap::new();
    match session_cookie(gate.config(), &challenge.session.token) {
        Ok(cookie) => {
            headers.insert(SET_COOKIE, cookie);
        }
        Err(err) => {
            error!("Failed to build session cookie: {err}");
            return Err(GateError::Unavailable(err.to_string()));
        }
    }

    let (delivery, message) = match challenge.delivery {
        Delivery::Sent => (
            CodeDelivery::Sent,
            "A verification code was sent to your email.".to_string(),
        ),
        Delivery::Failed => (CodeDelivery::Failed, GateError::DeliveryFailed.to_string()),
    };

    let body = LoginResponse {
        delivery,
        expires_at: challenge.expires_at,
        message,
    };
    Ok((StatusCode::OK, headers, Json(body)).into_response())
}

#[utoipa::path(
    post,
    path = "/v1/auth/verify",
    request_body = VerifyCodeRequest,
    responses(
        (status = 204, description = "Code accepted; marker cookies set"),
        (status = 400, description = "Invalid or already used code", body = super::types::ErrorResponse),
        (status = 401, description = "No live session", body = super::types::ErrorResponse),
        (status = 410, description = "Code expired", body = super::types::ErrorResponse)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn verify(
    headers: HeaderMap,
    gate: Extension<Arc<Gate>>,
    Json(request): Json<VerifyCodeRequest>,
) -> Result<Response, GateError> {
    let token = extract_session_token(&headers);
    let mut markers = CookieMarkerStore::from_headers(&headers);

    gate.verify(token.as_deref(), &request.code, &mut markers)
        .await?;

    let mut response_headers = HeaderMap::new();
    markers.apply(gate.config(), &mut response_headers);
    Ok((StatusCode::NO_CONTENT, response_headers).into_response())
}
