//! Session state and logout endpoints.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::error;

use super::{
    cookies::{CookieMarkerStore, clear_session_cookie, extract_session_token},
    types::SessionResponse,
};
use crate::gate::{Gate, error::GateError, models::AuthState};

const CLEAR_SITE_DATA: HeaderName = HeaderName::from_static("clear-site-data");

#[utoipa::path(
    get,
    path = "/v1/auth/session",
    responses(
        (status = 200, description = "Resolved session state", body = SessionResponse),
        (status = 503, description = "Session could not be looked up; cookies untouched", body = super::types::ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn session(
    headers: HeaderMap,
    gate: Extension<Arc<Gate>>,
) -> Result<Response, GateError> {
    let token = extract_session_token(&headers);
    let mut markers = CookieMarkerStore::from_headers(&headers);

    let state = gate.resolve(token.as_deref(), &mut markers).await?;

    let mut response_headers = HeaderMap::new();
    markers.apply(gate.config(), &mut response_headers);
    if state == AuthState::Unauthenticated && token.is_some() {
        match clear_session_cookie(gate.config()) {
            Ok(cookie) => {
                response_headers.append(SET_COOKIE, cookie);
            }
            Err(err) => error!("Failed to build session cookie: {err}"),
        }
    }

    Ok((
        StatusCode::OK,
        response_headers,
        Json(SessionResponse { state }),
    )
        .into_response())
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 204, description = "Session terminated and cookies cleared")
    ),
    tag = "auth"
)]
pub async fn logout(headers: HeaderMap, gate: Extension<Arc<Gate>>) -> impl IntoResponse {
    let token = extract_session_token(&headers);
    let mut markers = CookieMarkerStore::from_headers(&headers);

    gate.logout(token.as_deref(), &mut markers).await;
    markers.force_clear();

    // Always clear the cookies, even if the session record was missing.
    let mut response_headers = HeaderMap::new();
    markers.apply(gate.config(), &mut response_headers);
    if let Ok(cookie) = clear_session_cookie(gate.config()) {
        response_headers.append(SET_COOKIE, cookie);
    }
    response_headers.insert(CLEAR_SITE_DATA, HeaderValue::from_static("\"cache\""));
    (StatusCode::NO_CONTENT, response_headers)
}
