//! Guarded admin surface.
//!
//! Every route here sits behind [`require_admin`], which runs the session
//! guard on each request. Anything short of `authenticated_admin` is sent
//! to the login entry point with the requested path in `?next=`. When the
//! session cannot be looked up the request fails with 503 and no cookie is
//! touched.

use axum::{
    Json,
    extract::{Extension, Request},
    http::{HeaderMap, header::SET_COOKIE},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};
use url::form_urlencoded;
use utoipa::ToSchema;

use super::auth::cookies::{CookieMarkerStore, clear_session_cookie, extract_session_token};
use crate::gate::{Gate, config::GateConfig, models::AuthState};

/// Sections of the portfolio admin panel.
const SECTIONS: [&str; 7] = [
    "projects",
    "blog",
    "technologies",
    "education",
    "certificates",
    "about",
    "messages",
];

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct DashboardResponse {
    pub sections: Vec<String>,
}

/// Login URL for a rejected request, carrying the original target.
pub(crate) fn login_redirect_location(config: &GateConfig, next: &str) -> String {
    let login_path = config.login_path();
    let base = if login_path.starts_with('/') {
        config.frontend_base_url().trim_end_matches('/')
    } else {
        ""
    };
    let next: String = form_urlencoded::byte_serialize(next.as_bytes()).collect();
    format!("{base}{login_path}?next={next}")
}

/// Middleware admitting only verified administrators.
pub async fn require_admin(
    gate: Extension<Arc<Gate>>,
    request: Request,
    next: Next,
) -> Response {
    let headers = request.headers();
    let token = extract_session_token(headers);
    let mut markers = CookieMarkerStore::from_headers(headers);

    let state = match gate.resolve(token.as_deref(), &mut markers).await {
        Ok(state) => state,
        Err(err) => return err.into_response(),
    };

    if state == AuthState::AuthenticatedAdmin {
        let mut response = next.run(request).await;
        markers.apply(gate.config(), response.headers_mut());
        return response;
    }

    let target = request
        .uri()
        .path_and_query()
        .map_or_else(|| request.uri().path().to_string(), ToString::to_string);
    debug!(?state, %target, "redirecting to login");

    let mut cookies = HeaderMap::new();
    markers.apply(gate.config(), &mut cookies);
    if state == AuthState::Unauthenticated && token.is_some() {
        match clear_session_cookie(gate.config()) {
            Ok(cookie) => {
                cookies.append(SET_COOKIE, cookie);
            }
            Err(err) => error!("Failed to build session cookie: {err}"),
        }
    }

    let location = login_redirect_location(gate.config(), &target);
    (cookies, Redirect::to(&location)).into_response()
}

#[utoipa::path(
    get,
    path = "/v1/admin/dashboard",
    responses(
        (status = 200, description = "Admin panel overview", body = DashboardResponse),
        (status = 303, description = "Not a verified administrator; redirected to login"),
        (status = 503, description = "Session could not be looked up", body = super::auth::types::ErrorResponse)
    ),
    tag = "admin"
)]
pub async fn dashboard() -> impl IntoResponse {
    Json(DashboardResponse {
        sections: SECTIONS.iter().map(ToString::to_string).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_points_at_frontend_login_with_next() {
        let config = GateConfig::new("https://portfolio.dev/".to_string());
        assert_eq!(
            login_redirect_location(&config, "/v1/admin/dashboard?tab=blog"),
            "https://portfolio.dev/admin/login?next=%2Fv1%2Fadmin%2Fdashboard%3Ftab%3Dblog"
        );

        let relative = config.with_login_path("login".to_string());
        assert_eq!(
            login_redirect_location(&relative, "/x"),
            "login?next=%2Fx"
        );
    }
}
