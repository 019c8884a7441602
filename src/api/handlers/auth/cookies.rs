//! Session and marker cookies.
//!
//! The identity session rides in an `HttpOnly` cookie. The elevated-session
//! marker is two plain cookies (`is_admin`, `admin_last_login`) that the
//! frontend can read; [`CookieMarkerStore`] loads them from the request and
//! turns writes into `Set-Cookie` headers on the response.

use axum::http::{
    HeaderMap, HeaderValue,
    header::{AUTHORIZATION, COOKIE, InvalidHeaderValue, SET_COOKIE},
};
use tracing::error;

use crate::gate::{
    config::GateConfig,
    marker::{IS_ADMIN_KEY, LAST_LOGIN_KEY, MarkerStore, decode_marker, encode_marker},
    models::ElevatedSessionMarker,
};

pub const SESSION_COOKIE_NAME: &str = "admingate_session";

/// Build a secure `HttpOnly` cookie for the session token.
pub(crate) fn session_cookie(
    config: &GateConfig,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let ttl_seconds = config.session_timeout_seconds();
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    if config.cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(crate) fn clear_session_cookie(config: &GateConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if config.cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn marker_cookie(
    config: &GateConfig,
    name: &str,
    value: &str,
    max_age: i64,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{name}={value}; Path=/; SameSite=Lax; Max-Age={max_age}");
    if config.cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(crate) fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    for header in headers.get_all(COOKIE) {
        let Ok(value) = header.to_str() else {
            continue;
        };
        for pair in value.split(';') {
            let mut parts = pair.trim().splitn(2, '=');
            let (Some(key), Some(val)) = (parts.next(), parts.next()) else {
                continue;
            };
            if key.trim() == name {
                return Some(val.trim().to_string());
            }
        }
    }
    None
}

/// Session token from the cookie, or from a bearer header for API clients.
pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    extract_cookie(headers, SESSION_COOKIE_NAME).filter(|token| !token.is_empty())
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Pending {
    Save(ElevatedSessionMarker),
    Clear,
}

/// Marker store backed by request cookies.
#[derive(Debug)]
pub struct CookieMarkerStore {
    current: Option<ElevatedSessionMarker>,
    present: bool,
    pending: Option<Pending>,
}

impl CookieMarkerStore {
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let is_admin = extract_cookie(headers, IS_ADMIN_KEY);
        let last_login = extract_cookie(headers, LAST_LOGIN_KEY);
        Self {
            present: is_admin.is_some() || last_login.is_some(),
            current: decode_marker(is_admin.as_deref(), last_login.as_deref()),
            pending: None,
        }
    }

    /// Append `Set-Cookie` headers for whatever changed during the request.
    pub fn apply(&self, config: &GateConfig, headers: &mut HeaderMap) {
        let cookies = match self.pending {
            None => return,
            Some(Pending::Clear) if !self.present => return,
            Some(Pending::Save(marker)) => encode_marker(&marker)
                .iter()
                .map(|(name, value)| {
                    marker_cookie(config, name, value, config.session_timeout_seconds())
                })
                .collect::<Vec<_>>(),
            Some(Pending::Clear) => [IS_ADMIN_KEY, LAST_LOGIN_KEY]
                .iter()
                .map(|name| marker_cookie(config, name, "", 0))
                .collect(),
        };
        for cookie in cookies {
            match cookie {
                Ok(value) => {
                    headers.append(SET_COOKIE, value);
                }
                Err(err) => error!("Failed to build marker cookie: {err}"),
            }
        }
    }

    /// Expire the marker cookies even if the request did not carry them.
    pub fn force_clear(&mut self) {
        self.present = true;
        self.clear();
    }
}

impl MarkerStore for CookieMarkerStore {
    fn load(&self) -> Option<ElevatedSessionMarker> {
        self.current
    }

    fn save(&mut self, marker: ElevatedSessionMarker) {
        self.current = Some(marker);
        self.pending = Some(Pending::Save(marker));
    }

    fn clear(&mut self) {
        self.current = None;
        self.pending = Some(Pending::Clear);
    }
}
