//! Login gate endpoints.
//!
//! Flow Overview:
//! 1) `POST /v1/auth/login` checks credentials and the admin role, sets the
//!    session cookie, then issues and mails a one-time code.
//! 2) `POST /v1/auth/verify` consumes the code and sets the marker cookies.
//! 3) `GET /v1/auth/session` and every `/v1/admin/*` route re-run the
//!    session guard.
//! 4) `POST /v1/auth/logout` tears everything down.

pub mod cookies;
pub mod login;
pub mod password_reset;
pub mod session;
pub mod types;
