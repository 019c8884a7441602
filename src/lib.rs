//! # Admingate (two-factor admin login gate)
//!
//! `admingate` guards a small admin panel with a two-step login:
//!
//! 1. **Credentials.** The identifier and password are checked by an external
//!    identity provider. The principal must also hold an `admin` record in
//!    the administrator directory; anyone else is signed straight back out.
//! 2. **One-time code.** A six-digit code is minted, stored with a five
//!    minute expiry and a single-use flag, and sent to the administrator's
//!    email. Submitting it marks it used, records the elevation on the
//!    identity session and writes an elevated-session marker to the client.
//!
//! Every protected request goes through the session guard, which requires a
//! live identity session elevated within the session timeout, a matching
//! client marker, and a still-present admin role. Everyone else is
//! redirected to the login entry point.
//!
//! ## Storage
//!
//! Codes, administrator records and identity sessions live in PostgreSQL
//! (`sql/schema.sql`). Without a DSN the server falls back to in-memory
//! stores, which is how the tests run.

pub mod api;
pub mod cli;
pub mod dispatch;
pub mod gate;
pub mod identity;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(GIT_COMMIT_HASH.len() >= 7);
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with("admingate/"));
        assert!(APP_USER_AGENT.ends_with(env!("CARGO_PKG_VERSION")));
    }
}
