//! Client-held elevated-session marker.
//!
//! The marker is two string entries, `is_admin` and `admin_last_login`,
//! written together and cleared together. Only the code verifier writes it
//! and only the session guard reads it; everything else goes through the
//! [`MarkerStore`] trait.

use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::HashMap;

use super::models::ElevatedSessionMarker;

pub const IS_ADMIN_KEY: &str = "is_admin";
pub const LAST_LOGIN_KEY: &str = "admin_last_login";

pub trait MarkerStore: Send {
    fn load(&self) -> Option<ElevatedSessionMarker>;
    fn save(&mut self, marker: ElevatedSessionMarker);
    fn clear(&mut self);
}

/// Encode a marker into its `(key, value)` entries.
#[must_use]
pub fn encode_marker(marker: &ElevatedSessionMarker) -> [(&'static str, String); 2] {
    [
        (IS_ADMIN_KEY, marker.is_admin.to_string()),
        (
            LAST_LOGIN_KEY,
            marker
                .last_login_at
                .to_rfc3339_opts(SecondsFormat::Millis, true),
        ),
    ]
}

/// Decode a marker from its raw entries. Anything malformed reads as absent.
#[must_use]
pub fn decode_marker(
    is_admin: Option<&str>,
    last_login: Option<&str>,
) -> Option<ElevatedSessionMarker> {
    if is_admin? != "true" {
        return None;
    }
    let last_login_at = DateTime::parse_from_rfc3339(last_login?.trim())
        .ok()?
        .with_timezone(&Utc);
    Some(ElevatedSessionMarker {
        is_admin: true,
        last_login_at,
    })
}

/// Plain key-value marker store, the shape of a browser's local storage.
#[derive(Clone, Debug, Default)]
pub struct MemoryMarkerStore {
    entries: HashMap<String, String>,
}

impl MemoryMarkerStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl MarkerStore for MemoryMarkerStore {
    fn load(&self) -> Option<ElevatedSessionMarker> {
        decode_marker(self.get(IS_ADMIN_KEY), self.get(LAST_LOGIN_KEY))
    }

    fn save(&mut self, marker: ElevatedSessionMarker) {
        for (key, value) in encode_marker(&marker) {
            self.entries.insert(key.to_string(), value);
        }
    }

    fn clear(&mut self) {
        self.entries.remove(IS_ADMIN_KEY);
        self.entries.remove(LAST_LOGIN_KEY);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn save_load_clear_cycle() {
        let now = Utc
            .with_ymd_and_hms(2024, 5, 1, 9, 30, 0)
            .single()
            .unwrap_or_default();
        let mut store = MemoryMarkerStore::new();
        assert!(store.load().is_none());

        store.save(ElevatedSessionMarker::elevated(now));
        assert_eq!(store.get(IS_ADMIN_KEY), Some("true"));
        assert_eq!(store.get(LAST_LOGIN_KEY), Some("2024-05-01T09:30:00.000Z"));
        assert_eq!(store.load(), Some(ElevatedSessionMarker::elevated(now)));

        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn malformed_entries_read_as_absent() {
        assert!(decode_marker(Some("true"), None).is_none());
        assert!(decode_marker(None, Some("2024-05-01T09:30:00Z")).is_none());
        assert!(decode_marker(Some("false"), Some("2024-05-01T09:30:00Z")).is_none());
        assert!(decode_marker(Some("true"), Some("yesterday")).is_none());
        assert!(decode_marker(Some("true"), Some("2024-05-01T11:30:00+02:00")).is_some());
    }

    #[test]
    fn unrelated_keys_survive_clear() {
        let mut store = MemoryMarkerStore::new();
        store.set("theme", "dark");
        store.save(ElevatedSessionMarker::elevated(Utc::now()));
        store.clear();
        assert_eq!(store.get("theme"), Some("dark"));
        assert!(store.load().is_none());
    }
}
