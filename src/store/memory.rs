//! Process-local store implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    AdminDirectory, CodeRepository, SessionStore, StoreError, generate_session_token,
    hash_session_token,
};
use crate::gate::models::{
    ADMIN_ROLE, AdministratorRecord, LiveSession, OneTimeCode, Principal, PrincipalId,
    is_code_shaped, normalize_email,
};

#[derive(Debug, Default)]
pub struct MemoryAdminDirectory {
    emails: Mutex<HashSet<String>>,
}

impl MemoryAdminDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a directory with the given admin emails.
    #[must_use]
    pub fn with_admins<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let emails = emails
            .into_iter()
            .map(|email| normalize_email(email.as_ref()))
            .collect();
        Self {
            emails: Mutex::new(emails),
        }
    }
}

#[async_trait]
impl AdminDirectory for MemoryAdminDirectory {
    async fn is_admin(&self, email: &str) -> Result<bool, StoreError> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Ok(false);
        }
        Ok(self.emails.lock().await.contains(&email))
    }

    async fn grant(&self, email: &str) -> Result<bool, StoreError> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(StoreError::Invalid("empty email".to_string()));
        }
        Ok(self.emails.lock().await.insert(email))
    }

    async fn revoke(&self, email: &str) -> Result<bool, StoreError> {
        Ok(self.emails.lock().await.remove(&normalize_email(email)))
    }

    async fn list(&self) -> Result<Vec<AdministratorRecord>, StoreError> {
        let mut records: Vec<AdministratorRecord> = self
            .emails
            .lock()
            .await
            .iter()
            .map(|email| AdministratorRecord {
                email: email.clone(),
                role: ADMIN_ROLE.to_string(),
            })
            .collect();
        records.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(records)
    }
}

#[derive(Debug, Default)]
pub struct MemoryCodeRepository {
    codes: Mutex<HashMap<Uuid, OneTimeCode>>,
}

impl MemoryCodeRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored record, oldest first.
    pub async fn records(&self) -> Vec<OneTimeCode> {
        let mut records: Vec<OneTimeCode> = self.codes.lock().await.values().cloned().collect();
        records.sort_by_key(|record| record.created_at);
        records
    }
}

#[async_trait]
impl CodeRepository for MemoryCodeRepository {
    async fn insert(&self, code: &OneTimeCode) -> Result<(), StoreError> {
        if !is_code_shaped(&code.code) {
            return Err(StoreError::Invalid("code must be six digits".to_string()));
        }
        self.codes.lock().await.insert(code.id, code.clone());
        Ok(())
    }

    async fn find_unused(
        &self,
        owner: &PrincipalId,
        code: &str,
    ) -> Result<Option<OneTimeCode>, StoreError> {
        let codes = self.codes.lock().await;
        Ok(codes
            .values()
            .filter(|record| !record.used && &record.owner == owner && record.code == code)
            .max_by_key(|record| record.created_at)
            .cloned())
    }

    async fn mark_used(
        &self,
        id: Uuid,
        used_at: Option<DateTime<Utc>>,
    ) -> Result<bool, StoreError> {
        let mut codes = self.codes.lock().await;
        match codes.get_mut(&id) {
            Some(record) if !record.used => {
                record.used = true;
                record.used_at = used_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn purge_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut codes = self.codes.lock().await;
        let before = codes.len();
        codes.retain(|_, record| record.expires_at >= cutoff);
        Ok((before - codes.len()) as u64)
    }
}

#[derive(Debug)]
struct SessionEntry {
    session: LiveSession,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<Vec<u8>, SessionEntry>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(
        &self,
        principal: &Principal,
        expires_at: DateTime<Utc>,
    ) -> Result<String, StoreError> {
        let token = generate_session_token().map_err(|err| StoreError::Backend(err.to_string()))?;
        self.sessions.lock().await.insert(
            hash_session_token(&token),
            SessionEntry {
                session: LiveSession::new(principal.clone()),
                expires_at,
            },
        );
        Ok(token)
    }

    async fn lookup(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<LiveSession>, StoreError> {
        let mut sessions = self.sessions.lock().await;
        let hash = hash_session_token(token);
        match sessions.get(&hash) {
            Some(entry) if entry.expires_at > now => Ok(Some(entry.session.clone())),
            Some(_) => {
                sessions.remove(&hash);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn elevate(&self, token: &str, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut sessions = self.sessions.lock().await;
        match sessions.get_mut(&hash_session_token(token)) {
            Some(entry) if entry.expires_at > at => {
                entry.session.elevated_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, token: &str) -> Result<(), StoreError> {
        self.sessions
            .lock()
            .await
            .remove(&hash_session_token(token));
        Ok(())
    }

    async fn purge_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, entry| entry.expires_at >= cutoff);
        Ok((before - sessions.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn principal() -> Principal {
        Principal {
            id: PrincipalId::new("uid-1"),
            email: "owner@example.com".to_string(),
        }
    }

    fn code(
        owner: &PrincipalId,
        digits: &str,
        at: DateTime<Utc>,
    ) -> Result<OneTimeCode, StoreError> {
        OneTimeCode::new(owner.clone(), digits.to_string(), at, Duration::minutes(5))
            .ok_or_else(|| StoreError::Invalid("expiry out of range".to_string()))
    }

    #[tokio::test]
    async fn admin_directory_is_case_insensitive() -> Result<(), StoreError> {
        let directory = MemoryAdminDirectory::with_admins(["Owner@Example.com"]);
        assert!(directory.is_admin("owner@example.com").await?);
        assert!(directory.is_admin(" OWNER@example.com").await?);
        assert!(!directory.is_admin("guest@example.com").await?);
        assert!(!directory.is_admin("").await?);
        Ok(())
    }

    #[tokio::test]
    async fn admin_directory_grant_and_revoke() -> Result<(), StoreError> {
        let directory = MemoryAdminDirectory::new();
        assert!(directory.grant("a@b.com").await?);
        assert!(!directory.grant("A@B.com").await?);
        assert_eq!(directory.list().await?.len(), 1);
        assert!(directory.revoke("a@b.com").await?);
        assert!(!directory.revoke("a@b.com").await?);
        assert!(directory.grant("  ").await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn find_unused_prefers_most_recent() -> Result<(), StoreError> {
        let repo = MemoryCodeRepository::new();
        let now = Utc::now();
        let owner = PrincipalId::new("uid-1");
        let older = code(&owner, "111111", now)?;
        let newer = code(&owner, "111111", now + Duration::seconds(10))?;
        repo.insert(&older).await?;
        repo.insert(&newer).await?;

        let found = repo.find_unused(&owner, "111111").await?;
        assert_eq!(found.map(|record| record.id), Some(newer.id));

        let other = repo.find_unused(&PrincipalId::new("uid-2"), "111111").await?;
        assert!(other.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn mark_used_only_wins_once() -> Result<(), StoreError> {
        let repo = MemoryCodeRepository::new();
        let now = Utc::now();
        let owner = PrincipalId::new("uid-1");
        let record = code(&owner, "000001", now)?;
        repo.insert(&record).await?;

        assert!(repo.mark_used(record.id, Some(now)).await?);
        assert!(!repo.mark_used(record.id, Some(now)).await?);
        assert!(repo.find_unused(&owner, "000001").await?.is_none());
        assert!(!repo.mark_used(Uuid::new_v4(), None).await?);
        Ok(())
    }

    #[tokio::test]
    async fn insert_rejects_malformed_code() -> Result<(), StoreError> {
        let repo = MemoryCodeRepository::new();
        let record = code(&PrincipalId::new("uid-1"), "12ab", Utc::now())?;
        assert!(matches!(
            repo.insert(&record).await,
            Err(StoreError::Invalid(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn purge_expired_keeps_live_codes() -> Result<(), StoreError> {
        let repo = MemoryCodeRepository::new();
        let now = Utc::now();
        let owner = PrincipalId::new("uid-1");
        let stale = code(&owner, "222222", now - Duration::hours(2))?;
        let live = code(&owner, "333333", now)?;
        repo.insert(&stale).await?;
        repo.insert(&live).await?;

        assert_eq!(repo.purge_expired(now - Duration::hours(1)).await?, 1);
        let remaining = repo.records().await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, live.id);
        Ok(())
    }

    #[tokio::test]
    async fn sessions_expire_and_delete() -> Result<(), StoreError> {
        let store = MemorySessionStore::new();
        let now = Utc::now();
        let token = store.create(&principal(), now + Duration::hours(1)).await?;

        assert_eq!(
            store.lookup(&token, now).await?,
            Some(LiveSession::new(principal()))
        );
        assert_eq!(store.lookup("unknown", now).await?, None);
        assert_eq!(store.lookup(&token, now + Duration::hours(2)).await?, None);
        assert!(store.is_empty().await);

        let token = store.create(&principal(), now + Duration::hours(1)).await?;
        store.delete(&token).await?;
        assert_eq!(store.lookup(&token, now).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn elevation_sticks_to_the_session() -> Result<(), StoreError> {
        let store = MemorySessionStore::new();
        let now = Utc::now();
        let token = store.create(&principal(), now + Duration::hours(1)).await?;
        let other = store.create(&principal(), now + Duration::hours(1)).await?;

        assert!(store.elevate(&token, now).await?);
        assert!(!store.elevate("unknown", now).await?);
        assert!(!store.elevate(&token, now + Duration::hours(2)).await?);

        let elevated = store.lookup(&token, now).await?;
        assert_eq!(elevated.and_then(|session| session.elevated_at), Some(now));
        let plain = store.lookup(&other, now).await?;
        assert_eq!(plain.and_then(|session| session.elevated_at), None);
        Ok(())
    }

    #[tokio::test]
    async fn purge_expired_drops_only_dead_sessions() -> Result<(), StoreError> {
        let store = MemorySessionStore::new();
        let now = Utc::now();
        store.create(&principal(), now - Duration::hours(1)).await?;
        store.create(&principal(), now - Duration::minutes(1)).await?;
        let live = store.create(&principal(), now + Duration::hours(1)).await?;

        assert_eq!(store.purge_expired(now).await?, 2);
        assert_eq!(store.len().await, 1);
        assert!(store.lookup(&live, now).await?.is_some());
        assert_eq!(store.purge_expired(now).await?, 0);
        Ok(())
    }
}
