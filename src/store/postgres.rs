//! PostgreSQL store implementations (`sql/schema.sql`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Row, postgres::PgRow};
use tracing::{Instrument, info_span};
use uuid::Uuid;

use super::{
    AdminDirectory, CodeRepository, SessionStore, StoreError, generate_session_token,
    hash_session_token,
};
use crate::gate::models::{
    ADMIN_ROLE, AdministratorRecord, LiveSession, OneTimeCode, Principal, PrincipalId,
    is_code_shaped, normalize_email,
};

impl<'r> FromRow<'r, PgRow> for OneTimeCode {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let code: String = row.try_get("code")?;
        // CHAR(6) may come back padded; anything but six digits is corrupt.
        let code = code.trim().to_string();
        if !is_code_shaped(&code) {
            return Err(sqlx::Error::Decode(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("invalid one_time_codes.code value: {code:?}"),
            ))));
        }
        Ok(Self {
            id: row.try_get("id")?,
            owner: PrincipalId(row.try_get("owner_principal_id")?),
            code,
            created_at: row.try_get("created_at")?,
            expires_at: row.try_get("expires_at")?,
            used: row.try_get("used")?,
            used_at: row.try_get("used_at")?,
        })
    }
}

fn db_span(operation: &'static str, statement: &'static str) -> tracing::Span {
    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

#[derive(Clone, Debug)]
pub struct PgAdminDirectory {
    pool: PgPool,
}

impl PgAdminDirectory {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AdminDirectory for PgAdminDirectory {
    async fn is_admin(&self, email: &str) -> Result<bool, StoreError> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Ok(false);
        }
        let query = "SELECT EXISTS (SELECT 1 FROM administrators WHERE email = $1 AND role = $2)";
        let exists: bool = sqlx::query_scalar(query)
            .bind(email)
            .bind(ADMIN_ROLE)
            .fetch_one(&self.pool)
            .instrument(db_span("SELECT", query))
            .await?;
        Ok(exists)
    }

    async fn grant(&self, email: &str) -> Result<bool, StoreError> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(StoreError::Invalid("empty email".to_string()));
        }
        let query = r"
            INSERT INTO administrators (email, role)
            VALUES ($1, $2)
            ON CONFLICT (email, role) DO NOTHING
        ";
        let result = sqlx::query(query)
            .bind(email)
            .bind(ADMIN_ROLE)
            .execute(&self.pool)
            .instrument(db_span("INSERT", query))
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn revoke(&self, email: &str) -> Result<bool, StoreError> {
        let query = "DELETE FROM administrators WHERE email = $1 AND role = $2";
        let result = sqlx::query(query)
            .bind(normalize_email(email))
            .bind(ADMIN_ROLE)
            .execute(&self.pool)
            .instrument(db_span("DELETE", query))
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self) -> Result<Vec<AdministratorRecord>, StoreError> {
        let query = "SELECT email, role FROM administrators ORDER BY email";
        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .instrument(db_span("SELECT", query))
            .await?;
        rows.iter()
            .map(|row| {
                Ok(AdministratorRecord {
                    email: row.try_get("email")?,
                    role: row.try_get("role")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(StoreError::from)
    }
}

#[derive(Clone, Debug)]
pub struct PgCodeRepository {
    pool: PgPool,
}

impl PgCodeRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CodeRepository for PgCodeRepository {
    async fn insert(&self, code: &OneTimeCode) -> Result<(), StoreError> {
        if !is_code_shaped(&code.code) {
            return Err(StoreError::Invalid("code must be six digits".to_string()));
        }
        let query = r"
            INSERT INTO one_time_codes
                (id, owner_principal_id, code, created_at, expires_at, used, used_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
        ";
        sqlx::query(query)
            .bind(code.id)
            .bind(code.owner.as_str())
            .bind(&code.code)
            .bind(code.created_at)
            .bind(code.expires_at)
            .bind(code.used)
            .bind(code.used_at)
            .execute(&self.pool)
            .instrument(db_span("INSERT", query))
            .await?;
        Ok(())
    }

    async fn find_unused(
        &self,
        owner: &PrincipalId,
        code: &str,
    ) -> Result<Option<OneTimeCode>, StoreError> {
        let query = r"
            SELECT id, owner_principal_id, code, created_at, expires_at, used, used_at
            FROM one_time_codes
            WHERE owner_principal_id = $1 AND code = $2 AND used = FALSE
            ORDER BY created_at DESC
            LIMIT 1
        ";
        let record = sqlx::query_as::<_, OneTimeCode>(query)
            .bind(owner.as_str())
            .bind(code)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await?;
        Ok(record)
    }

    async fn mark_used(
        &self,
        id: Uuid,
        used_at: Option<DateTime<Utc>>,
    ) -> Result<bool, StoreError> {
        // Conditional update: only one caller can flip a given record.
        let query = r"
            UPDATE one_time_codes
            SET used = TRUE, used_at = $2
            WHERE id = $1 AND used = FALSE
        ";
        let result = sqlx::query(query)
            .bind(id)
            .bind(used_at)
            .execute(&self.pool)
            .instrument(db_span("UPDATE", query))
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn purge_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let query = "DELETE FROM one_time_codes WHERE expires_at < $1";
        let result = sqlx::query(query)
            .bind(cutoff)
            .execute(&self.pool)
            .instrument(db_span("DELETE", query))
            .await?;
        Ok(result.rows_affected())
    }
}

#[derive(Clone, Debug)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create(
        &self,
        principal: &Principal,
        expires_at: DateTime<Utc>,
    ) -> Result<String, StoreError> {
        let query = r"
            INSERT INTO identity_sessions (session_hash, principal_id, email, expires_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (session_hash) DO NOTHING
        ";

        // A token must never map to an existing row; redraw on hash collision.
        for _ in 0..3 {
            let token =
                generate_session_token().map_err(|err| StoreError::Backend(err.to_string()))?;
            let result = sqlx::query(query)
                .bind(hash_session_token(&token))
                .bind(principal.id.as_str())
                .bind(&principal.email)
                .bind(expires_at)
                .execute(&self.pool)
                .instrument(db_span("INSERT", query))
                .await?;
            if result.rows_affected() == 1 {
                return Ok(token);
            }
        }

        Err(StoreError::Backend(
            "failed to allocate a unique session token".to_string(),
        ))
    }

    async fn lookup(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<LiveSession>, StoreError> {
        let query = r"
            SELECT principal_id, email, elevated_at
            FROM identity_sessions
            WHERE session_hash = $1 AND expires_at > $2
        ";
        let row = sqlx::query(query)
            .bind(hash_session_token(token))
            .bind(now)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await?;

        row.map(|row| -> Result<LiveSession, StoreError> {
            Ok(LiveSession {
                principal: Principal {
                    id: PrincipalId(row.try_get("principal_id")?),
                    email: row.try_get("email")?,
                },
                elevated_at: row.try_get("elevated_at")?,
            })
        })
        .transpose()
    }

    async fn elevate(&self, token: &str, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let query = r"
            UPDATE identity_sessions
            SET elevated_at = $2
            WHERE session_hash = $1 AND expires_at > $2
        ";
        let result = sqlx::query(query)
            .bind(hash_session_token(token))
            .bind(at)
            .execute(&self.pool)
            .instrument(db_span("UPDATE", query))
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete(&self, token: &str) -> Result<(), StoreError> {
        let query = "DELETE FROM identity_sessions WHERE session_hash = $1";
        sqlx::query(query)
            .bind(hash_session_token(token))
            .execute(&self.pool)
            .instrument(db_span("DELETE", query))
            .await?;
        Ok(())
    }

    async fn purge_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let query = "DELETE FROM identity_sessions WHERE expires_at < $1";
        let result = sqlx::query(query)
            .bind(cutoff)
            .execute(&self.pool)
            .instrument(db_span("DELETE", query))
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    // The pools below never connect; they only exercise the pre-query guards.

    #[tokio::test]
    async fn is_admin_short_circuits_on_empty_email() -> anyhow::Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let directory = PgAdminDirectory::new(pool);
        assert!(!directory.is_admin("   ").await?);
        Ok(())
    }

    #[tokio::test]
    async fn grant_rejects_empty_email() -> anyhow::Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let directory = PgAdminDirectory::new(pool);
        assert!(matches!(
            directory.grant("").await,
            Err(StoreError::Invalid(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn insert_rejects_malformed_code() -> anyhow::Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let repo = PgCodeRepository::new(pool);
        let code = OneTimeCode::new(
            PrincipalId::new("uid-1"),
            "abc".to_string(),
            Utc::now(),
            chrono::Duration::minutes(5),
        )
        .ok_or_else(|| anyhow::anyhow!("expiry out of range"))?;
        assert!(matches!(
            repo.insert(&code).await,
            Err(StoreError::Invalid(_))
        ));
        Ok(())
    }
}
