//! Database repositories for login credentials, accounts, sessions and the
//! error log.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use lark_login_core::{Result, SessionId};
use lark_login_platform_access::{
    CredentialStore, ErrorLog, ErrorRecord, LocalAccount, Session, SessionEstablisher,
    SocialLoginKey, StoreError, UserDirectory,
};
use sqlx::{FromRow, PgPool};
use tracing::instrument;

fn database_error(e: sqlx::Error) -> StoreError {
    StoreError::Database {
        details: e.to_string(),
    }
}

/// Row type for social login key queries.
#[derive(FromRow)]
struct SocialLoginKeyRow {
    provider_name: String,
    client_id: Option<String>,
    client_secret: Option<String>,
}

/// Row type for account queries.
#[derive(FromRow)]
struct UserRow {
    name: String,
    email: String,
    enabled: bool,
    last_login: Option<DateTime<Utc>>,
}

impl From<UserRow> for LocalAccount {
    fn from(row: UserRow) -> Self {
        LocalAccount::with_all_fields(row.name, row.email, row.enabled, row.last_login)
    }
}

/// Repository for social login keys.
#[derive(Clone)]
pub struct SocialLoginKeyRepository {
    pool: PgPool,
}

impl SocialLoginKeyRepository {
    /// Creates a new social login key repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for SocialLoginKeyRepository {
    #[instrument(skip(self))]
    async fn find_social_login_key(
        &self,
        provider_name: &str,
    ) -> Result<Option<SocialLoginKey>, StoreError> {
        let row: Option<SocialLoginKeyRow> = sqlx::query_as(
            r#"
            SELECT provider_name, client_id, client_secret
            FROM social_login_keys
            WHERE provider_name = $1
            "#,
        )
        .bind(provider_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(database_error)?;

        Ok(row.map(|r| SocialLoginKey {
            provider_name: r.provider_name,
            client_id: r.client_id,
            client_secret: r.client_secret,
        }))
    }
}

/// Repository for local accounts.
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Creates a new user repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for UserRepository {
    #[instrument(skip(self))]
    async fn find_enabled_by_email(
        &self,
        email: &str,
    ) -> Result<Option<LocalAccount>, StoreError> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT name, email, enabled, last_login
            FROM users
            WHERE lower(email) = lower($1) AND enabled
            ORDER BY name
            LIMIT 1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(database_error)?;

        Ok(row.map(LocalAccount::from))
    }
}

/// Repository for session operations.
#[derive(Clone)]
pub struct SessionRepository {
    pool: PgPool,
    duration: Duration,
}

impl SessionRepository {
    /// Creates a new session repository whose sessions last `duration`.
    pub fn new(pool: PgPool, duration: Duration) -> Self {
        Self { pool, duration }
    }

    /// Deletes expired sessions.
    pub async fn delete_expired(&self) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM sessions
            WHERE expires_at < NOW()
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl SessionEstablisher for SessionRepository {
    /// Inserts the session and records the login time in one transaction.
    #[instrument(skip(self, account), fields(account = account.name()))]
    async fn login(&self, account: &LocalAccount) -> Result<Session, StoreError> {
        let session = Session::new(account.name(), self.duration);

        let mut tx = self.pool.begin().await.map_err(database_error)?;

        sqlx::query(
            r#"
            INSERT INTO sessions (id, account, created_at, expires_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(session.id().to_string())
        .bind(session.account())
        .bind(session.created_at())
        .bind(session.expires_at())
        .execute(&mut *tx)
        .await
        .map_err(database_error)?;

        sqlx::query(
            r#"
            UPDATE users
            SET last_login = $2
            WHERE name = $1
            "#,
        )
        .bind(session.account())
        .bind(session.created_at())
        .execute(&mut *tx)
        .await
        .map_err(database_error)?;

        tx.commit().await.map_err(database_error)?;

        Ok(session)
    }

    #[instrument(skip(self))]
    async fn logout(&self, id: SessionId) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            DELETE FROM sessions
            WHERE id = $1
            "#,
        )
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        Ok(())
    }
}

/// Repository for the error log.
#[derive(Clone)]
pub struct ErrorLogRepository {
    pool: PgPool,
}

impl ErrorLogRepository {
    /// Creates a new error log repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ErrorLog for ErrorLogRepository {
    #[instrument(skip(self, record), fields(error_id = %record.id()))]
    async fn record(&self, record: &ErrorRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO error_logs (id, title, message, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(record.id().to_string())
        .bind(record.title())
        .bind(record.message())
        .bind(record.created_at())
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        Ok(())
    }
}
