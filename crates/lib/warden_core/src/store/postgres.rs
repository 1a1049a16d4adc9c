//! PostgreSQL-backed stores.
//!
//! Table names come from configuration and are checked with
//! [`crate::config::is_sql_identifier`] before any store is built.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{RevocationStore, StoreError, WhitelistStore};
use crate::auth::resolver::AccountLookup;
use crate::models::{Account, WhitelistEntry};
use crate::uuid::uuidv7;

/// Map a unique-constraint violation to `StoreError::Duplicate`.
fn map_insert_error(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Duplicate,
        _ => StoreError::DbError(e),
    }
}

/// Whitelist rows: `(id, resource_type, account_id, jti, expires_at, created_at)`.
#[derive(Debug, Clone)]
pub struct PgWhitelistStore {
    pool: PgPool,
    table: String,
}

impl PgWhitelistStore {
    pub fn new(pool: PgPool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }
}

#[async_trait]
impl WhitelistStore for PgWhitelistStore {
    async fn create(&self, account: &Account, entry: &WhitelistEntry) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO {} (id, resource_type, account_id, jti, expires_at) \
             VALUES ($1, $2, $3, $4, $5)",
            self.table
        );
        sqlx::query(&sql)
            .bind(uuidv7())
            .bind(&account.resource_type)
            .bind(&account.id)
            .bind(&entry.jti)
            .bind(entry.expires_at)
            .execute(&self.pool)
            .await
            .map_err(map_insert_error)?;
        Ok(())
    }

    async fn find(
        &self,
        account: &Account,
        jti: &str,
    ) -> Result<Option<WhitelistEntry>, StoreError> {
        let sql = format!(
            "SELECT jti, account_id, expires_at FROM {} \
             WHERE resource_type = $1 AND account_id = $2 AND jti = $3",
            self.table
        );
        let row = sqlx::query_as::<_, (String, String, DateTime<Utc>)>(&sql)
            .bind(&account.resource_type)
            .bind(&account.id)
            .bind(jti)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(jti, account_id, expires_at)| WhitelistEntry {
            jti,
            account_id,
            expires_at,
        }))
    }

    async fn delete(&self, account: &Account, jti: &str) -> Result<bool, StoreError> {
        let sql = format!(
            "DELETE FROM {} WHERE resource_type = $1 AND account_id = $2 AND jti = $3",
            self.table
        );
        let result = sqlx::query(&sql)
            .bind(&account.resource_type)
            .bind(&account.id)
            .bind(jti)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn exists(&self, account: &Account, jti: &str) -> Result<bool, StoreError> {
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} \
             WHERE resource_type = $1 AND account_id = $2 AND jti = $3)",
            self.table
        );
        let exists = sqlx::query_scalar::<_, bool>(&sql)
            .bind(&account.resource_type)
            .bind(&account.id)
            .bind(jti)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let sql = format!("DELETE FROM {} WHERE expires_at <= $1", self.table);
        let result = sqlx::query(&sql).bind(now).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

/// Blacklist rows: `(id, jti, expires_at, revoked_at)`.
#[derive(Debug, Clone)]
pub struct PgRevocationStore {
    pool: PgPool,
    table: String,
}

impl PgRevocationStore {
    pub fn new(pool: PgPool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }
}

#[async_trait]
impl RevocationStore for PgRevocationStore {
    async fn revoke(
        &self,
        jti: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO {} (id, jti, expires_at) VALUES ($1, $2, $3) \
             ON CONFLICT (jti) DO NOTHING",
            self.table
        );
        sqlx::query(&sql)
            .bind(uuidv7())
            .bind(jti)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn is_revoked(&self, jti: &str) -> Result<bool, StoreError> {
        let sql = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE jti = $1)", self.table);
        let exists = sqlx::query_scalar::<_, bool>(&sql)
            .bind(jti)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let sql = format!(
            "DELETE FROM {} WHERE expires_at IS NOT NULL AND expires_at <= $1",
            self.table
        );
        let result = sqlx::query(&sql).bind(now).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

/// Account lookup against an application table with `id` and
/// `token_issued_at` columns.
#[derive(Debug, Clone)]
pub struct PgAccountLookup {
    pool: PgPool,
    resource_type: String,
    table: String,
}

impl PgAccountLookup {
    pub fn new(pool: PgPool, resource_type: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            pool,
            resource_type: resource_type.into(),
            table: table.into(),
        }
    }
}

#[async_trait]
impl AccountLookup for PgAccountLookup {
    async fn find_by_id(&self, id: &str) -> Result<Option<Account>, StoreError> {
        let sql = format!(
            "SELECT id::text, token_issued_at FROM {} WHERE id::text = $1",
            self.table
        );
        let row = sqlx::query_as::<_, (String, Option<DateTime<Utc>>)>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(id, token_issued_at)| Account {
            resource_type: self.resource_type.clone(),
            id,
            token_issued_at,
        }))
    }
}
