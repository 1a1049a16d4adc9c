//! Token stores: whitelist (per-account allow-list) and blacklist (revocation).
//!
//! The traits describe the persistence operations only. `TokenWhitelist` and
//! `TokenBlacklist` wrap an optional store and implement the policy: a missing
//! whitelist never rejects a token, a missing blacklist never revokes one.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;

use crate::models::{Account, WhitelistEntry};

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Uniqueness constraint hit on insert.
    #[error("Duplicate entry")]
    Duplicate,

    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),

    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Persistence operations on a resource type's whitelist collection.
#[async_trait]
pub trait WhitelistStore: Send + Sync {
    /// Insert an entry. Returns `StoreError::Duplicate` when the `jti` is
    /// already present for this account.
    async fn create(&self, account: &Account, entry: &WhitelistEntry) -> Result<(), StoreError>;

    /// Find the entry for `jti` in the account's collection.
    async fn find(&self, account: &Account, jti: &str)
    -> Result<Option<WhitelistEntry>, StoreError>;

    /// Delete the entry for `jti`. Returns whether a row was removed.
    async fn delete(&self, account: &Account, jti: &str) -> Result<bool, StoreError>;

    /// Whether an entry for `jti` exists in the account's collection.
    async fn exists(&self, account: &Account, jti: &str) -> Result<bool, StoreError>;

    /// Remove entries that expired before `now`. Returns the number removed.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}

/// Persistence operations on the revocation list.
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Record `jti` as revoked. Revoking an already revoked `jti` succeeds.
    async fn revoke(&self, jti: &str, expires_at: Option<DateTime<Utc>>)
    -> Result<(), StoreError>;

    async fn is_revoked(&self, jti: &str) -> Result<bool, StoreError>;

    /// Remove records whose token expired before `now`.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}

/// Opt-in whitelist policy for one resource type.
#[derive(Clone, Default)]
pub struct TokenWhitelist {
    store: Option<Arc<dyn WhitelistStore>>,
}

impl TokenWhitelist {
    pub fn new(store: Arc<dyn WhitelistStore>) -> Self {
        Self { store: Some(store) }
    }

    /// Whitelisting turned off for this resource type.
    pub fn disabled() -> Self {
        Self { store: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    /// Always `true` when disabled.
    pub async fn is_whitelisted(&self, account: &Account, jti: &str) -> Result<bool, StoreError> {
        match &self.store {
            Some(store) => store.exists(account, jti).await,
            None => Ok(true),
        }
    }

    /// Upsert an entry. A concurrent or repeated insert of the same `jti`
    /// counts as already whitelisted.
    pub async fn add(
        &self,
        account: &Account,
        jti: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let entry = WhitelistEntry {
            jti: jti.to_string(),
            account_id: account.id.clone(),
            expires_at,
        };
        match store.create(account, &entry).await {
            Ok(()) | Err(StoreError::Duplicate) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Delete the entry for `jti` if present.
    pub async fn revoke(&self, account: &Account, jti: &str) -> Result<(), StoreError> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        if store.find(account, jti).await?.is_some() {
            let removed = store.delete(account, jti).await?;
            debug!(account_id = %account.id, jti, removed, "whitelist entry revoked");
        }
        Ok(())
    }

    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        match &self.store {
            Some(store) => store.purge_expired(now).await,
            None => Ok(0),
        }
    }
}

impl std::fmt::Debug for TokenWhitelist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenWhitelist")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

/// Blacklist policy. Without a store nothing is ever revoked.
#[derive(Clone, Default)]
pub struct TokenBlacklist {
    store: Option<Arc<dyn RevocationStore>>,
}

impl TokenBlacklist {
    pub fn new(store: Arc<dyn RevocationStore>) -> Self {
        Self { store: Some(store) }
    }

    pub fn disabled() -> Self {
        Self { store: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    pub async fn is_revoked(&self, jti: &str) -> Result<bool, StoreError> {
        match &self.store {
            Some(store) => store.is_revoked(jti).await,
            None => Ok(false),
        }
    }

    pub async fn revoke(&self, jti: &str, expires_at: Option<DateTime<Utc>>) -> Result<(), StoreError> {
        match &self.store {
            Some(store) => store.revoke(jti, expires_at).await,
            None => Ok(()),
        }
    }

    /// Drop records whose token would have expired anyway.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        match &self.store {
            Some(store) => store.purge_expired(now).await,
            None => Ok(0),
        }
    }
}

impl std::fmt::Debug for TokenBlacklist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBlacklist")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::memory::{MemoryRevocationStore, MemoryWhitelistStore};
    use super::*;

    fn account(id: &str) -> Account {
        Account::new("user", id)
    }

    fn later() -> DateTime<Utc> {
        Utc::now() + chrono::Duration::minutes(15)
    }

    #[tokio::test]
    async fn disabled_whitelist_accepts_everything() {
        let wl = TokenWhitelist::disabled();
        assert!(!wl.is_enabled());
        assert!(wl.is_whitelisted(&account("1"), "any").await.unwrap());
        wl.add(&account("1"), "any", later()).await.unwrap();
        wl.revoke(&account("1"), "any").await.unwrap();
    }

    #[tokio::test]
    async fn enabled_whitelist_requires_entry() {
        let wl = TokenWhitelist::new(Arc::new(MemoryWhitelistStore::new()));
        let acct = account("1");
        assert!(!wl.is_whitelisted(&acct, "abc").await.unwrap());

        wl.add(&acct, "abc", later()).await.unwrap();
        assert!(wl.is_whitelisted(&acct, "abc").await.unwrap());
        // Entries are scoped to the account.
        assert!(!wl.is_whitelisted(&account("2"), "abc").await.unwrap());
    }

    #[tokio::test]
    async fn whitelist_add_swallows_duplicates() {
        let wl = TokenWhitelist::new(Arc::new(MemoryWhitelistStore::new()));
        let acct = account("1");
        wl.add(&acct, "abc", later()).await.unwrap();
        wl.add(&acct, "abc", later()).await.unwrap();
        assert!(wl.is_whitelisted(&acct, "abc").await.unwrap());
    }

    #[tokio::test]
    async fn whitelist_revoke_is_idempotent() {
        let wl = TokenWhitelist::new(Arc::new(MemoryWhitelistStore::new()));
        let acct = account("1");
        wl.add(&acct, "abc", later()).await.unwrap();
        wl.revoke(&acct, "abc").await.unwrap();
        wl.revoke(&acct, "abc").await.unwrap();
        assert!(!wl.is_whitelisted(&acct, "abc").await.unwrap());
    }

    #[tokio::test]
    async fn missing_blacklist_never_revokes() {
        let bl = TokenBlacklist::disabled();
        bl.revoke("abc", None).await.unwrap();
        assert!(!bl.is_revoked("abc").await.unwrap());
    }

    #[tokio::test]
    async fn blacklist_revoke_is_idempotent() {
        let bl = TokenBlacklist::new(Arc::new(MemoryRevocationStore::new()));
        bl.revoke("abc", Some(later())).await.unwrap();
        bl.revoke("abc", Some(later())).await.unwrap();
        assert!(bl.is_revoked("abc").await.unwrap());
        assert!(!bl.is_revoked("other").await.unwrap());
    }
}
