//! In-memory stores backed by `DashMap`.
//!
//! Suitable for tests and single-process deployments; contents are lost on
//! restart.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::{RevocationStore, StoreError, WhitelistStore};
use crate::auth::resolver::AccountLookup;
use crate::models::{Account, RevocationRecord, WhitelistEntry};

/// `(resource_type, account_id, jti)`
type WhitelistKey = (String, String, String);

fn whitelist_key(account: &Account, jti: &str) -> WhitelistKey {
    (
        account.resource_type.clone(),
        account.id.clone(),
        jti.to_string(),
    )
}

/// Whitelist collection shared by all accounts of a resource type.
#[derive(Debug, Default)]
pub struct MemoryWhitelistStore {
    entries: DashMap<WhitelistKey, WhitelistEntry>,
}

impl MemoryWhitelistStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries (all accounts).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl WhitelistStore for MemoryWhitelistStore {
    async fn create(&self, account: &Account, entry: &WhitelistEntry) -> Result<(), StoreError> {
        match self.entries.entry(whitelist_key(account, &entry.jti)) {
            Entry::Occupied(_) => Err(StoreError::Duplicate),
            Entry::Vacant(slot) => {
                slot.insert(entry.clone());
                Ok(())
            }
        }
    }

    async fn find(
        &self,
        account: &Account,
        jti: &str,
    ) -> Result<Option<WhitelistEntry>, StoreError> {
        Ok(self
            .entries
            .get(&whitelist_key(account, jti))
            .map(|e| e.value().clone()))
    }

    async fn delete(&self, account: &Account, jti: &str) -> Result<bool, StoreError> {
        Ok(self.entries.remove(&whitelist_key(account, jti)).is_some())
    }

    async fn exists(&self, account: &Account, jti: &str) -> Result<bool, StoreError> {
        Ok(self.entries.contains_key(&whitelist_key(account, jti)))
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut removed = 0;
        self.entries.retain(|_, e| {
            let keep = e.expires_at > now;
            removed += u64::from(!keep);
            keep
        });
        Ok(removed)
    }
}

/// Process-wide revocation list.
#[derive(Debug, Default)]
pub struct MemoryRevocationStore {
    records: DashMap<String, RevocationRecord>,
}

impl MemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl RevocationStore for MemoryRevocationStore {
    async fn revoke(
        &self,
        jti: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        self.records
            .entry(jti.to_string())
            .or_insert_with(|| RevocationRecord {
                jti: jti.to_string(),
                expires_at,
                revoked_at: Utc::now(),
            });
        Ok(())
    }

    async fn is_revoked(&self, jti: &str) -> Result<bool, StoreError> {
        Ok(self.records.contains_key(jti))
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        // Counted in the closure: inserts racing the sweep can grow the map.
        let mut removed = 0;
        self.records.retain(|_, r| {
            let keep = r.expires_at.is_none_or(|exp| exp > now);
            removed += u64::from(!keep);
            keep
        });
        Ok(removed)
    }
}

/// Account table for one resource type, keyed by id.
#[derive(Debug, Default)]
pub struct MemoryAccounts {
    accounts: DashMap<String, Account>,
}

impl MemoryAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an account.
    pub fn insert(&self, account: Account) {
        self.accounts.insert(account.id.clone(), account);
    }

    /// Record a credential change, invalidating tokens issued before `at`.
    pub fn touch_token_issued_at(&self, id: &str, at: DateTime<Utc>) -> bool {
        match self.accounts.get_mut(id) {
            Some(mut account) => {
                account.token_issued_at = Some(at);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl AccountLookup for MemoryAccounts {
    async fn find_by_id(&self, id: &str) -> Result<Option<Account>, StoreError> {
        Ok(self.accounts.get(id).map(|a| a.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[tokio::test]
    async fn whitelist_create_rejects_duplicate() {
        let store = MemoryWhitelistStore::new();
        let acct = Account::new("user", "7");
        let entry = WhitelistEntry {
            jti: "abc".into(),
            account_id: "7".into(),
            expires_at: Utc::now() + Duration::minutes(5),
        };
        store.create(&acct, &entry).await.unwrap();
        let err = store.create(&acct, &entry).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn whitelist_is_scoped_per_resource_type() {
        let store = MemoryWhitelistStore::new();
        let user = Account::new("user", "7");
        let admin = Account::new("admin", "7");
        let entry = WhitelistEntry {
            jti: "abc".into(),
            account_id: "7".into(),
            expires_at: Utc::now() + Duration::minutes(5),
        };
        store.create(&user, &entry).await.unwrap();
        assert!(store.exists(&user, "abc").await.unwrap());
        assert!(!store.exists(&admin, "abc").await.unwrap());
    }

    #[tokio::test]
    async fn whitelist_purge_removes_expired_only() {
        let store = MemoryWhitelistStore::new();
        let acct = Account::new("user", "7");
        let now = Utc::now();
        for (jti, offset) in [("old", -10), ("new", 10)] {
            let entry = WhitelistEntry {
                jti: jti.into(),
                account_id: "7".into(),
                expires_at: now + Duration::minutes(offset),
            };
            store.create(&acct, &entry).await.unwrap();
        }
        assert_eq!(store.purge_expired(now).await.unwrap(), 1);
        assert!(store.exists(&acct, "new").await.unwrap());
        assert!(!store.exists(&acct, "old").await.unwrap());
    }

    #[tokio::test]
    async fn revocation_purge_keeps_records_without_expiry() {
        let store = MemoryRevocationStore::new();
        let now = Utc::now();
        store.revoke("expired", Some(now - Duration::minutes(1))).await.unwrap();
        store.revoke("forever", None).await.unwrap();
        assert_eq!(store.purge_expired(now).await.unwrap(), 1);
        assert!(store.is_revoked("forever").await.unwrap());
        assert!(!store.is_revoked("expired").await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn purge_counts_stay_exact_under_concurrent_revokes() {
        const TOTAL: usize = 20_000;
        let store = std::sync::Arc::new(MemoryRevocationStore::new());
        let now = Utc::now();
        let expired = now - Duration::minutes(1);

        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                for i in 0..TOTAL {
                    store.revoke(&format!("jti-{i}"), Some(expired)).await.unwrap();
                }
            })
        };

        let mut purged = 0;
        while !writer.is_finished() {
            purged += store.purge_expired(now).await.unwrap();
            tokio::task::yield_now().await;
        }
        writer.await.unwrap();
        purged += store.purge_expired(now).await.unwrap();

        assert_eq!(purged, TOTAL as u64);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn accounts_lookup_and_touch() {
        let accounts = MemoryAccounts::new();
        accounts.insert(Account::new("user", "7"));
        assert!(accounts.find_by_id("8").await.unwrap().is_none());

        let at = Utc::now();
        assert!(accounts.touch_token_issued_at("7", at));
        let found = accounts.find_by_id("7").await.unwrap().unwrap();
        assert_eq!(found.token_issued_at, Some(at));
    }
}
