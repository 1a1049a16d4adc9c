//! Authentication domain models.
//!
//! Accounts belong to the host application; the core only needs the fields
//! below. Token records are owned by the whitelist/blacklist stores.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An authenticable account of some configured resource type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Resource type name this account was resolved for (e.g. `"user"`).
    pub resource_type: String,
    /// Account id in string form (integer ids are stringified).
    pub id: String,
    /// Last credential change. Tokens issued before this instant are stale.
    pub token_issued_at: Option<DateTime<Utc>>,
}

impl Account {
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            token_issued_at: None,
        }
    }

    /// Set the credential-change timestamp.
    #[must_use]
    pub fn with_token_issued_at(mut self, at: DateTime<Utc>) -> Self {
        self.token_issued_at = Some(at);
        self
    }
}

/// Allow-list entry: the token `jti` is currently valid for `account_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhitelistEntry {
    pub jti: String,
    pub account_id: String,
    pub expires_at: DateTime<Utc>,
}

/// Blacklist record: the token `jti` must never authenticate again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationRecord {
    pub jti: String,
    /// When the token would have expired anyway; used for cleanup.
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked_at: DateTime<Utc>,
}
