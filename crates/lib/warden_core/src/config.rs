//! Warden configuration: one entry per authenticable resource type.
//!
//! ```yaml
//! verify_issued_at: true
//! blacklist_table: blacklisted_tokens
//! token_ttl_secs: 900
//! resources:
//!   - name: user
//!     table: users
//!     whitelist_table: whitelisted_tokens
//!   - name: admin
//!     table: admins
//! ```

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;

use crate::auth::jwt::{TokenCodec, resolve_jwt_secret};
use crate::auth::pipeline::{AuthPipeline, PipelineOptions};
use crate::auth::resolver::{ResourceRegistry, ResourceType};
use crate::store::postgres::{PgAccountLookup, PgRevocationStore, PgWhitelistStore};
use crate::store::{TokenBlacklist, TokenWhitelist};

/// Default access token lifetime: 15 minutes.
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 15 * 60;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// One authenticable resource type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTypeConfig {
    /// Type name; tokens carry `<name>_id`.
    pub name: String,
    /// Account table with `id` and `token_issued_at` columns.
    pub table: String,
    /// Whitelist table. Absent means whitelisting is off for this type.
    #[serde(default)]
    pub whitelist_table: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WardenConfig {
    /// Signing secret; resolved from the environment or data dir when absent.
    #[serde(default)]
    pub jwt_secret: Option<String>,
    #[serde(default = "default_verify_issued_at")]
    pub verify_issued_at: bool,
    /// Revocation table. Absent means no blacklisting.
    #[serde(default)]
    pub blacklist_table: Option<String>,
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: i64,
    pub resources: Vec<ResourceTypeConfig>,
}

fn default_verify_issued_at() -> bool {
    true
}

fn default_token_ttl_secs() -> i64 {
    DEFAULT_TOKEN_TTL_SECS
}

impl WardenConfig {
    /// Parse and validate YAML.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        Self::from_yaml_str(&std::fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.resources.is_empty() {
            return Err(invalid("at least one resource type is required"));
        }
        if self.token_ttl_secs <= 0 {
            return Err(invalid("token_ttl_secs must be positive"));
        }
        if let Some(table) = &self.blacklist_table {
            check_identifier("blacklist_table", table)?;
        }

        let mut seen = HashSet::new();
        for resource in &self.resources {
            if resource.name.is_empty()
                || !resource
                    .name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
            {
                return Err(invalid(format!(
                    "resource name '{}' must be non-empty [A-Za-z0-9_]",
                    resource.name
                )));
            }
            if !seen.insert(resource.name.as_str()) {
                return Err(invalid(format!("duplicate resource type '{}'", resource.name)));
            }
            check_identifier("table", &resource.table)?;
            if let Some(table) = &resource.whitelist_table {
                check_identifier("whitelist_table", table)?;
            }
        }
        Ok(())
    }

    /// Configured secret, else [`resolve_jwt_secret`].
    pub fn secret(&self) -> String {
        match &self.jwt_secret {
            Some(secret) if !secret.is_empty() => secret.clone(),
            _ => resolve_jwt_secret(),
        }
    }

    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.token_ttl_secs)
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            verify_issued_at: self.verify_issued_at,
        }
    }

    /// Build a pipeline whose lookups and stores live in PostgreSQL.
    pub fn build_pg_pipeline(&self, pool: &PgPool) -> Result<AuthPipeline, ConfigError> {
        self.validate()?;

        let mut registry = ResourceRegistry::new();
        for resource in &self.resources {
            let lookup = Arc::new(PgAccountLookup::new(
                pool.clone(),
                &resource.name,
                &resource.table,
            ));
            let whitelist = match &resource.whitelist_table {
                Some(table) => TokenWhitelist::new(Arc::new(PgWhitelistStore::new(pool.clone(), table))),
                None => TokenWhitelist::disabled(),
            };
            registry.register(ResourceType::new(&resource.name, lookup).with_whitelist(whitelist));
        }

        let blacklist = match &self.blacklist_table {
            Some(table) => TokenBlacklist::new(Arc::new(PgRevocationStore::new(pool.clone(), table))),
            None => TokenBlacklist::disabled(),
        };

        Ok(AuthPipeline::new(
            TokenCodec::new(self.secret().as_bytes()),
            registry,
            blacklist,
            self.pipeline_options(),
        ))
    }
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(msg.into())
}

fn check_identifier(field: &str, value: &str) -> Result<(), ConfigError> {
    if is_sql_identifier(value) {
        Ok(())
    } else {
        Err(invalid(format!("{field} '{value}' is not a valid SQL identifier")))
    }
}

/// `name` or `schema.name`, each part `[A-Za-z_][A-Za-z0-9_]*` and at most
/// 63 bytes (PostgreSQL's identifier limit).
pub fn is_sql_identifier(value: &str) -> bool {
    let parts: Vec<&str> = value.split('.').collect();
    parts.len() <= 2
        && parts.iter().all(|part| {
            let mut chars = part.chars();
            part.len() <= 63
                && chars
                    .next()
                    .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}
