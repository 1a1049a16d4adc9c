//! Resource-type registry.
//!
//! Maps a configured resource-type name (`"user"`, `"admin"`, ...) to the
//! account lookup and whitelist policy for that type. Adding a type is a
//! registry entry, not pipeline code.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::AuthError;
use crate::models::Account;
use crate::store::{StoreError, TokenWhitelist};

/// Finds accounts of one resource type by id.
#[async_trait]
pub trait AccountLookup: Send + Sync {
    /// `Ok(None)` when no account has this id.
    async fn find_by_id(&self, id: &str) -> Result<Option<Account>, StoreError>;
}

/// Everything the pipeline needs to authenticate one resource type.
#[derive(Clone)]
pub struct ResourceType {
    pub name: String,
    pub lookup: Arc<dyn AccountLookup>,
    pub whitelist: TokenWhitelist,
}

impl ResourceType {
    pub fn new(name: impl Into<String>, lookup: Arc<dyn AccountLookup>) -> Self {
        Self {
            name: name.into(),
            lookup,
            whitelist: TokenWhitelist::disabled(),
        }
    }

    /// Enable whitelisting for this type.
    #[must_use]
    pub fn with_whitelist(mut self, whitelist: TokenWhitelist) -> Self {
        self.whitelist = whitelist;
        self
    }
}

impl std::fmt::Debug for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceType")
            .field("name", &self.name)
            .field("whitelist", &self.whitelist)
            .finish_non_exhaustive()
    }
}

/// Lookup table of configured resource types.
#[derive(Debug, Clone, Default)]
pub struct ResourceRegistry {
    types: HashMap<String, ResourceType>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource type, replacing any previous entry of that name.
    pub fn register(&mut self, resource_type: ResourceType) {
        self.types.insert(resource_type.name.clone(), resource_type);
    }

    #[must_use]
    pub fn with(mut self, resource_type: ResourceType) -> Self {
        self.register(resource_type);
        self
    }

    pub fn get(&self, name: &str) -> Result<&ResourceType, AuthError> {
        self.types
            .get(name)
            .ok_or_else(|| AuthError::UnknownResourceType(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Configured type names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.types.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Find the account of type `name` with `id`.
    ///
    /// A missing account is `Ok(None)`; an unconfigured type is an error.
    pub async fn resolve(&self, name: &str, id: &str) -> Result<Option<Account>, AuthError> {
        let resource_type = self.get(name)?;
        Ok(resource_type.lookup.find_by_id(id).await?)
    }
}
