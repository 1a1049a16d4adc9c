//! Token authentication: decoding, resource resolution, the authentication
//! pipeline, logout, and name-based call dispatch.

pub mod context;
pub mod dispatch;
pub mod jwt;
pub mod logout;
pub mod pipeline;
pub mod resolver;


use thiserror::Error;

use crate::store::StoreError;

/// Authentication errors.
///
/// `MissingToken`, `TokenExpired` and `TokenInvalid` are the only variants a
/// client should ever see; the reason a token is invalid is never exposed.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing access token")]
    MissingToken,

    #[error("Access token has expired")]
    TokenExpired,

    #[error("Invalid access token")]
    TokenInvalid,

    #[error("Token store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    #[error("Logout failed while {stage}: {source}")]
    LogoutFailed {
        stage: LogoutStage,
        #[source]
        source: StoreError,
    },

    #[error("Unknown resource type: {0}")]
    UnknownResourceType(String),

    #[error("Undefined method: {0}")]
    UndefinedMethod(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Whether this is a client-facing authentication failure (401 class)
    /// rather than a server fault.
    pub fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            AuthError::MissingToken | AuthError::TokenExpired | AuthError::TokenInvalid
        )
    }
}

/// Which half of a logout failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutStage {
    Blacklist,
    Whitelist,
}

impl std::fmt::Display for LogoutStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogoutStage::Blacklist => f.write_str("blacklisting token"),
            LogoutStage::Whitelist => f.write_str("revoking whitelisted token"),
        }
    }
}
