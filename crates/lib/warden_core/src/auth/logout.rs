//! Logout: invalidate a token for good.

use tracing::info;

use super::jwt::DecodedToken;
use super::{AuthError, LogoutStage};
use crate::models::Account;
use crate::store::{TokenBlacklist, TokenWhitelist};

/// Blacklists a token and removes its whitelist entry.
#[derive(Debug, Clone)]
pub struct LogoutService {
    blacklist: TokenBlacklist,
    whitelist: TokenWhitelist,
}

impl LogoutService {
    pub fn new(blacklist: TokenBlacklist, whitelist: TokenWhitelist) -> Self {
        Self {
            blacklist,
            whitelist,
        }
    }

    /// Invalidate `token` for `account`. Safe to repeat.
    ///
    /// The blacklist write happens first. If the whitelist delete then fails
    /// the call still errors: a leftover entry would keep the token usable
    /// wherever the blacklist is not consulted.
    pub async fn logout(&self, account: &Account, token: &DecodedToken) -> Result<(), AuthError> {
        self.blacklist
            .revoke(&token.jti, token.expires_at())
            .await
            .map_err(|source| AuthError::LogoutFailed {
                stage: LogoutStage::Blacklist,
                source,
            })?;

        self.whitelist
            .revoke(account, &token.jti)
            .await
            .map_err(|source| AuthError::LogoutFailed {
                stage: LogoutStage::Whitelist,
                source,
            })?;

        info!(
            resource_type = %account.resource_type,
            account_id = %account.id,
            jti = %token.jti,
            "token logged out"
        );
        Ok(())
    }
}
