//! The authentication pipeline.
//!
//! extract → decode → resolve → bind → validate (issued-at, blacklist,
//! whitelist) → whitelist the token. The order decides which error surfaces
//! and avoids store round-trips for tokens that already failed.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use tracing::debug;

use super::AuthError;
use super::context::AuthContext;
use super::jwt::{DecodeError, DecodedToken, TokenCodec};
use super::logout::LogoutService;
use super::resolver::{ResourceRegistry, ResourceType};
use crate::models::Account;
use crate::store::{StoreError, TokenBlacklist};

/// Deployment-wide switches.
#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    /// Reject tokens issued before the account's last credential change.
    pub verify_issued_at: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            verify_issued_at: true,
        }
    }
}

/// Why a token was turned away. Logged, never returned to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    NoToken,
    Expired,
    Invalid,
    ResourceMissing,
    IssuedAtStale,
    Revoked,
    NotWhitelisted,
}

impl From<Rejection> for AuthError {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::NoToken => AuthError::MissingToken,
            Rejection::Expired => AuthError::TokenExpired,
            Rejection::Invalid
            | Rejection::ResourceMissing
            | Rejection::IssuedAtStale
            | Rejection::Revoked
            | Rejection::NotWhitelisted => AuthError::TokenInvalid,
        }
    }
}

/// Outcome of a run: store failures in the outer `Result`, auth decisions in
/// the inner one.
type Verdict<T> = Result<Result<T, Rejection>, AuthError>;

/// Authenticates bearer tokens against the configured resource types.
#[derive(Debug, Clone)]
pub struct AuthPipeline {
    codec: TokenCodec,
    registry: Arc<ResourceRegistry>,
    blacklist: TokenBlacklist,
    options: PipelineOptions,
}

impl AuthPipeline {
    pub fn new(
        codec: TokenCodec,
        registry: ResourceRegistry,
        blacklist: TokenBlacklist,
        options: PipelineOptions,
    ) -> Self {
        Self {
            codec,
            registry: Arc::new(registry),
            blacklist,
            options,
        }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub fn blacklist(&self) -> &TokenBlacklist {
        &self.blacklist
    }

    /// Authenticate the context's token as `resource_type` and bind the
    /// account as its current resource.
    ///
    /// Fails with `MissingToken`, `TokenExpired` or `TokenInvalid` for client
    /// problems; store failures propagate as `StoreUnavailable`.
    pub async fn authenticate_and_set(
        &self,
        ctx: &mut AuthContext,
        resource_type: &str,
    ) -> Result<Arc<Account>, AuthError> {
        match self.run(ctx, resource_type).await? {
            Ok(account) => Ok(account),
            Err(rejection) => {
                debug!(resource_type, reason = ?rejection, "authentication rejected");
                Err(rejection.into())
            }
        }
    }

    /// Silent variant of [`authenticate_and_set`](Self::authenticate_and_set):
    /// `false` instead of an authentication error.
    pub async fn check_only(
        &self,
        ctx: &mut AuthContext,
        resource_type: &str,
    ) -> Result<bool, AuthError> {
        Ok(self.run(ctx, resource_type).await?.is_ok())
    }

    /// Check an `Authorization` header value in a throwaway context.
    pub async fn is_token_valid(
        &self,
        authorization: Option<&str>,
        resource_type: &str,
    ) -> Result<bool, AuthError> {
        let mut ctx = AuthContext::from_authorization_header(authorization);
        self.check_only(&mut ctx, resource_type).await
    }

    /// Mint a token for `account` and whitelist it when its resource type
    /// uses a whitelist.
    pub async fn issue_token(
        &self,
        account: &Account,
        ttl: chrono::Duration,
    ) -> Result<(String, DecodedToken), AuthError> {
        let entry = self.registry.get(&account.resource_type)?;
        let (token, claims) = self.codec.issue(&account.resource_type, &account.id, ttl)?;
        let expires_at = claims
            .expires_at()
            .ok_or_else(|| AuthError::Config(format!("exp {} is out of range", claims.exp)))?;
        entry.whitelist.add(account, &claims.jti, expires_at).await?;
        Ok((token, claims))
    }

    /// Log out the current resource of `resource_type`: blacklist the
    /// context's token and drop its whitelist entry.
    ///
    /// The binding stays for the rest of the request so the caller can still
    /// address the account, and a second logout is a no-op.
    pub async fn logout(&self, ctx: &AuthContext, resource_type: &str) -> Result<(), AuthError> {
        let entry = self.registry.get(resource_type)?;
        let (Some(account), Some(token)) = (
            ctx.current_resource(resource_type).cloned(),
            ctx.decoded().cloned(),
        ) else {
            return Err(AuthError::TokenInvalid);
        };

        LogoutService::new(self.blacklist.clone(), entry.whitelist.clone())
            .logout(&account, &token)
            .await?;
        Ok(())
    }

    /// Sweep expired rows from the blacklist and every whitelist. Returns
    /// the number of rows removed.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
        let mut removed = self.blacklist.purge_expired(now).await?;
        for name in self.registry.names() {
            removed += self.registry.get(name)?.whitelist.purge_expired(now).await?;
        }
        Ok(removed)
    }

    async fn run(&self, ctx: &mut AuthContext, resource_type: &str) -> Verdict<Arc<Account>> {
        let entry = self.registry.get(resource_type)?;

        let Some(raw) = ctx.raw_token() else {
            return Ok(Err(Rejection::NoToken));
        };
        let decoded = match self.codec.decode(raw, ctx.verify_expiry()) {
            Ok(decoded) => decoded,
            Err(DecodeError::SignatureExpired) => return Ok(Err(Rejection::Expired)),
            Err(DecodeError::SignatureInvalid(reason)) => {
                debug!(%reason, "token failed verification");
                return Ok(Err(Rejection::Invalid));
            }
        };
        ctx.set_decoded(decoded.clone());

        let bound = ctx.current_resource(resource_type).cloned();
        let account = match bound {
            Some(bound) => bound,
            None => {
                let Some(id) = decoded.resource_id(resource_type) else {
                    return Ok(Err(Rejection::ResourceMissing));
                };
                match entry.lookup.find_by_id(&id).await? {
                    Some(account) => ctx.bind(resource_type, account),
                    None => return Ok(Err(Rejection::ResourceMissing)),
                }
            }
        };

        match self.accept(entry, &account, &decoded).await {
            Ok(Ok(())) => Ok(Ok(account)),
            Ok(Err(rejection)) => {
                ctx.unbind(resource_type);
                Ok(Err(rejection))
            }
            Err(e) => {
                ctx.unbind(resource_type);
                Err(e.into())
            }
        }
    }

    /// Validate the bound account against the token, then whitelist the
    /// token. Checks short-circuit left to right.
    async fn accept(
        &self,
        entry: &ResourceType,
        account: &Account,
        token: &DecodedToken,
    ) -> Result<Result<(), Rejection>, StoreError> {
        if self.options.verify_issued_at && !issued_after_credential_change(account, token) {
            return Ok(Err(Rejection::IssuedAtStale));
        }
        if self.blacklist.is_revoked(&token.jti).await? {
            return Ok(Err(Rejection::Revoked));
        }
        if !entry.whitelist.is_whitelisted(account, &token.jti).await? {
            return Ok(Err(Rejection::NotWhitelisted));
        }
        let Some(expires_at) = token.expires_at() else {
            return Ok(Err(Rejection::Invalid));
        };
        entry.whitelist.add(account, &token.jti, expires_at).await?;
        Ok(Ok(()))
    }
}

/// Accounts without a recorded credential change always pass.
fn issued_after_credential_change(account: &Account, token: &DecodedToken) -> bool {
    account
        .token_issued_at
        .is_none_or(|changed_at| token.iat >= changed_at.timestamp())
}
