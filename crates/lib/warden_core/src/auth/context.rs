//! Per-request authentication context.

use std::collections::HashMap;
use std::sync::Arc;

use super::jwt::DecodedToken;
use crate::models::Account;

/// Pull the credential out of an `Authorization` header value.
///
/// `Bearer <token>` yields `<token>`. A value without the `Bearer ` scheme is
/// returned whole so it fails verification as an invalid token rather than
/// being reported as missing. Absent or blank values yield `None`.
pub fn extract_bearer(header: Option<&str>) -> Option<&str> {
    let value = header?.trim();
    let token = match value.strip_prefix("Bearer") {
        Some(rest) if rest.is_empty() || rest.starts_with(char::is_whitespace) => rest.trim(),
        _ => value,
    };
    (!token.is_empty()).then_some(token)
}

/// State of one authentication attempt. Owned by a single request and never
/// shared or persisted.
#[derive(Debug, Clone)]
pub struct AuthContext {
    raw_token: Option<String>,
    verify_expiry: bool,
    decoded: Option<DecodedToken>,
    bound: HashMap<String, Arc<Account>>,
}

impl AuthContext {
    /// Build a context from the request's `Authorization` header.
    pub fn from_authorization_header(header: Option<&str>) -> Self {
        Self {
            raw_token: extract_bearer(header).map(str::to_string),
            verify_expiry: true,
            decoded: None,
            bound: HashMap::new(),
        }
    }

    /// Context with an already extracted bearer token.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self::from_authorization_header(Some(&token.into()))
    }

    /// Accept expired tokens. Only for the token refresh route.
    #[must_use]
    pub fn allow_expired(mut self) -> Self {
        self.verify_expiry = false;
        self
    }

    pub fn raw_token(&self) -> Option<&str> {
        self.raw_token.as_deref()
    }

    pub fn verify_expiry(&self) -> bool {
        self.verify_expiry
    }

    /// Claims of the presented token, once decoding has succeeded.
    pub fn decoded(&self) -> Option<&DecodedToken> {
        self.decoded.as_ref()
    }

    /// The authenticated account of `resource_type`, if any.
    ///
    /// Repeated calls return the same `Arc`.
    pub fn current_resource(&self, resource_type: &str) -> Option<&Arc<Account>> {
        self.bound.get(resource_type)
    }

    pub(crate) fn set_decoded(&mut self, decoded: DecodedToken) {
        self.decoded = Some(decoded);
    }

    /// Bind `account` unless something is already bound for this type, in
    /// which case the existing binding wins.
    pub(crate) fn bind(&mut self, resource_type: &str, account: Account) -> Arc<Account> {
        Arc::clone(
            self.bound
                .entry(resource_type.to_string())
                .or_insert_with(|| Arc::new(account)),
        )
    }

    pub(crate) fn unbind(&mut self, resource_type: &str) {
        self.bound.remove(resource_type);
    }
}
