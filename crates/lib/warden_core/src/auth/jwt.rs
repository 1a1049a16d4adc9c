//! JWT encoding and verification.

use std::collections::HashSet;
use std::path::PathBuf;

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::info;

use super::AuthError;
use crate::uuid::new_jti;

/// Verification failures. Every failure other than expiry is `SignatureInvalid`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Signature has expired")]
    SignatureExpired,

    #[error("Signature is invalid: {0}")]
    SignatureInvalid(String),
}

/// Verified token claims.
///
/// `jti`, `iat` and `exp` are required; everything else (notably the
/// `<resource_type>_id` claims) lands in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedToken {
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DecodedToken {
    /// Name of the claim that carries the account id for a resource type.
    pub fn resource_claim(resource_type: &str) -> String {
        format!("{resource_type}_id")
    }

    /// Account id for `resource_type`, stringified. Strings and integers are
    /// accepted; empty strings and other JSON types count as absent.
    pub fn resource_id(&self, resource_type: &str) -> Option<String> {
        match self.extra.get(&Self::resource_claim(resource_type))? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// `exp` as a UTC timestamp.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0).single()
    }
}

/// HS256 signer/verifier bound to one secret.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenCodec {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    /// Verify signature (and expiry when `verify_expiry`) and parse claims.
    pub fn decode(&self, token: &str, verify_expiry: bool) -> Result<DecodedToken, DecodeError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = verify_expiry;
        validation.leeway = 0;
        // Registered claims beyond exp are carried, not enforced.
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::from(["exp".to_string()]);

        decode::<DecodedToken>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => DecodeError::SignatureExpired,
                _ => DecodeError::SignatureInvalid(e.to_string()),
            })
    }

    /// Sign the given claims.
    pub fn encode(&self, claims: &DecodedToken) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| AuthError::Internal(format!("jwt encode: {e}")))
    }

    /// Mint a token for `resource_type` / `id` valid for `ttl`.
    pub fn issue(
        &self,
        resource_type: &str,
        id: &str,
        ttl: Duration,
    ) -> Result<(String, DecodedToken), AuthError> {
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| AuthError::Config(format!("token lifetime {ttl} is out of range")))?;
        let mut extra = Map::new();
        extra.insert(
            DecodedToken::resource_claim(resource_type),
            Value::String(id.to_string()),
        );
        let claims = DecodedToken {
            jti: new_jti(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            extra,
        };
        let token = self.encode(&claims)?;
        Ok((token, claims))
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec").field("algorithm", &"HS256").finish()
    }
}

/// Resolve the JWT secret: env var `WARDEN_JWT_SECRET` → `JWT_SECRET` → persisted file.
pub fn resolve_jwt_secret() -> String {
    for var in ["WARDEN_JWT_SECRET", "JWT_SECRET"] {
        if let Ok(secret) = std::env::var(var)
            && !secret.is_empty()
        {
            return secret;
        }
    }
    load_or_create_secret(&jwt_secret_path())
}

/// Read the secret at `path`, generating and persisting one if missing.
pub fn load_or_create_secret(path: &std::path::Path) -> String {
    if let Ok(existing) = std::fs::read_to_string(path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    let secret: String = rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = std::fs::write(path, &secret);
    info!(path = %path.display(), "generated new JWT secret");
    secret
}

/// Path to the persisted JWT secret file.
fn jwt_secret_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("warden")
        .join("jwt-secret")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const SECRET: &[u8] = b"test-secret";

    fn claims(exp: i64) -> DecodedToken {
        let mut extra = Map::new();
        extra.insert("user_id".into(), json!(7));
        DecodedToken {
            jti: "abc".into(),
            iat: 1000,
            exp,
            extra,
        }
    }

    #[test]
    fn extra_registered_claims_are_ignored() {
        let codec = TokenCodec::new(SECRET);
        for (name, value) in [
            ("aud", json!("web")),
            ("aud", json!(["web", "mobile"])),
            ("iss", json!("warden")),
            ("sub", json!("someone")),
        ] {
            let mut with_extra = claims(9_999_999_999);
            with_extra.extra.insert(name.into(), value);
            let token = codec.encode(&with_extra).unwrap();
            let decoded = codec.decode(&token, true).unwrap();
            assert_eq!(decoded.resource_id("user").as_deref(), Some("7"), "claim {name}");
        }
    }

    #[test]
    fn decodes_a_valid_token() {
        let codec = TokenCodec::new(SECRET);
        let token = codec.encode(&claims(9_999_999_999)).unwrap();
        let decoded = codec.decode(&token, true).unwrap();
        assert_eq!(decoded.jti, "abc");
        assert_eq!(decoded.iat, 1000);
        assert_eq!(decoded.resource_id("user").as_deref(), Some("7"));
        assert_eq!(decoded.resource_id("admin"), None);
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let codec = TokenCodec::new(SECRET);
        let token = codec.encode(&claims(1_500)).unwrap();
        assert_eq!(codec.decode(&token, true), Err(DecodeError::SignatureExpired));
    }

    #[test]
    fn expiry_check_can_be_skipped() {
        let codec = TokenCodec::new(SECRET);
        let token = codec.encode(&claims(1_500)).unwrap();
        let decoded = codec.decode(&token, false).unwrap();
        assert_eq!(decoded.exp, 1_500);
    }

    #[test]
    fn wrong_key_is_invalid() {
        let token = TokenCodec::new(SECRET).encode(&claims(9_999_999_999)).unwrap();
        let other = TokenCodec::new(b"another-secret");
        assert!(matches!(
            other.decode(&token, true),
            Err(DecodeError::SignatureInvalid(_))
        ));
    }

    #[test]
    fn garbage_is_invalid() {
        let codec = TokenCodec::new(SECRET);
        assert!(matches!(
            codec.decode("not.a.token", true),
            Err(DecodeError::SignatureInvalid(_))
        ));
    }

    #[test]
    fn missing_jti_is_invalid() {
        let codec = TokenCodec::new(SECRET);
        let token = encode(
            &Header::new(Algorithm::HS256),
            &json!({ "user_id": 7, "iat": 1000, "exp": 9_999_999_999_i64 }),
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();
        assert!(matches!(
            codec.decode(&token, true),
            Err(DecodeError::SignatureInvalid(_))
        ));
    }

    #[test]
    fn other_algorithm_is_invalid() {
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims(9_999_999_999),
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();
        let codec = TokenCodec::new(SECRET);
        assert!(matches!(
            codec.decode(&token, true),
            Err(DecodeError::SignatureInvalid(_))
        ));
    }

    #[test]
    fn issue_sets_resource_claim_and_window() {
        let codec = TokenCodec::new(SECRET);
        let (token, issued) = codec.issue("admin", "42", Duration::minutes(15)).unwrap();
        let decoded = codec.decode(&token, true).unwrap();
        assert_eq!(decoded, issued);
        assert_eq!(decoded.resource_id("admin").as_deref(), Some("42"));
        assert_eq!(decoded.exp - decoded.iat, 15 * 60);
    }

    #[test]
    fn issue_rejects_unrepresentable_lifetime() {
        let codec = TokenCodec::new(SECRET);
        let err = codec
            .issue("user", "7", Duration::days(365 * 1_000_000))
            .unwrap_err();
        assert!(matches!(err, AuthError::Config(_)));
    }

    #[test]
    fn non_scalar_resource_claim_is_absent() {
        let mut c = claims(9_999_999_999);
        c.extra.insert("user_id".into(), json!({ "nested": true }));
        assert_eq!(c.resource_id("user"), None);
        c.extra.insert("user_id".into(), json!(""));
        assert_eq!(c.resource_id("user"), None);
    }

    #[test]
    fn secret_is_generated_once_and_reused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("jwt-secret");
        let first = load_or_create_secret(&path);
        assert_eq!(first.len(), 64);
        assert_eq!(load_or_create_secret(&path), first);
    }
}
