//! Router-level tests: build the app over in-memory stores and drive it with
//! `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{HeaderValue, Method, Request, StatusCode, header};
use chrono::{DateTime, Duration, Utc};
use serde_json::{Value, json};
use tower::ServiceExt;
use warden_api::AppState;
use warden_core::auth::jwt::{DecodedToken, TokenCodec};
use warden_core::auth::resolver::{ResourceRegistry, ResourceType};
use warden_core::models::Account;
use warden_core::store::memory::{MemoryAccounts, MemoryRevocationStore, MemoryWhitelistStore};
use warden_core::store::{RevocationStore, StoreError, TokenBlacklist, TokenWhitelist};
use warden_core::{AuthPipeline, PipelineOptions};

const SECRET: &[u8] = b"router-test-secret";

struct TestApp {
    router: Router,
    pipeline: Arc<AuthPipeline>,
    admin_whitelist: Arc<MemoryWhitelistStore>,
}

fn app_with_blacklist(blacklist: TokenBlacklist) -> TestApp {
    let users = Arc::new(MemoryAccounts::new());
    users.insert(Account::new("user", "7"));
    let admins = Arc::new(MemoryAccounts::new());
    admins.insert(Account::new("admin", "1"));
    let admin_whitelist = Arc::new(MemoryWhitelistStore::new());

    let registry = ResourceRegistry::new()
        .with(ResourceType::new("user", users))
        .with(
            ResourceType::new("admin", admins)
                .with_whitelist(TokenWhitelist::new(admin_whitelist.clone())),
        );
    let pipeline = Arc::new(AuthPipeline::new(
        TokenCodec::new(SECRET),
        registry,
        blacklist,
        PipelineOptions::default(),
    ));
    let router = warden_api::router(AppState {
        pipeline: pipeline.clone(),
    });

    TestApp {
        router,
        pipeline,
        admin_whitelist,
    }
}

fn app() -> TestApp {
    app_with_blacklist(TokenBlacklist::new(Arc::new(MemoryRevocationStore::new())))
}

impl TestApp {
    fn sign(&self, claims: Value) -> String {
        let claims: DecodedToken = serde_json::from_value(claims).unwrap();
        self.pipeline.codec().encode(&claims).unwrap()
    }

    fn user_token(&self) -> String {
        self.sign(json!({ "user_id": 7, "jti": "abc", "iat": 1000, "exp": 9_999_999_999i64 }))
    }

    async fn send(&self, method: Method, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let resp = self
            .router
            .clone()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .expect("request");
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .expect("read body");
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).expect("parse JSON")
        };
        (status, json)
    }
}

#[tokio::test]
async fn health_reports_version() {
    let app = app();
    let (status, json) = app.send(Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], warden_core::version());
}

#[tokio::test]
async fn me_returns_current_resource() {
    let app = app();
    let token = app.user_token();
    let (status, json) = app.send(Method::GET, "/user/me", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({ "resourceType": "user", "id": "7" }));
}

#[tokio::test]
async fn missing_token_is_401_with_key() {
    let app = app();
    let resp = app
        .router
        .clone()
        .oneshot(Request::get("/user/me").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(resp.headers()[header::WWW_AUTHENTICATE], "Bearer");

    let (_, json) = app.send(Method::GET, "/user/me", None).await;
    assert_eq!(json["message"], "access_token.missing");
}

#[tokio::test]
async fn expired_token_is_401_expired() {
    let app = app();
    let token = app.sign(json!({ "user_id": 7, "jti": "old", "iat": 1000, "exp": 2000 }));
    let (status, json) = app.send(Method::GET, "/user/me", Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["message"], "access_token.expired");
}

#[tokio::test]
async fn garbage_token_is_401_invalid() {
    let app = app();
    let (status, json) = app.send(Method::GET, "/user/me", Some("not-a-jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["message"], "access_token.invalid");
}

#[tokio::test]
async fn non_ascii_header_is_401_invalid() {
    let app = app();
    let request = Request::get("/user/me")
        .header(
            header::AUTHORIZATION,
            HeaderValue::from_bytes(b"Bearer \xff\xfe").unwrap(),
        )
        .body(Body::empty())
        .unwrap();

    let resp = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["message"], "access_token.invalid");
}

#[tokio::test]
async fn token_for_another_type_is_rejected() {
    let app = app();
    let token = app.user_token();
    let (status, json) = app.send(Method::GET, "/admin/me", Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["message"], "access_token.invalid");
}

#[tokio::test]
async fn unknown_resource_type_is_404() {
    let app = app();
    let token = app.user_token();
    let (status, _) = app.send(Method::GET, "/customer/me", Some(&token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.send(Method::GET, "/customer/token", Some(&token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn token_status_never_401s() {
    let app = app();
    let token = app.user_token();

    let (status, json) = app.send(Method::GET, "/user/token", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["valid"], true);

    let (status, json) = app.send(Method::GET, "/user/token", Some("junk")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["valid"], false);

    let (status, json) = app.send(Method::GET, "/user/token", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["valid"], false);
}

#[tokio::test]
async fn sign_out_revokes_token() {
    let app = app();
    let token = app.user_token();

    let (status, json) = app.send(Method::DELETE, "/user/sign_out", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);

    let (status, json) = app.send(Method::GET, "/user/me", Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["message"], "access_token.invalid");

    let (status, _) = app.send(Method::DELETE, "/user/sign_out", Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_sign_out_clears_whitelist() {
    let app = app();
    let (token, claims) = app
        .pipeline
        .issue_token(&Account::new("admin", "1"), Duration::minutes(15))
        .await
        .unwrap();
    assert_eq!(app.admin_whitelist.len(), 1);

    let (status, json) = app.send(Method::GET, "/admin/me", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["id"], "1");

    let (status, _) = app.send(Method::DELETE, "/admin/sign_out", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(app.admin_whitelist.is_empty());
    assert!(app.pipeline.blacklist().is_revoked(&claims.jti).await.unwrap());
}

#[tokio::test]
async fn unlisted_admin_token_is_rejected() {
    let app = app();
    let token = app.sign(json!({ "admin_id": 1, "jti": "stray", "iat": 1000, "exp": 9_999_999_999i64 }));
    let (status, json) = app.send(Method::GET, "/admin/me", Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["message"], "access_token.invalid");
}

struct DownRevocationStore;

#[async_trait]
impl RevocationStore for DownRevocationStore {
    async fn revoke(&self, _jti: &str, _exp: Option<DateTime<Utc>>) -> Result<(), StoreError> {
        Err(StoreError::Backend("down".into()))
    }

    async fn is_revoked(&self, _jti: &str) -> Result<bool, StoreError> {
        Err(StoreError::Backend("down".into()))
    }

    async fn purge_expired(&self, _now: DateTime<Utc>) -> Result<u64, StoreError> {
        Err(StoreError::Backend("down".into()))
    }
}

#[tokio::test]
async fn store_outage_is_503_not_401() {
    let app = app_with_blacklist(TokenBlacklist::new(Arc::new(DownRevocationStore)));
    let token = app.user_token();

    let (status, json) = app.send(Method::GET, "/user/me", Some(&token)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"], "store_unavailable");

    let (status, _) = app.send(Method::GET, "/user/token", Some(&token)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}
