//! # warden_api
//!
//! HTTP boundary for Warden. Every configured resource type `<t>` gets:
//!
//! - `GET /<t>/me` (guarded)
//! - `GET /<t>/token` (silent validity check)
//! - `DELETE /<t>/sign_out` (guarded)
//!
//! plus `GET /health`.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get};
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};
use warden_core::AuthPipeline;

use crate::handlers::{account, health};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Authentication pipeline for every configured resource type.
    pub pipeline: Arc<AuthPipeline>,
}

/// Run embedded database migrations.
///
/// Delegates to `warden_core::migrate::migrate()` which owns the migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    warden_core::migrate::migrate(pool).await
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required)
    let public = Router::new()
        .route("/health", get(health::health))
        .route("/{resource_type}/token", get(account::token_status));

    // Guarded routes: the route layer authenticates as the path's resource type
    let guarded = Router::new()
        .route("/{resource_type}/me", get(account::me))
        .route("/{resource_type}/sign_out", delete(account::sign_out))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_resource,
        ));

    Router::new()
        .merge(public)
        .merge(guarded)
        .layer(cors)
        .with_state(state)
}
