//! Database migration support.
//!
//! Embeds and runs the token-store migrations from `warden_core/migrations/`.
//! Account tables belong to the host application and are not created here.

use sqlx::PgPool;

/// Run all embedded database migrations against the given pool.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
