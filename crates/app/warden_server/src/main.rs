//! Warden HTTP server binary.
//!
//! Loads the resource-type config, migrates the token tables and serves the
//! per-type auth routes.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use warden_api::config::ApiConfig;
use warden_core::config::WardenConfig;

/// CLI arguments for the server.
#[derive(Parser, Debug)]
#[command(name = "warden_server", about = "Warden authentication server")]
struct Args {
    /// Address to listen on. Overrides `BIND_ADDR`.
    #[arg(long)]
    bind_addr: Option<String>,

    /// PostgreSQL connection URL. Overrides `DATABASE_URL`.
    #[arg(long)]
    database_url: Option<String>,

    /// Warden YAML config (resource types, token stores, secret). Overrides
    /// `WARDEN_CONFIG`.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,

    /// Seconds between sweeps of expired whitelist and blacklist rows
    /// (0 disables).
    #[arg(long, default_value_t = 3600)]
    purge_interval_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_new("info,warden_api=debug,warden_core=debug"))?,
        )
        .init();

    let args = Args::parse();

    let mut config = ApiConfig::from_env();
    if let Some(bind_addr) = args.bind_addr {
        config.bind_addr = bind_addr;
    }
    if let Some(database_url) = args.database_url {
        config.pg_connection_url = database_url;
    }
    if let Some(path) = args.config {
        config.config_path = path;
    }

    info!(config = %config.config_path.display(), bind_addr = %config.bind_addr, "starting warden_server");
    let warden_config = WardenConfig::from_yaml_file(&config.config_path)?;

    info!(max_connections = args.max_connections, "configuring connection pool");
    let pool = PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&config.pg_connection_url)
        .await?;

    info!("running database migrations");
    warden_api::migrate(&pool).await?;

    let pipeline = Arc::new(warden_config.build_pg_pipeline(&pool)?);
    info!(resource_types = ?pipeline.registry().names(), "authentication pipeline ready");

    if args.purge_interval_secs > 0 {
        let pipeline = pipeline.clone();
        let period = Duration::from_secs(args.purge_interval_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                match pipeline.purge_expired(chrono::Utc::now()).await {
                    Ok(removed) => info!(removed, "purged expired token rows"),
                    Err(e) => warn!(error = %e, "token purge failed"),
                }
            }
        });
    }

    let state = warden_api::AppState { pipeline };
    let app = warden_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;

    Ok(())
}
