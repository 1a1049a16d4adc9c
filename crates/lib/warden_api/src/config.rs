//! API server configuration.

use std::path::PathBuf;

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3100").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub pg_connection_url: String,
    /// Path of the Warden YAML config (resource types, stores, secret).
    pub config_path: PathBuf,
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable        | Default                            |
    /// |-----------------|------------------------------------|
    /// | `BIND_ADDR`     | `127.0.0.1:3100`                   |
    /// | `DATABASE_URL`  | `postgres://localhost:5432/warden` |
    /// | `WARDEN_CONFIG` | `warden.yaml`                      |
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary variable source.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| "127.0.0.1:3100".into()),
            pg_connection_url: var("DATABASE_URL")
                .unwrap_or_else(|| "postgres://localhost:5432/warden".into()),
            config_path: var("WARDEN_CONFIG")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("warden.yaml")),
        }
    }
}
