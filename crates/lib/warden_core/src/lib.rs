//! # warden_core
//!
//! Bearer-token authentication core: JWT verification, resource-type
//! resolution, whitelist/blacklist token stores, and logout.

pub mod auth;
pub mod config;
pub mod migrate;
pub mod models;
pub mod store;
pub mod uuid;

pub use auth::AuthError;
pub use auth::context::AuthContext;
pub use auth::pipeline::{AuthPipeline, PipelineOptions};

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}
