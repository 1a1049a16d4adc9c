// Import and re-export the `error` module
pub use self::error::{Error, Result};
mod error;

use chrono::Duration;
use clap::Parser;
use cli::{Cli, Commands, KeyArgs};
use warden_core::auth::jwt::{TokenCodec, resolve_jwt_secret};
use warden_core::config::{DEFAULT_TOKEN_TTL_SECS, WardenConfig};

mod cli;
mod logging;

fn main() -> Result<()> {
    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<()> {
    logging::init()?;

    let args = Cli::parse();

    match args.command {
        Commands::Version => {
            println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        }
        Commands::Issue {
            resource_type,
            id,
            ttl_secs,
            key,
        } => {
            let config = load_config(&key)?;
            if let Some(config) = &config {
                let resource = config
                    .resources
                    .iter()
                    .find(|r| r.name == resource_type)
                    .ok_or_else(|| {
                        Error::Custom(format!("resource type '{resource_type}' is not configured"))
                    })?;
                if resource.whitelist_table.is_some() {
                    log::warn!(
                        "'{resource_type}' uses a whitelist; this token authenticates only once whitelisted"
                    );
                }
            }

            let ttl = match (ttl_secs, &config) {
                (Some(secs), _) => Duration::seconds(secs),
                (None, Some(config)) => config.token_ttl(),
                (None, None) => Duration::seconds(DEFAULT_TOKEN_TTL_SECS),
            };
            if ttl <= Duration::zero() {
                return Err(Error::Custom("--ttl-secs must be positive".into()));
            }

            let codec = codec(&key, config.as_ref());
            let (token, claims) = codec.issue(&resource_type, &id, ttl)?;
            log::debug!("issued jti {} expiring at {}", claims.jti, claims.exp);
            println!("{token}");
        }
        Commands::Inspect {
            token,
            allow_expired,
            key,
        } => {
            let config = load_config(&key)?;
            let claims = codec(&key, config.as_ref()).decode(token.trim(), !allow_expired)?;
            println!("{}", serde_json::to_string_pretty(&claims)?);
        }
    }

    Ok(())
}

fn load_config(key: &KeyArgs) -> Result<Option<WardenConfig>> {
    key.config
        .as_deref()
        .map(WardenConfig::from_yaml_file)
        .transpose()
        .map_err(Error::from)
}

fn codec(key: &KeyArgs, config: Option<&WardenConfig>) -> TokenCodec {
    let secret = match (&key.secret, config) {
        (Some(secret), _) if !secret.is_empty() => secret.clone(),
        (_, Some(config)) => config.secret(),
        _ => resolve_jwt_secret(),
    };
    TokenCodec::new(secret.as_bytes())
}
