use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "warden", version, about = "Issue and inspect Warden access tokens")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the CLI version.
    Version,

    /// Mint a signed access token for an account.
    Issue {
        /// Resource type, e.g. `user`; the token carries `<type>_id`.
        #[arg(long = "type", value_name = "TYPE")]
        resource_type: String,

        /// Account id.
        #[arg(long)]
        id: String,

        /// Lifetime in seconds. Defaults to the config's `token_ttl_secs`.
        #[arg(long)]
        ttl_secs: Option<i64>,

        #[command(flatten)]
        key: KeyArgs,
    },

    /// Verify a token and print its claims as JSON.
    Inspect {
        token: String,

        /// Skip the expiry check (signature is still verified).
        #[arg(long)]
        allow_expired: bool,

        #[command(flatten)]
        key: KeyArgs,
    },
}

/// Where the signing secret comes from. `--secret` wins over `--config`;
/// with neither, the usual environment / data-dir resolution applies.
#[derive(Args, Debug)]
pub struct KeyArgs {
    #[arg(long, env = "WARDEN_JWT_SECRET", hide_env_values = true)]
    pub secret: Option<String>,

    /// Warden YAML config.
    #[arg(long, env = "WARDEN_CONFIG")]
    pub config: Option<PathBuf>,
}
