use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{}", .0)]
    Custom(String),

    #[error("IO::{:?}: {}", .0, .0)]
    Io(#[from] std::io::Error),

    #[error("FlexiLogger::{:?}: {}", .0, .0)]
    FlexiLogger(#[from] flexi_logger::FlexiLoggerError),

    #[error("Config: {}", .0)]
    Config(#[from] warden_core::config::ConfigError),

    #[error("Auth: {}", .0)]
    Auth(#[from] warden_core::AuthError),

    #[error("Token: {}", .0)]
    Decode(#[from] warden_core::auth::jwt::DecodeError),

    #[error("Json: {}", .0)]
    Json(#[from] serde_json::Error),
}
