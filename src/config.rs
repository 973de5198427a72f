//! Command line and environment configuration.
//!
//! Every `serve` flag can also come from the environment (a `.env` file in the
//! working directory is loaded first by `main`).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use axum::http::HeaderValue;
use clap::{Args, Parser, Subcommand};
use thiserror::Error;

use crate::store::Uniqueness;

/// Shortest HS256 secret accepted for the authenticated variant.
pub const MIN_SECRET_LEN: usize = 16;

#[derive(Debug, Parser)]
#[command(name = "user-sheet", version, about = "REST API over a spreadsheet of users")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the /usuarios API.
    Serve(ServeArgs),
    /// Create an empty user sheet.
    Init(InitArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    /// Address to listen on.
    #[arg(long, env = "USER_SHEET_BIND", default_value = "127.0.0.1:5000")]
    pub bind: SocketAddr,

    /// Path of the user sheet.
    #[arg(long, env = "USER_SHEET_FILE", default_value = "datos.csv")]
    pub file: PathBuf,

    /// Require bearer tokens, enforce unique names/emails, enable CORS and API docs.
    #[arg(long, env = "USER_SHEET_AUTH")]
    pub auth: bool,

    /// HS256 signing secret for issued tokens.
    #[arg(long, env = "JWT_SECRET_KEY", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Lifetime of issued tokens, in seconds.
    #[arg(long, env = "USER_SHEET_TOKEN_TTL_SECS", default_value_t = 3600)]
    pub token_ttl_secs: u64,

    /// Allowed CORS origin (repeatable). Any origin is allowed when none is given.
    #[arg(long = "cors-origin", env = "USER_SHEET_CORS_ORIGIN", value_delimiter = ',')]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Args)]
pub struct InitArgs {
    /// Path of the user sheet to create.
    #[arg(long, env = "USER_SHEET_FILE", default_value = "datos.csv")]
    pub file: PathBuf,

    /// Replace an existing sheet.
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("--auth requires JWT_SECRET_KEY or --jwt-secret")]
    MissingSecret,
    #[error("JWT secret must be at least {} bytes", MIN_SECRET_LEN)]
    WeakSecret,
    #[error("--token-ttl-secs must be greater than zero")]
    ZeroTtl,
    #[error("invalid CORS origin: {0}")]
    InvalidCorsOrigin(String),
}

/// Validated settings for the authenticated variant.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub secret: String,
    pub token_ttl: Duration,
    pub cors_origins: Vec<HeaderValue>,
}

#[derive(Clone, Debug)]
pub struct ServeConfig {
    pub bind: SocketAddr,
    pub file: PathBuf,
    /// `None` runs the basic variant.
    pub auth: Option<AuthConfig>,
}

impl ServeConfig {
    pub fn uniqueness(&self) -> Uniqueness {
        if self.auth.is_some() {
            Uniqueness::Identity
        } else {
            Uniqueness::IdOnly
        }
    }
}

impl TryFrom<ServeArgs> for ServeConfig {
    type Error = ConfigError;

    fn try_from(args: ServeArgs) -> Result<Self, Self::Error> {
        let auth = if args.auth {
            let secret = args.jwt_secret.ok_or(ConfigError::MissingSecret)?;
            if secret.len() < MIN_SECRET_LEN {
                return Err(ConfigError::WeakSecret);
            }
            if args.token_ttl_secs == 0 {
                return Err(ConfigError::ZeroTtl);
            }
            let cors_origins = args
                .cors_origins
                .iter()
                .map(|origin| {
                    HeaderValue::from_str(origin)
                        .map_err(|_| ConfigError::InvalidCorsOrigin(origin.clone()))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Some(AuthConfig {
                secret,
                token_ttl: Duration::from_secs(args.token_ttl_secs),
                cors_origins,
            })
        } else {
            None
        };

        Ok(Self {
            bind: args.bind,
            file: args.file,
            auth,
        })
    }
}
