//! Session and frontend arguments.

use crate::session::token::MIN_SECRET_BYTES;
use anyhow::{anyhow, Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::{ExposeSecret, SecretString};
use std::path::PathBuf;

pub const ARG_FRONTEND_BASE_URL: &str = "frontend-base-url";
pub const ARG_SESSION_SECRET: &str = "session-secret";
pub const ARG_ACCESS_TOKEN_TTL_SECONDS: &str = "access-token-ttl-seconds";
pub const ARG_REFRESH_TOKEN_TTL_SECONDS: &str = "refresh-token-ttl-seconds";
pub const ARG_USERS_FILE: &str = "users-file";

#[derive(Debug)]
pub struct Options {
    pub frontend_base_url: String,
    pub session_secret: SecretString,
    pub access_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
    pub users_file: Option<PathBuf>,
}

impl Options {
    /// # Errors
    /// Returns an error if the secret is missing or too short, or a TTL is not positive.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let frontend_base_url = matches
            .get_one::<String>(ARG_FRONTEND_BASE_URL)
            .cloned()
            .context("missing required argument: --frontend-base-url")?;

        let session_secret = matches
            .get_one::<String>(ARG_SESSION_SECRET)
            .cloned()
            .map(SecretString::from)
            .context("missing required argument: --session-secret")?;
        if session_secret.expose_secret().len() < MIN_SECRET_BYTES {
            return Err(anyhow!(
                "--{ARG_SESSION_SECRET} must be at least {MIN_SECRET_BYTES} bytes"
            ));
        }

        let access_ttl_seconds = positive(matches, ARG_ACCESS_TOKEN_TTL_SECONDS)?;
        let refresh_ttl_seconds = positive(matches, ARG_REFRESH_TOKEN_TTL_SECONDS)?;
        if refresh_ttl_seconds < access_ttl_seconds {
            return Err(anyhow!(
                "--{ARG_REFRESH_TOKEN_TTL_SECONDS} must not be shorter than --{ARG_ACCESS_TOKEN_TTL_SECONDS}"
            ));
        }

        Ok(Self {
            frontend_base_url,
            session_secret,
            access_ttl_seconds,
            refresh_ttl_seconds,
            users_file: matches.get_one::<PathBuf>(ARG_USERS_FILE).cloned(),
        })
    }
}

fn positive(matches: &ArgMatches, name: &str) -> Result<i64> {
    let value = matches
        .get_one::<i64>(name)
        .copied()
        .with_context(|| format!("missing required argument: --{name}"))?;
    if value <= 0 {
        return Err(anyhow!("--{name} must be greater than zero"));
    }
    Ok(value)
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_FRONTEND_BASE_URL)
                .long(ARG_FRONTEND_BASE_URL)
                .help("Frontend base URL; sets the CORS origin and, when https, secure cookies")
                .env("CUSTOS_FRONTEND_BASE_URL")
                .default_value("http://localhost:5173"),
        )
        .arg(
            Arg::new(ARG_SESSION_SECRET)
                .long(ARG_SESSION_SECRET)
                .help("Secret used to sign session tokens (at least 32 bytes)")
                .env("CUSTOS_SESSION_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_ACCESS_TOKEN_TTL_SECONDS)
                .long(ARG_ACCESS_TOKEN_TTL_SECONDS)
                .help("Access token lifetime in seconds")
                .env("CUSTOS_ACCESS_TOKEN_TTL_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_REFRESH_TOKEN_TTL_SECONDS)
                .long(ARG_REFRESH_TOKEN_TTL_SECONDS)
                .help("Refresh token lifetime in seconds")
                .env("CUSTOS_REFRESH_TOKEN_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_USERS_FILE)
                .long(ARG_USERS_FILE)
                .help("JSON file with directory users; built-in demo users when omitted")
                .env("CUSTOS_USERS_FILE")
                .value_parser(clap::value_parser!(PathBuf)),
        )
}
