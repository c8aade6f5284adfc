//! Command-line argument dispatch.
//!
//! Maps validated CLI arguments to the action to run, such as starting the
//! API server with its full configuration.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{auth, limits, ARG_PORT};
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);

    let auth_opts = auth::Options::parse(matches)?;
    let limit_opts = limits::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        frontend_base_url: auth_opts.frontend_base_url,
        session_secret: auth_opts.session_secret,
        access_ttl_seconds: auth_opts.access_ttl_seconds,
        refresh_ttl_seconds: auth_opts.refresh_ttl_seconds,
        users_file: auth_opts.users_file,
        login_max_attempts: limit_opts.login_max_attempts,
        login_window_seconds: limit_opts.login_window_seconds,
        refresh_max_attempts: limit_opts.refresh_max_attempts,
        refresh_window_seconds: limit_opts.refresh_window_seconds,
        rate_limit_sweep_probability: limit_opts.sweep_probability,
    }))
}
