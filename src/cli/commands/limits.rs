//! Rate limit arguments.

use anyhow::{anyhow, Context, Result};
use clap::{Arg, ArgMatches, Command};

pub const ARG_LOGIN_MAX_ATTEMPTS: &str = "login-max-attempts";
pub const ARG_LOGIN_WINDOW_SECONDS: &str = "login-window-seconds";
pub const ARG_REFRESH_MAX_ATTEMPTS: &str = "refresh-max-attempts";
pub const ARG_REFRESH_WINDOW_SECONDS: &str = "refresh-window-seconds";
pub const ARG_SWEEP_PROBABILITY: &str = "rate-limit-sweep-probability";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Options {
    pub login_max_attempts: u32,
    pub login_window_seconds: u64,
    pub refresh_max_attempts: u32,
    pub refresh_window_seconds: u64,
    pub sweep_probability: f64,
}

impl Options {
    /// # Errors
    /// Returns an error if a limit or window is zero or the probability is outside `[0, 1]`.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let sweep_probability = matches
            .get_one::<f64>(ARG_SWEEP_PROBABILITY)
            .copied()
            .with_context(|| format!("missing required argument: --{ARG_SWEEP_PROBABILITY}"))?;
        if !(0.0..=1.0).contains(&sweep_probability) {
            return Err(anyhow!(
                "--{ARG_SWEEP_PROBABILITY} must be between 0 and 1"
            ));
        }

        Ok(Self {
            login_max_attempts: non_zero::<u32>(matches, ARG_LOGIN_MAX_ATTEMPTS)?,
            login_window_seconds: non_zero::<u64>(matches, ARG_LOGIN_WINDOW_SECONDS)?,
            refresh_max_attempts: non_zero::<u32>(matches, ARG_REFRESH_MAX_ATTEMPTS)?,
            refresh_window_seconds: non_zero::<u64>(matches, ARG_REFRESH_WINDOW_SECONDS)?,
            sweep_probability,
        })
    }
}

fn non_zero<T>(matches: &ArgMatches, name: &str) -> Result<T>
where
    T: Copy + Default + PartialEq + Send + Sync + Clone + 'static,
{
    let value = matches
        .get_one::<T>(name)
        .copied()
        .with_context(|| format!("missing required argument: --{name}"))?;
    if value == T::default() {
        return Err(anyhow!("--{name} must be greater than zero"));
    }
    Ok(value)
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_LOGIN_MAX_ATTEMPTS)
                .long(ARG_LOGIN_MAX_ATTEMPTS)
                .help("Login attempts allowed per client within the login window")
                .env("CUSTOS_LOGIN_MAX_ATTEMPTS")
                .default_value("5")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_LOGIN_WINDOW_SECONDS)
                .long(ARG_LOGIN_WINDOW_SECONDS)
                .help("Login rate limit window in seconds")
                .env("CUSTOS_LOGIN_WINDOW_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_REFRESH_MAX_ATTEMPTS)
                .long(ARG_REFRESH_MAX_ATTEMPTS)
                .help("Refresh attempts allowed per client within the refresh window")
                .env("CUSTOS_REFRESH_MAX_ATTEMPTS")
                .default_value("10")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_REFRESH_WINDOW_SECONDS)
                .long(ARG_REFRESH_WINDOW_SECONDS)
                .help("Refresh rate limit window in seconds")
                .env("CUSTOS_REFRESH_WINDOW_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_SWEEP_PROBABILITY)
                .long(ARG_SWEEP_PROBABILITY)
                .help("Chance per request of sweeping expired rate limit windows")
                .env("CUSTOS_RATE_LIMIT_SWEEP_PROBABILITY")
                .default_value("0.01")
                .value_parser(clap::value_parser!(f64)),
        )
}
