pub mod auth;
pub mod limits;
pub mod logging;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ColorChoice, Command,
};

pub const ARG_PORT: &str = "port";

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::api::GIT_COMMIT_HASH)
            .into_boxed_str(),
    );

    let command = Command::new("custos")
        .about("Session, CSRF and rate limiting gateway for the client portal")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long(ARG_PORT)
                .help("Port to listen on")
                .default_value("8080")
                .env("CUSTOS_PORT")
                .value_parser(clap::value_parser!(u16)),
        );

    let command = auth::with_args(command);
    let command = limits::with_args(command);
    logging::with_args(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "custos");
        assert_eq!(
            command.get_about().map(ToString::to_string),
            Some("Session, CSRF and rate limiting gateway for the client portal".to_string())
        );
        assert_eq!(
            command.get_version().map(ToString::to_string),
            Some(env!("CARGO_PKG_VERSION").to_string())
        );
    }

    #[test]
    fn test_check_port_and_secret() {
        let command = new();
        let matches =
            command.get_matches_from(vec!["custos", "--port", "9090", "--session-secret", SECRET]);

        assert_eq!(matches.get_one::<u16>(ARG_PORT).copied(), Some(9090));
        assert_eq!(
            matches.get_one::<String>(auth::ARG_SESSION_SECRET).cloned(),
            Some(SECRET.to_string())
        );
    }

    #[test]
    fn test_missing_secret_is_an_error() {
        temp_env::with_var_unset("CUSTOS_SESSION_SECRET", || {
            let result = new().try_get_matches_from(vec!["custos"]);
            assert!(result.is_err());
        });
    }

    #[test]
    fn test_check_env() {
        temp_env::with_vars(
            [
                ("CUSTOS_PORT", Some("443")),
                ("CUSTOS_SESSION_SECRET", Some(SECRET)),
                ("CUSTOS_LOG_LEVEL", Some("info")),
            ],
            || {
                let command = new();
                let matches = command.get_matches_from(vec!["custos"]);
                assert_eq!(matches.get_one::<u16>(ARG_PORT).copied(), Some(443));
                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    Some(2)
                );
            },
        );
    }

    #[test]
    fn test_check_log_level_env() {
        let levels = ["error", "warn", "info", "debug", "trace"];
        for (index, &level) in levels.iter().enumerate() {
            temp_env::with_vars(
                [
                    ("CUSTOS_LOG_LEVEL", Some(level)),
                    ("CUSTOS_SESSION_SECRET", Some(SECRET)),
                ],
                || {
                    let command = new();
                    let matches = command.get_matches_from(vec!["custos"]);
                    assert_eq!(
                        matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                        u8::try_from(index).ok()
                    );
                },
            );
        }
    }

    #[test]
    fn test_check_log_level_verbosity() {
        let levels = ["-v", "-vv", "-vvv", "-vvvv", "-vvvvv"];
        for (index, &level) in levels.iter().enumerate() {
            temp_env::with_var_unset("CUSTOS_LOG_LEVEL", || {
                let command = new();
                let matches =
                    command.get_matches_from(vec!["custos", level, "--session-secret", SECRET]);
                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    u8::try_from(index + 1).ok()
                );
            });
        }
    }
}
