//! Login flow timing and the frontend entry point.

use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};

use crate::api::sweeper::SweeperConfig;
use crate::gate::config::{GateConfig, MAX_CODE_TTL_SECONDS, MAX_SESSION_TIMEOUT_SECONDS};

pub const ARG_FRONTEND_BASE_URL: &str = "frontend-base-url";
pub const ARG_LOGIN_PATH: &str = "login-path";
pub const ARG_CODE_TTL_SECONDS: &str = "code-ttl-seconds";
pub const ARG_SESSION_TIMEOUT_SECONDS: &str = "session-timeout-seconds";
pub const ARG_MAX_CODE_ATTEMPTS: &str = "max-code-attempts";
pub const ARG_CODE_SWEEP_INTERVAL_SECONDS: &str = "code-sweep-interval-seconds";
pub const ARG_CODE_RETENTION_SECONDS: &str = "code-retention-seconds";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_FRONTEND_BASE_URL)
                .long(ARG_FRONTEND_BASE_URL)
                .help("Frontend base URL used for redirects and CORS")
                .env("ADMINGATE_FRONTEND_BASE_URL")
                .default_value("http://localhost:5173"),
        )
        .arg(
            Arg::new(ARG_LOGIN_PATH)
                .long(ARG_LOGIN_PATH)
                .help("Frontend path of the admin login page")
                .env("ADMINGATE_LOGIN_PATH")
                .default_value("/admin/login"),
        )
        .arg(
            Arg::new(ARG_CODE_TTL_SECONDS)
                .long(ARG_CODE_TTL_SECONDS)
                .help("Lifetime of a one-time login code in seconds (at most one hour)")
                .env("ADMINGATE_CODE_TTL_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_CODE_TTL_SECONDS)),
        )
        .arg(
            Arg::new(ARG_SESSION_TIMEOUT_SECONDS)
                .long(ARG_SESSION_TIMEOUT_SECONDS)
                .help("Maximum age of an elevated admin session in seconds (at most 30 days)")
                .env("ADMINGATE_SESSION_TIMEOUT_SECONDS")
                .default_value("86400")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_SESSION_TIMEOUT_SECONDS)),
        )
        .arg(
            Arg::new(ARG_MAX_CODE_ATTEMPTS)
                .long(ARG_MAX_CODE_ATTEMPTS)
                .help("Wrong one-time codes allowed per account within one code lifetime")
                .env("ADMINGATE_MAX_CODE_ATTEMPTS")
                .default_value("5")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new(ARG_CODE_SWEEP_INTERVAL_SECONDS)
                .long(ARG_CODE_SWEEP_INTERVAL_SECONDS)
                .help("Interval between purges of old codes and expired sessions, 0 disables")
                .env("ADMINGATE_CODE_SWEEP_INTERVAL_SECONDS")
                .default_value("0")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_CODE_RETENTION_SECONDS)
                .long(ARG_CODE_RETENTION_SECONDS)
                .help("How long expired codes are kept before purging")
                .env("ADMINGATE_CODE_RETENTION_SECONDS")
                .default_value("86400")
                .value_parser(clap::value_parser!(u64)),
        )
}

#[derive(Debug)]
pub struct Options {
    pub gate: GateConfig,
    pub sweeper: SweeperConfig,
}

impl Options {
    /// # Errors
    /// Returns an error if a defaulted argument is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let frontend_base_url = matches
            .get_one::<String>(ARG_FRONTEND_BASE_URL)
            .cloned()
            .context("missing required argument: --frontend-base-url")?;
        let login_path = matches
            .get_one::<String>(ARG_LOGIN_PATH)
            .cloned()
            .context("missing required argument: --login-path")?;
        let code_ttl = matches
            .get_one::<i64>(ARG_CODE_TTL_SECONDS)
            .copied()
            .context("missing required argument: --code-ttl-seconds")?;
        let session_timeout = matches
            .get_one::<i64>(ARG_SESSION_TIMEOUT_SECONDS)
            .copied()
            .context("missing required argument: --session-timeout-seconds")?;
        let max_code_attempts = matches
            .get_one::<u32>(ARG_MAX_CODE_ATTEMPTS)
            .copied()
            .context("missing required argument: --max-code-attempts")?;

        let gate = GateConfig::new(frontend_base_url.trim_end_matches('/').to_string())
            .with_login_path(login_path)
            .with_code_ttl_seconds(code_ttl)
            .with_session_timeout_seconds(session_timeout)
            .with_max_code_attempts(max_code_attempts);

        let sweeper = SweeperConfig::new()
            .with_interval_seconds(
                matches
                    .get_one::<u64>(ARG_CODE_SWEEP_INTERVAL_SECONDS)
                    .copied()
                    .unwrap_or(0),
            )
            .with_retention_seconds(
                matches
                    .get_one::<u64>(ARG_CODE_RETENTION_SECONDS)
                    .copied()
                    .unwrap_or(86_400),
            );

        Ok(Self { gate, sweeper })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_strips_trailing_slash() -> Result<()> {
        let matches = with_args(Command::new("admingate")).try_get_matches_from(vec![
            "admingate",
            "--frontend-base-url",
            "https://portfolio.dev/",
            "--code-sweep-interval-seconds",
            "600",
        ])?;
        let options = Options::parse(&matches)?;
        assert_eq!(options.gate.frontend_base_url(), "https://portfolio.dev");
        assert_eq!(options.gate.login_path(), "/admin/login");
        assert_eq!(options.gate.code_ttl().num_seconds(), 300);
        assert_eq!(options.gate.max_code_attempts(), 5);
        assert!(options.sweeper.enabled());
        Ok(())
    }

    #[test]
    fn zero_ttl_is_rejected() {
        let result = with_args(Command::new("admingate")).try_get_matches_from(vec![
            "admingate",
            "--code-ttl-seconds",
            "0",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn oversized_durations_are_rejected() {
        for (flag, value) in [
            ("--code-ttl-seconds", "3601"),
            ("--code-ttl-seconds", "9223372036854775807"),
            ("--session-timeout-seconds", "2592001"),
            ("--session-timeout-seconds", "9223372036854775807"),
            ("--max-code-attempts", "0"),
        ] {
            let result = with_args(Command::new("admingate"))
                .try_get_matches_from(vec!["admingate", flag, value]);
            assert!(result.is_err(), "{flag} {value} should be rejected");
        }
    }

    #[test]
    fn upper_bounds_are_accepted() -> Result<()> {
        let matches = with_args(Command::new("admingate")).try_get_matches_from(vec![
            "admingate",
            "--code-ttl-seconds",
            "3600",
            "--session-timeout-seconds",
            "2592000",
        ])?;
        let options = Options::parse(&matches)?;
        assert_eq!(options.gate.code_ttl().num_seconds(), MAX_CODE_TTL_SECONDS);
        assert_eq!(
            options.gate.session_timeout_seconds(),
            MAX_SESSION_TIMEOUT_SECONDS
        );
        Ok(())
    }
}
