//! Where one-time codes are delivered.

use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;
use url::Url;

use crate::api::DispatchBackend;

pub const ARG_DISPATCH_URL: &str = "dispatch-url";
pub const ARG_DISPATCH_TOKEN: &str = "dispatch-token";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_DISPATCH_URL)
                .long(ARG_DISPATCH_URL)
                .help("Email relay endpoint; codes are only logged when unset")
                .env("ADMINGATE_DISPATCH_URL"),
        )
        .arg(
            Arg::new(ARG_DISPATCH_TOKEN)
                .long(ARG_DISPATCH_TOKEN)
                .help("Bearer token for the email relay")
                .env("ADMINGATE_DISPATCH_TOKEN")
                .hide_env_values(true)
                .requires(ARG_DISPATCH_URL),
        )
}

/// # Errors
/// Returns an error if the relay URL is invalid.
pub fn parse(matches: &ArgMatches) -> Result<DispatchBackend> {
    let Some(raw) = matches.get_one::<String>(ARG_DISPATCH_URL) else {
        return Ok(DispatchBackend::Log);
    };
    Ok(DispatchBackend::Http {
        url: Url::parse(raw).context("invalid ADMINGATE_DISPATCH_URL")?,
        token: matches
            .get_one::<String>(ARG_DISPATCH_TOKEN)
            .cloned()
            .map(SecretString::from),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relay_url_selects_http_dispatch() -> Result<()> {
        temp_env::with_vars(
            [
                ("ADMINGATE_DISPATCH_URL", None::<&str>),
                ("ADMINGATE_DISPATCH_TOKEN", None),
            ],
            || {
                let command = with_args(Command::new("admingate"));
                let plain = command.clone().try_get_matches_from(vec!["admingate"])?;
                assert!(matches!(parse(&plain)?, DispatchBackend::Log));

                let relay = command.clone().try_get_matches_from(vec![
                    "admingate",
                    "--dispatch-url",
                    "https://mail.portfolio.dev/send",
                    "--dispatch-token",
                    "t0ken",
                ])?;
                assert!(matches!(
                    parse(&relay)?,
                    DispatchBackend::Http { token: Some(_), .. }
                ));

                let bad = command.try_get_matches_from(vec![
                    "admingate",
                    "--dispatch-url",
                    "not a url",
                ])?;
                assert!(parse(&bad).is_err());
                Ok(())
            },
        )
    }
}
