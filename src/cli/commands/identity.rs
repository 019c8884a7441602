//! Where primary credentials are checked.

use anyhow::{Context, Result, anyhow};
use clap::{Arg, ArgAction, ArgMatches, Command};
use secrecy::SecretString;
use url::Url;

use crate::api::IdentityBackend;

pub const ARG_IDENTITY_URL: &str = "identity-url";
pub const ARG_IDENTITY_API_KEY: &str = "identity-api-key";
pub const ARG_SEED_ACCOUNT: &str = "seed-account";
pub const ARG_SEED_ADMIN: &str = "seed-admin";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_IDENTITY_URL)
                .long(ARG_IDENTITY_URL)
                .help("Base URL of the identity provider REST API")
                .env("ADMINGATE_IDENTITY_URL")
                .conflicts_with(ARG_SEED_ACCOUNT),
        )
        .arg(
            Arg::new(ARG_IDENTITY_API_KEY)
                .long(ARG_IDENTITY_API_KEY)
                .help("API key sent to the identity provider")
                .env("ADMINGATE_IDENTITY_API_KEY")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_SEED_ACCOUNT)
                .long(ARG_SEED_ACCOUNT)
                .help("Local account as email=password, for the in-memory identity provider")
                .value_name("EMAIL=PASSWORD")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new(ARG_SEED_ADMIN)
                .long(ARG_SEED_ADMIN)
                .help("Grant the admin role on start-up (in-memory storage only)")
                .value_name("EMAIL")
                .action(ArgAction::Append),
        )
}

pub struct Options {
    pub backend: IdentityBackend,
    pub seed_admins: Vec<String>,
}

impl Options {
    /// # Errors
    /// Returns an error if the identity URL is invalid, its API key is
    /// missing, or a seed account is malformed.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let backend = match matches.get_one::<String>(ARG_IDENTITY_URL) {
            Some(raw) => {
                let base_url = Url::parse(raw).context("invalid ADMINGATE_IDENTITY_URL")?;
                let api_key = matches
                    .get_one::<String>(ARG_IDENTITY_API_KEY)
                    .cloned()
                    .context("missing required argument: --identity-api-key")?;
                IdentityBackend::Rest {
                    base_url,
                    api_key: SecretString::from(api_key),
                }
            }
            None => IdentityBackend::Memory {
                accounts: matches
                    .get_many::<String>(ARG_SEED_ACCOUNT)
                    .unwrap_or_default()
                    .map(|raw| parse_seed_account(raw))
                    .collect::<Result<_>>()?,
            },
        };

        let seed_admins = matches
            .get_many::<String>(ARG_SEED_ADMIN)
            .unwrap_or_default()
            .cloned()
            .collect();

        Ok(Self {
            backend,
            seed_admins,
        })
    }
}

fn parse_seed_account(raw: &str) -> Result<(String, SecretString)> {
    let (email, password) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("--seed-account expects EMAIL=PASSWORD"))?;
    let email = email.trim();
    if email.is_empty() || password.is_empty() {
        return Err(anyhow!("--seed-account expects EMAIL=PASSWORD"));
    }
    Ok((email.to_string(), SecretString::from(password.to_string())))
}
