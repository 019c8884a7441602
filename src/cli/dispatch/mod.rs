//! Map parsed arguments to the action the binary runs.

use crate::cli::actions::{
    Action,
    admin::{self, AdminCommand},
    server,
};
use crate::cli::commands::{self, delivery, gate, identity};
use anyhow::{Context, Result, anyhow};

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    if let Some(admin_matches) = matches.subcommand_matches(commands::admin::COMMAND_ADMIN) {
        return admin_action(admin_matches);
    }

    let port = matches
        .get_one::<u16>(commands::ARG_PORT)
        .copied()
        .unwrap_or(8080);
    let dsn = matches.get_one::<String>(commands::ARG_DSN).cloned();

    let gate_opts = gate::Options::parse(matches)?;
    let identity_opts = identity::Options::parse(matches)?;
    let dispatch = delivery::parse(matches)?;

    Ok(Action::Server(server::Args {
        port,
        dsn,
        gate: gate_opts.gate,
        sweeper: gate_opts.sweeper,
        identity: identity_opts.backend,
        dispatch,
        seed_admins: identity_opts.seed_admins,
    }))
}

fn admin_action(matches: &clap::ArgMatches) -> Result<Action> {
    let dsn = matches
        .get_one::<String>(commands::ARG_DSN)
        .cloned()
        .context("missing required argument: --dsn")?;

    let email = |sub: &clap::ArgMatches| {
        sub.get_one::<String>(commands::admin::ARG_EMAIL)
            .cloned()
            .context("missing required argument: <email>")
    };

    let command = match matches.subcommand() {
        Some(("grant", sub)) => AdminCommand::Grant(email(sub)?),
        Some(("revoke", sub)) => AdminCommand::Revoke(email(sub)?),
        Some(("list", _)) => AdminCommand::List,
        _ => return Err(anyhow!("unknown admin command")),
    };

    Ok(Action::Admin(admin::Args { dsn, command }))
}
