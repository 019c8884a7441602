//! `admingate admin grant|revoke|list` for provisioning administrator records.

use clap::{Arg, Command};

pub const COMMAND_ADMIN: &str = "admin";
pub const ARG_EMAIL: &str = "email";

#[must_use]
pub fn command() -> Command {
    let email = Arg::new(ARG_EMAIL)
        .help("Administrator email")
        .required(true);

    Command::new(COMMAND_ADMIN)
        .about("Manage administrator records (requires --dsn)")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("grant")
                .about("Grant the admin role")
                .arg(email.clone()),
        )
        .subcommand(
            Command::new("revoke")
                .about("Revoke the admin role")
                .arg(email),
        )
        .subcommand(Command::new("list").about("List administrators"))
}
