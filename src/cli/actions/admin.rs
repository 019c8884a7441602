use crate::api::Backends;
use anyhow::{Context, Result};
use tracing::info;

#[derive(Debug)]
pub enum AdminCommand {
    Grant(String),
    Revoke(String),
    List,
}

#[derive(Debug)]
pub struct Args {
    pub dsn: String,
    pub command: AdminCommand,
}

/// Execute an administrator provisioning command against PostgreSQL.
/// # Errors
/// Returns an error if the database is unreachable or the query fails.
pub async fn execute(args: Args) -> Result<()> {
    let backends = Backends::connect(&args.dsn).await?;
    let admins = backends.admins;

    match args.command {
        AdminCommand::Grant(email) => {
            let created = admins
                .grant(&email)
                .await
                .with_context(|| format!("Failed to grant admin to {email}"))?;
            info!(email = %email, created, "admin granted");
            if created {
                println!("granted admin to {email}");
            } else {
                println!("{email} is already an admin");
            }
        }
        AdminCommand::Revoke(email) => {
            let removed = admins
                .revoke(&email)
                .await
                .with_context(|| format!("Failed to revoke admin from {email}"))?;
            info!(email = %email, removed, "admin revoked");
            if removed {
                println!("revoked admin from {email}");
            } else {
                println!("{email} was not an admin");
            }
        }
        AdminCommand::List => {
            let records = admins.list().await.context("Failed to list admins")?;
            for record in records {
                println!("{}\t{}", record.email, record.role);
            }
        }
    }

    Ok(())
}
