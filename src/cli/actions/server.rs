use crate::api::{self, DispatchBackend, IdentityBackend, ServerConfig, sweeper::SweeperConfig};
use crate::gate::config::GateConfig;
use anyhow::Result;
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: Option<String>,
    pub gate: GateConfig,
    pub sweeper: SweeperConfig,
    pub identity: IdentityBackend,
    pub dispatch: DispatchBackend,
    pub seed_admins: Vec<String>,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the backends cannot be built or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let config = ServerConfig {
        gate: args.gate,
        identity: args.identity,
        dispatch: args.dispatch,
        sweeper: args.sweeper,
        seed_admins: args.seed_admins,
    };

    api::new(args.port, args.dsn, config).await
}

fn log_startup_args(args: &Args) {
    let storage = if args.dsn.is_some() {
        "postgres"
    } else {
        "memory"
    };
    let identity = match &args.identity {
        IdentityBackend::Rest { base_url, .. } => base_url.to_string(),
        IdentityBackend::Memory { accounts } => format!("memory ({} accounts)", accounts.len()),
    };
    let dispatch = match &args.dispatch {
        DispatchBackend::Http { url, .. } => url.to_string(),
        DispatchBackend::Log => "log".to_string(),
    };

    info!(
        port = args.port,
        storage,
        identity = %identity,
        dispatch = %dispatch,
        frontend = args.gate.frontend_base_url(),
        code_ttl_seconds = args.gate.code_ttl().num_seconds(),
        session_timeout_seconds = args.gate.session_timeout_seconds(),
        max_code_attempts = args.gate.max_code_attempts(),
        "Starting admingate"
    );
}
