use crate::{
    api::handlers::{admin, health, root},
    dispatch::{CodeDispatcher, HttpDispatcher, LogDispatcher},
    gate::{Gate, GateDeps, clock::Clock, clock::SystemClock, config::GateConfig},
    identity::{IdentityProvider, MemoryIdentityProvider, RestIdentityProvider},
    store::{
        AdminDirectory, CodeRepository, SessionStore,
        memory::{MemoryAdminDirectory, MemoryCodeRepository, MemorySessionStore},
        postgres::{PgAdminDirectory, PgCodeRepository, PgSessionStore},
    },
};
use anyhow::{Context, Result, anyhow};
use axum::{
    Extension, Router,
    body::Body,
    extract::MatchedPath,
    http::{
        HeaderName, HeaderValue, Method, Request,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    middleware,
    routing::{get, options},
};
use secrecy::SecretString;
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{Span, info, info_span, warn};
use ulid::Ulid;
use url::Url;
use utoipa_axum::router::OpenApiRouter;

pub(crate) mod handlers;
mod openapi;
pub mod sweeper;

pub use openapi::openapi;
use sweeper::{SweeperConfig, spawn_sweeper};

/// Build the public API router with all documented routes registered.
#[must_use]
pub fn router() -> OpenApiRouter {
    openapi::api_router()
}

/// Which backend holds codes, sessions and administrator records.
#[derive(Clone, Debug)]
pub enum Storage {
    Postgres(PgPool),
    Memory,
}

/// Repository handles for one storage backend.
#[derive(Clone)]
pub struct Backends {
    pub storage: Storage,
    pub admins: Arc<dyn AdminDirectory>,
    pub codes: Arc<dyn CodeRepository>,
    pub sessions: Arc<dyn SessionStore>,
}

impl Backends {
    #[must_use]
    pub fn memory() -> Self {
        Self {
            storage: Storage::Memory,
            admins: Arc::new(MemoryAdminDirectory::new()),
            codes: Arc::new(MemoryCodeRepository::new()),
            sessions: Arc::new(MemorySessionStore::new()),
        }
    }

    #[must_use]
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            admins: Arc::new(PgAdminDirectory::new(pool.clone())),
            codes: Arc::new(PgCodeRepository::new(pool.clone())),
            sessions: Arc::new(PgSessionStore::new(pool.clone())),
            storage: Storage::Postgres(pool),
        }
    }

    /// Connect to PostgreSQL.
    /// # Errors
    /// Return error if the database is unreachable
    pub async fn connect(dsn: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .max_lifetime(Duration::from_secs(60 * 2))
            .test_before_acquire(true)
            .connect(dsn)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::postgres(pool))
    }
}

/// How primary credentials are checked.
#[derive(Debug)]
pub enum IdentityBackend {
    Rest {
        base_url: Url,
        api_key: SecretString,
    },
    /// Local accounts, `(email, secret)` pairs.
    Memory {
        accounts: Vec<(String, SecretString)>,
    },
}

/// Where one-time codes are sent.
#[derive(Debug)]
pub enum DispatchBackend {
    Http {
        url: Url,
        token: Option<SecretString>,
    },
    Log,
}

#[derive(Debug)]
pub struct ServerConfig {
    pub gate: GateConfig,
    pub identity: IdentityBackend,
    pub dispatch: DispatchBackend,
    pub sweeper: SweeperConfig,
    /// Emails granted the admin role on start-up (in-memory storage only).
    pub seed_admins: Vec<String>,
}

/// Assemble the gate from the configured collaborators.
/// # Errors
/// Return error if an HTTP client cannot be built or seeding fails
pub async fn build_gate(
    config: &ServerConfig,
    backends: &Backends,
    clock: Arc<dyn Clock>,
) -> Result<Gate> {
    let session_ttl = config.gate.session_timeout();

    let identity: Arc<dyn IdentityProvider> = match &config.identity {
        IdentityBackend::Rest { base_url, api_key } => Arc::new(RestIdentityProvider::new(
            base_url.clone(),
            api_key.clone(),
            backends.sessions.clone(),
            clock.clone(),
            session_ttl,
        )?),
        IdentityBackend::Memory { accounts } => {
            warn!("Using in-memory identity provider; do not use in production");
            let provider =
                MemoryIdentityProvider::new(backends.sessions.clone(), clock.clone(), session_ttl);
            for (email, secret) in accounts {
                provider.add_account(email, secret).await;
            }
            Arc::new(provider)
        }
    };

    let dispatcher: Arc<dyn CodeDispatcher> = match &config.dispatch {
        DispatchBackend::Http { url, token } => {
            Arc::new(HttpDispatcher::new(url.clone(), token.clone())?)
        }
        DispatchBackend::Log => Arc::new(LogDispatcher),
    };

    if !config.seed_admins.is_empty() {
        if !matches!(backends.storage, Storage::Memory) {
            return Err(anyhow!(
                "--seed-admin is only supported with in-memory storage; use `admin grant`"
            ));
        }
        for email in &config.seed_admins {
            backends
                .admins
                .grant(email)
                .await
                .with_context(|| format!("Failed to seed administrator {email}"))?;
        }
    }

    Ok(Gate::with_clock(
        config.gate.clone(),
        GateDeps {
            identity,
            admins: backends.admins.clone(),
            codes: backends.codes.clone(),
            dispatcher,
        },
        clock,
    ))
}

/// Build the full application: documented routes, the guarded admin
/// surface, and the shared middleware stack.
/// # Errors
/// Return error if the frontend base URL is invalid
pub fn app(gate: Arc<Gate>, storage: Storage) -> Result<Router> {
    let frontend_origin = frontend_origin(gate.config().frontend_base_url())?;
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(AllowOrigin::exact(frontend_origin))
        .allow_credentials(true);

    let (admin_routes, _admin_openapi) = openapi::admin_router().split_for_parts();
    let admin_routes = admin_routes.route_layer(middleware::from_fn(admin::require_admin));

    // Non-doc routes like `/` and preflight-only `OPTIONS /health` are added here.
    let (router, _openapi) = router().split_for_parts();
    let app = router
        .merge(admin_routes)
        .route("/", get(root::root))
        .route("/health", options(health::health))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(gate))
                .layer(Extension(storage)),
        );

    Ok(app)
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, dsn: Option<String>, config: ServerConfig) -> Result<()> {
    let backends = match dsn.as_deref() {
        Some(dsn) => Backends::connect(dsn).await?,
        None => {
            warn!("No DSN configured; codes, sessions and administrators live in memory");
            Backends::memory()
        }
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let gate = Arc::new(build_gate(&config, &backends, clock.clone()).await?);

    let _sweeper = spawn_sweeper(
        backends.codes.clone(),
        backends.sessions.clone(),
        clock,
        config.sweeper,
    );

    let app = app(gate, backends.storage)?;

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {err}");
            }
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn frontend_origin(frontend_base_url: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(frontend_base_url)
        .with_context(|| format!("Invalid frontend base URL: {frontend_base_url}"))?;
    let host = parsed.host_str().ok_or_else(|| {
        anyhow!("Frontend base URL must include a valid host: {frontend_base_url}")
    })?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build frontend origin header")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frontend_origin_strips_path() -> Result<()> {
        let origin = frontend_origin("https://portfolio.dev:8443/admin/")?;
        assert_eq!(origin, "https://portfolio.dev:8443");
        assert!(frontend_origin("not a url").is_err());
        Ok(())
    }

    #[tokio::test]
    async fn seed_admins_require_memory_storage() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://nobody@127.0.0.1:1/none")?;
        let config = ServerConfig {
            gate: GateConfig::new("http://localhost:5173".to_string()),
            identity: IdentityBackend::Memory { accounts: vec![] },
            dispatch: DispatchBackend::Log,
            sweeper: SweeperConfig::new(),
            seed_admins: vec!["owner@portfolio.dev".to_string()],
        };

        let result = build_gate(&config, &Backends::postgres(pool), Arc::new(SystemClock)).await;
        assert!(result.is_err());

        let memory = Backends::memory();
        build_gate(&config, &memory, Arc::new(SystemClock)).await?;
        assert!(memory.admins.is_admin("owner@portfolio.dev").await?);
        Ok(())
    }
}
