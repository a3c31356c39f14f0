//! Frontdesk Server - Office Visitor Register
//!
//! A Rust REST API server recording visitor check-ins and check-outs.

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
    Router,
};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use frontdesk_server::{
    api,
    config::{AppConfig, DatabaseConfig},
    repository::Repository,
    services::Services,
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().expect("Failed to load configuration");

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("frontdesk_server={},tower_http=debug", config.logging.level).into()
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Frontdesk Server v{}", env!("CARGO_PKG_VERSION"));

    // Create database connection pool. Startup is the one place a failure
    // is retried automatically; exhausting the attempts is fatal.
    let pool = connect_with_retry(&config.database).await?;

    tracing::info!("Connected to database");

    // Run migrations
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    tracing::info!("Database migrations completed");

    // Save server address before moving config
    let server_host = config.server.host.clone();
    let server_port = config.server.port;

    // Create repository and services
    let repository = Repository::new(pool);
    let services = Services::new(repository, &config).expect("Failed to create services");

    // Seed the default administrator
    services
        .auth
        .bootstrap_admin(&config.admin)
        .await
        .expect("Failed to seed default administrator");

    // Background mail delivery workers
    services.notify.spawn_workers(config.notify.workers);

    let login_limiter = Arc::new(api::rate_limit::LoginRateLimiter::new(
        config.rate_limit.login_per_minute,
    ));

    // Create application state
    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
        login_limiter,
        started_at: Instant::now(),
    };

    // Build router
    let app = create_router(state.clone());

    // Start server
    let addr = SocketAddr::new(
        server_host.parse().expect("Invalid host address"),
        server_port,
    );

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    // Drain in-flight work, then release the pool
    tracing::info!("Draining pending notifications");
    state.services.notify.drain(Duration::from_secs(10)).await;
    state.services.repository.pool.close().await;

    tracing::info!("Shutdown complete");

    Ok(())
}

/// Establish the pool with bounded exponential backoff
async fn connect_with_retry(config: &DatabaseConfig) -> anyhow::Result<PgPool> {
    let mut delay = Duration::from_secs(1);
    let attempts = config.connect_retry_attempts.max(1);

    for attempt in 1..=attempts {
        match PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(&config.url)
            .await
        {
            Ok(pool) => return Ok(pool),
            Err(e) if attempt < attempts => {
                tracing::warn!(
                    "Database connection attempt {}/{} failed: {}; retrying in {:?}",
                    attempt,
                    attempts,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(Duration::from_secs(10));
            }
            Err(e) => {
                tracing::error!("Database connection attempts exhausted: {}", e);
                return Err(e.into());
            }
        }
    }

    anyhow::bail!("database connection retries exhausted")
}

/// Create the application router with all routes
fn create_router(state: AppState) -> Router {
    let cors = build_cors(&state.config.server.cors_allowed_origins);
    let max_body_bytes = state.config.server.max_body_bytes;

    // Login carries its own per-address limiter
    let login = Router::new()
        .route("/login", post(api::auth::login))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            api::rate_limit::login_rate_limit,
        ));

    // API v1 routes
    let api_v1 = Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        // Authentication
        .merge(login)
        .route("/auth/me", get(api::auth::me))
        // Visitors
        .route(
            "/visitors",
            post(api::visitors::create_visitor).get(api::visitors::list_visitors),
        )
        .route("/visitors/:id", get(api::visitors::get_visitor))
        .route("/visitors/:id/checkout", put(api::visitors::checkout_visitor))
        // Admin
        .route("/admin/stats", get(api::admin::stats))
        .route("/admin/export", get(api::admin::export))
        .with_state(state);

    // OpenAPI documentation
    let openapi = api::openapi::create_openapi_router();

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

fn build_cors(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|origin| origin == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Resolve on SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
